// oppsift - app/mod.rs
//
// Application layer: the classifier seam and request orchestration.
// Dependencies: core, util.
// Must NOT depend on: platform specifics.

pub mod classifier;
pub mod pipeline;
