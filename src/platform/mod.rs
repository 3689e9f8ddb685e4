// oppsift - platform/mod.rs
//
// Platform abstraction layer.
// Dependencies: standard library, directories crate, util layer.
// Must NOT depend on: core, app.

pub mod config;
pub mod fs;
