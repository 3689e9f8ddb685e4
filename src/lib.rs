// oppsift - lib.rs
//
// Library entry point, exposing every layer for integration testing and
// for hosts that embed the pipeline behind their own front end.
//
// The command-line front end lives in `main.rs` and is not part of the
// library surface.

pub mod app;
pub mod core;
pub mod platform;
pub mod util;
