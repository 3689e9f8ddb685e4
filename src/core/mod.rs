// oppsift - core/mod.rs
//
// Core business logic layer.
// Dependencies: util layer plus data-format crates (csv, calamine, zip,
// serde_json, toml, chrono, regex).
// Must NOT depend on: app, platform, or touch the filesystem.

pub mod catalog;
pub mod dates;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod output;
pub mod plan;
pub mod profile;
