//! Configuration loader and schema types.
//!
//! This module exposes the settings that drive the daemon (audio pipeline
//! limits, the command server, library scanning, storage and logging) and
//! helpers to load them from disk and the environment.

mod load;
mod schema;

pub use load::{default_config_path, default_database_path, resolve_config_path};
pub use schema::*;
