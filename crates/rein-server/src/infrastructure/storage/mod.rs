//! Storage infrastructure: runtime configuration persistence.
//!
//! The `config_file` sub-module handles:
//!
//! - Reading the JSON runtime configuration from the platform-appropriate
//!   directory, or a path given on the command line.
//! - Merging accepted `update-config` keys into it and writing it back
//!   atomically.
//! - Providing defaults when the file does not exist yet (first run).

pub mod config_file;

pub use config_file::{default_config_path, JsonConfigStore};
