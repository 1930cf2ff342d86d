//! Configuration module for the progressive loader
//!
//! Provides the option types and loading of `progressive.toml`.

pub mod loader;
pub mod schema;

pub use loader::{
    find_config, find_config_from, load_config, merge_overrides, options_from_json,
    ConfigError, ConfigOverrides, CONFIG_FILE_NAME,
};
pub use schema::*;
