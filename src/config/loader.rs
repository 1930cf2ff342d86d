//! Configuration loading and discovery for `progressive.toml`
//!
//! Provides functions to find, load, and merge loader options.

use super::schema::Options;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file
pub const CONFIG_FILE_NAME: &str = "progressive.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse progressive.toml: {0}")]
    Toml(#[from] toml::de::Error),
    /// JSON parsing error (options handed over from JavaScript)
    #[error("Failed to parse options: {0}")]
    Json(#[from] serde_json::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    /// Override throttle interval (ms)
    pub throttle: Option<u64>,
    /// Override per-load delay (ms)
    pub delay: Option<u64>,
    /// Override small-variant breakpoint (px)
    pub sm_breakpoint: Option<u32>,
    /// Override retry count
    pub max_retries: Option<u32>,
}

/// Find `progressive.toml` by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    let cwd = env::current_dir().ok()?;
    find_config_from(cwd)
}

/// Find `progressive.toml` by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load options from a `progressive.toml` file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, returns the defaults.
///
/// # Example
/// ```ignore
/// let options = load_config(Some(Path::new("site/progressive.toml")))?;
/// ```
pub fn load_config(path: Option<&Path>) -> Result<Options, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => {
            log::debug!("loading options from {}", p.display());
            load_config_file(&p)
        }
        None => Ok(Options::default()),
    }
}

fn load_config_file(path: &Path) -> Result<Options, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let options: Options = toml::from_str(&contents)?;
    validated(options)
}

/// Parse options from a JSON object, as handed over by a host page.
///
/// Missing fields fall back to their defaults.
pub fn options_from_json(json: &str) -> Result<Options, ConfigError> {
    if json.trim().is_empty() {
        return Ok(Options::default());
    }
    let options: Options = serde_json::from_str(json)?;
    validated(options)
}

fn validated(options: Options) -> Result<Options, ConfigError> {
    let errors = options.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }
    Ok(options)
}

/// Merge CLI overrides into the options.
///
/// CLI arguments take precedence over config file values. The result is
/// validated again since overrides bypass the file checks.
pub fn merge_overrides(options: &mut Options, overrides: &ConfigOverrides) -> Result<(), ConfigError> {
    if let Some(throttle) = overrides.throttle {
        options.throttle = throttle;
    }
    if let Some(delay) = overrides.delay {
        options.delay = delay;
    }
    if let Some(sm_breakpoint) = overrides.sm_breakpoint {
        options.sm_breakpoint = sm_breakpoint;
    }
    if let Some(max_retries) = overrides.max_retries {
        options.retry.max_retries = max_retries;
    }

    let errors = options.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }
    Ok(())
}
