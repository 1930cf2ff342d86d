//! Config command implementation

use std::process::ExitCode;

use crate::config::{load_config, merge_overrides, Options};

use super::{ConfigArgs, EXIT_ERROR, EXIT_SUCCESS};

/// Resolve options: defaults, then progressive.toml, then CLI overrides.
pub(crate) fn resolve_options(args: &ConfigArgs) -> Result<Options, String> {
    let mut options = load_config(args.config.as_deref()).map_err(|e| e.to_string())?;
    merge_overrides(&mut options, &args.overrides()).map_err(|e| e.to_string())?;
    Ok(options)
}

/// Execute the config command
pub fn run_config(args: &ConfigArgs) -> ExitCode {
    let options = match resolve_options(args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    match toml::to_string_pretty(&options) {
        Ok(text) => {
            print!("{}", text);
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: failed to render options: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
