//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod config;
mod simulate;

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use glob::glob;

use crate::config::ConfigOverrides;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Check if a path has a scenario file extension (.json or .json5).
pub fn is_scenario_file(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("json") | Some("json5"))
}

/// Find all scenario files in a directory (recursively), sorted.
pub fn find_scenario_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let dir_str = dir.display().to_string();

    for pattern in ["json", "json5"] {
        if let Ok(paths) = glob(&format!("{}/**/*.{}", dir_str, pattern)) {
            files.extend(paths.filter_map(Result::ok));
        }
    }

    files.sort();
    files
}

/// Expand the positional inputs: files pass through, directories are searched.
pub(crate) fn collect_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(find_scenario_files(input));
        } else {
            files.push(input.clone());
        }
    }
    files
}

/// progressive - replay lazy image loading against scripted pages
#[derive(Parser)]
#[command(name = "progressive")]
#[command(about = "progressive - replay viewport-driven lazy image loading against scripted pages")]
#[command(version)]
pub struct Cli {
    /// Log loader decisions (debug level) to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by commands that resolve a configuration
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to progressive.toml (default: search upward from the current directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the throttle interval (ms)
    #[arg(long)]
    pub throttle: Option<u64>,

    /// Override the per-load delay (ms)
    #[arg(long)]
    pub delay: Option<u64>,

    /// Override the small-variant breakpoint (px)
    #[arg(long)]
    pub sm_breakpoint: Option<u32>,

    /// Override the number of retries after a failed fetch
    #[arg(long)]
    pub max_retries: Option<u32>,
}

impl ConfigArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            throttle: self.throttle,
            delay: self.delay,
            sm_breakpoint: self.sm_breakpoint,
            max_retries: self.max_retries,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay scenario files and report what the loader did
    Simulate {
        /// Scenario files (.json, .json5) or directories containing them
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output format: text or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Exit with an error if any scenario does not reach completion
        #[arg(long)]
        require_complete: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Print the effective options as TOML
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

/// Initialise `env_logger`; `RUST_LOG` still wins when set.
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "progressive=debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .try_init();
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Simulate { inputs, format, require_complete, config } => {
            simulate::run_simulate(&inputs, &format, require_complete, &config)
        }
        Commands::Config { config } => config::run_config(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_is_scenario_file() {
        assert!(is_scenario_file(Path::new("a/b.json")));
        assert!(is_scenario_file(Path::new("b.json5")));
        assert!(!is_scenario_file(Path::new("b.toml")));
        assert!(!is_scenario_file(Path::new("json")));
    }

    #[test]
    fn test_find_scenario_files_recurses() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("b.json5"), "{}").unwrap();
        fs::write(temp.path().join("nested/a.json"), "{}").unwrap();
        fs::write(temp.path().join("notes.txt"), "").unwrap();

        let files = find_scenario_files(temp.path());
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| is_scenario_file(f)));
    }

    #[test]
    fn test_parse_simulate_args() {
        let cli = Cli::try_parse_from([
            "progressive",
            "simulate",
            "a.json",
            "--format",
            "json",
            "--sm-breakpoint",
            "480",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Simulate { inputs, format, config, require_complete } => {
                assert_eq!(inputs, vec![PathBuf::from("a.json")]);
                assert_eq!(format, "json");
                assert_eq!(config.sm_breakpoint, Some(480));
                assert!(!require_complete);
            }
            _ => panic!("expected simulate"),
        }
    }
}
