//! Simulate command implementation

use std::path::PathBuf;
use std::process::ExitCode;

use crate::config::merge_overrides;
use crate::scenario::{Report, Scenario};

use super::config::resolve_options;
use super::{collect_inputs, ConfigArgs, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};

/// Execute the simulate command
pub fn run_simulate(
    inputs: &[PathBuf],
    format: &str,
    require_complete: bool,
    args: &ConfigArgs,
) -> ExitCode {
    if format != "text" && format != "json" {
        eprintln!("Error: --format must be 'text' or 'json'");
        return ExitCode::from(EXIT_INVALID_ARGS);
    }

    let base = match resolve_options(args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let files = collect_inputs(inputs);
    if files.is_empty() {
        eprintln!("Error: No scenario files found");
        return ExitCode::from(EXIT_INVALID_ARGS);
    }

    let mut reports: Vec<Report> = Vec::new();
    let mut failed = false;

    for path in &files {
        let scenario = match Scenario::load(path) {
            Ok(scenario) => scenario,
            Err(e) => {
                eprintln!("Error in {}: {}", path.display(), e);
                failed = true;
                continue;
            }
        };

        // Scenario options replace the file config; CLI overrides still win
        let mut options = scenario.options.clone().unwrap_or_else(|| base.clone());
        if let Err(e) = merge_overrides(&mut options, &args.overrides()) {
            eprintln!("Error in {}: {}", path.display(), e);
            failed = true;
            continue;
        }

        match scenario.run(options) {
            Ok(mut report) => {
                if report.name.is_none() {
                    report.name = Some(path.display().to_string());
                }
                if require_complete && !report.is_complete() {
                    eprintln!("{}: did not complete ({:?})", path.display(), report.state);
                    failed = true;
                }
                reports.push(report);
            }
            Err(e) => {
                eprintln!("Error in {}: {}", path.display(), e);
                failed = true;
            }
        }
    }

    if format == "json" {
        let value = if reports.len() == 1 {
            serde_json::to_string_pretty(&reports[0])
        } else {
            serde_json::to_string_pretty(&reports)
        };
        match value {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: failed to serialize report: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    } else {
        for report in &reports {
            print!("{}", report.to_text());
        }
    }

    if failed {
        ExitCode::from(EXIT_ERROR)
    } else {
        ExitCode::from(EXIT_SUCCESS)
    }
}
