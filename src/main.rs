//! progressive - replay lazy-loading scenarios from the command line

use std::process::ExitCode;

use progressive::cli;

fn main() -> ExitCode {
    cli::run()
}
