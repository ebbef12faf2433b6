//! Assetline - command-line asset pipeline for static sites

use std::process::ExitCode;

use assetline::cli;

fn main() -> ExitCode {
    cli::run()
}
