//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;
mod watch;

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::build::BuildContext;
use crate::config::{load_config, merge_cli_overrides, CliOverrides};
use crate::mode::RunMode;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Assetline - declarative multi-stage asset pipeline
#[derive(Parser)]
#[command(name = "assetline")]
#[command(about = "Assetline - build scripts, styles, pages and static files from one rule table")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Run mode: development or production (default: build.mode from config)
    #[arg(long)]
    pub mode: Option<RunMode>,

    /// Config file (default: nearest assetline.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Source directory (overrides project.src)
    #[arg(long)]
    pub src: Option<PathBuf>,

    /// Output directory (overrides project.out)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Number of parallel jobs
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,

    /// Verbose output (debug logging)
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline once and write the output root
    Build {
        #[command(flatten)]
        common: CommonArgs,

        /// Show what would be built without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Build, then rebuild on every change under the source root
    Watch {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Build, serve the output root over HTTP and rebuild on change
    #[cfg(feature = "serve")]
    Serve {
        #[command(flatten)]
        common: CommonArgs,

        /// Address to listen on
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Serve the current output without watching for changes
        #[arg(long)]
        no_watch: bool,
    },

    /// Load the configuration, compile the rule table and report
    Check {
        #[command(flatten)]
        common: CommonArgs,
    },
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { common, dry_run } => {
            init_tracing(common.verbose);
            with_context(&common, &CliOverrides::default(), |ctx| build::run_build(ctx, dry_run))
        }
        Commands::Watch { common } => {
            init_tracing(common.verbose);
            with_context(&common, &CliOverrides::default(), watch::run_watch)
        }
        #[cfg(feature = "serve")]
        Commands::Serve { common, host, port, no_watch } => {
            init_tracing(common.verbose);
            let overrides = CliOverrides { host, port, ..Default::default() };
            with_context(&common, &overrides, |ctx| watch::run_serve(ctx, !no_watch))
        }
        Commands::Check { common } => {
            init_tracing(common.verbose);
            with_context(&common, &CliOverrides::default(), build::run_check)
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // Ignore the error if a subscriber is already installed
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

fn with_context<F>(common: &CommonArgs, extra: &CliOverrides, command: F) -> ExitCode
where
    F: FnOnce(BuildContext) -> ExitCode,
{
    match load_context(common, extra) {
        Ok(ctx) => command(ctx),
        Err(code) => ExitCode::from(code),
    }
}

/// Load, merge and validate the configuration for a command.
///
/// The project root is the directory holding the config file, or the current
/// directory when running on defaults. Failures return the exit code.
pub(crate) fn load_context(common: &CommonArgs, extra: &CliOverrides) -> Result<BuildContext, u8> {
    if let Some(path) = &common.config {
        if !path.is_file() {
            eprintln!("Error: Config file not found: {}", path.display());
            return Err(EXIT_INVALID_ARGS);
        }
    }

    let config_path = common.config.clone().or_else(crate::config::find_config);
    let mut config = match load_config(config_path.as_deref(), common.mode) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return Err(EXIT_ERROR);
        }
    };

    match &config_path {
        Some(path) => tracing::debug!("Using config: {}", path.display()),
        None => tracing::debug!("No assetline.toml found, using defaults"),
    }

    let overrides = CliOverrides {
        src: common.src.clone(),
        out: common.out.clone(),
        jobs: common.jobs.map(usize::from),
        ..extra.clone()
    };
    merge_cli_overrides(&mut config, &overrides);

    let errors = config.validate();
    if !errors.is_empty() {
        eprintln!("Error: invalid configuration");
        for error in &errors {
            eprintln!("  - {}", error);
        }
        return Err(EXIT_ERROR);
    }

    let project_root = project_root(config_path.as_deref());
    Ok(BuildContext::new(config, project_root).with_verbose(common.verbose))
}

fn project_root(config_path: Option<&Path>) -> PathBuf {
    config_path
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default())
}
