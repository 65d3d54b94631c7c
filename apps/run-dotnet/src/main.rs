#![warn(clippy::pedantic)]

//! # run-dotnet
//!
//! Runs `dotnet` from a project-local toolchain, installing it first when
//! needed. The installation lives in a shared store under the user's home
//! directory and is exposed to the project through `.dotnet/`.
//!
//! ## Usage
//!
//! ```bash
//! run-dotnet build                 # pinned major, or the latest active LTS
//! run-dotnet 8 test                # latest 8.x, and pin 8 for later runs
//! run-dotnet 8.0 run               # latest 8.0.x
//! run-dotnet 8.0.11 --info         # exactly 8.0.11
//! ```
//!
//! Everything after the optional version is passed to `dotnet` unchanged.
//! Before it runs, `dotnet restore` is run on the `*.csproj` in the current
//! directory, if there is one.

mod bootstrap;
mod config;
mod errors;
mod exec;
mod telemetry;
mod toolchain;

use anyhow::{Context, Result};
use clap::Parser;

use bootstrap::Bootstrapper;
use config::Config;
use errors::BootstrapError;
use toolchain::VersionRequest;

/// Project-local .NET SDK bootstrapper.
#[derive(Parser)]
#[command(
    name = "run-dotnet",
    about = "Installs a project-local .NET SDK and runs dotnet with it",
    disable_help_flag = true,
    disable_version_flag = true,
    after_help = "\
ENVIRONMENT VARIABLES:
    RUN_DOTNET_HOME               Shared store (default: ~/.local/share/run-dotnet)
    RUN_DOTNET_INDEX_URL          Release index URL
    RUN_DOTNET_RID                Runtime identifier override (e.g. linux-x64)
    RUN_DOTNET_TIMEOUT_SECS       Connect/read timeout, metadata request cap (default: 300)
    RUN_DOTNET_METADATA_TTL_SECS  Metadata cache lifetime, 0 disables (default: 900)
    RUN_DOTNET_ALLOW_HTTP         Accept plain http:// URLs
    RUN_DOTNET_SKIP_RESTORE       Skip the automatic dotnet restore
    RUN_DOTNET_LOG                'json' for JSON log lines"
)]
struct Cli {
    /// Optional version (`8`, `8.0`, `8.0.11`) followed by arguments for dotnet.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, num_args = 0..)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Handles an error and returns the appropriate exit code.
///
/// For `ProcessExitCode` errors, returns the embedded exit code without
/// printing an error message (the child already printed its output).
/// For all other errors, prints the error chain and returns exit code 1.
fn handle_error(e: &anyhow::Error) -> i32 {
    if let Some(BootstrapError::ProcessExitCode { code }) = errors::classify(e) {
        return *code;
    }
    eprintln!("Error: {e:?}");
    1
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let (request, args) = VersionRequest::split_args(cli.args)?;

    let config = Config::from_env()?;
    telemetry::init_tracing(config.log_format, tracing::Level::INFO);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        commit = env!("RUN_DOTNET_GIT_COMMIT"),
        rid = %config.platform,
        "run-dotnet starting"
    );

    let project_root = std::env::current_dir().context("Failed to determine current directory")?;
    let bootstrapper = Bootstrapper::new(&config, project_root)?;
    let installation = bootstrapper.run(&request).await?;
    tracing::info!(
        version = %installation.version,
        channel = %installation.channel_version,
        install_dir = %installation.install_dir.display(),
        entry_point = %installation.entry_point.display(),
        pinned = ?installation.pinned.map(|p| p.major),
        "using .NET {}",
        installation.version
    );

    let project = bootstrapper.project();
    if config.skip_restore {
        tracing::debug!("restore disabled");
    } else {
        exec::restore_if_needed(project)?;
    }

    if args.is_empty() {
        return Err(BootstrapError::invalid_arguments(
            "nothing to run. Usage: run-dotnet [VERSION] <args to dotnet>",
        )
        .into());
    }

    exec::run_toolchain(project, &args)
}
