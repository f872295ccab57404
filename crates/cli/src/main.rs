//! `gaia` -- command-line client for the GAIA generation service.
//!
//! Submits a generation job, follows its progress over the task channel,
//! and prints the validated result as JSON.
//!
//! # Environment variables
//!
//! | Variable                    | Required | Default | Description                               |
//! |-----------------------------|----------|---------|-------------------------------------------|
//! | `GAIA_BACK_END_URL`         | yes      | --      | HTTP base URL, e.g. `http://host:8000`    |
//! | `GAIA_WEBSOCKET_BASE_URL`   | yes      | --      | Task channel URL, e.g. `ws://host:8000/ws`|
//! | `GAIA_SUBSCRIBE_POLL_MS`    | no       | `100`   | Subscribe retry interval while connecting |
//! | `GAIA_TASK_TIMEOUT_SECS`    | no       | --      | Give up on a task after this many seconds |
//! | `GAIA_REQUEST_TIMEOUT_SECS` | no       | --      | Timeout for each HTTP request             |

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use gaia_cli::commands::{self, Job};
use gaia_tasks::{ClientConfig, TaskClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gaia")]
#[command(about = "Generate learning modules with the GAIA service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write the result to this file instead of stdout
    #[arg(short, long, global = true)]
    out: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a module outline from a JSON request
    Outline {
        /// Path to the request JSON (title, about, minutes, learnerPersona, ...)
        file: PathBuf,
    },

    /// Generate a full module from an outline JSON
    Module {
        /// Path to the outline JSON
        file: PathBuf,
    },

    /// Generate a full module in a single crew request
    Crew {
        /// Path to the request JSON
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gaia_cli=info,gaia_tasks=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let (job, file) = match cli.command {
        Commands::Outline { file } => (Job::Outline, file),
        Commands::Module { file } => (Job::Module, file),
        Commands::Crew { file } => (Job::Crew, file),
    };

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        api_url = %config.api_url,
        ws_url = %config.ws_url,
        "Starting gaia",
    );

    let client = match TaskClient::new(&config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build client");
            return ExitCode::FAILURE;
        }
    };

    let outcome = commands::run(&client, job, &file).await;
    client.connections().shutdown();

    match outcome.and_then(|value| commands::write_output(&value, cli.out.as_deref())) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Job failed");
            ExitCode::FAILURE
        }
    }
}
