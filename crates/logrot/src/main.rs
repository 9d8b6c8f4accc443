//! logrot CLI - rotate log files into dated archives

use anyhow::Result;
use clap::Parser;
use std::io::Write;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod rotate;

use cli::Cli;

/// Crates whose logs the verbosity flag controls
const LOG_TARGETS: &[&str] = &[
    "logrot",
    "logrot_core",
    "logrot_queue",
    "logrot_exec",
    "logrot_remote",
    "logrot_engine",
];

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let directives = LOG_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, log_level))
        .collect::<Vec<_>>()
        .join(",");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| directives.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = rotate::execute(&cli.config).await {
        // A failing hook decides the exit code and its output is passed through
        if let Some(err @ logrot_core::Error::HookFailed { stdout, stderr, .. }) =
            e.downcast_ref::<logrot_core::Error>()
        {
            print!("{}", stdout);
            let _ = std::io::stdout().flush();
            eprint!("{}", stderr);
            eprintln!("Error: {}", err);
            std::process::exit(err.exit_code());
        }

        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
