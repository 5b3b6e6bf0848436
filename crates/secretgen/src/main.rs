//! secretgen - generate age-encrypted secrets from a declarative configuration
//!
//! Reads the configuration, brings every secret under `--secrets-dir` up to
//! date and prints a summary. SIGINT and SIGTERM cancel the run.

mod cli;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use secretgen_core::{Config, SecretsLayout};
use secretgen_engine::RunError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    debug!("Loaded {} secret definitions", config.secrets.len());

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let layout = SecretsLayout::new(cli.secrets_dir);
    match secretgen_engine::run(config, &cli.identity, layout, &cancel).await {
        Ok(summary) => {
            if !cli.quiet {
                output::summary(&summary);
            }
            Ok(())
        }
        Err(RunError::Generation { failures }) => {
            for failure in &failures {
                output::error(&failure.to_string());
            }
            anyhow::bail!("{} secrets failed to generate", failures.len())
        }
        Err(err) => Err(err.into()),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Cancel `cancel` on the first SIGINT or SIGTERM
async fn cancel_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    warn!("Received shutdown signal, cancelling generation");
    cancel.cancel();
}
