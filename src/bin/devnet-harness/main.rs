//! devnet-harness CLI entry point.

mod cli;

use clap::Parser;
use cli::Cli;
use color_eyre::eyre::eyre;
use devnet_harness::network::Network;
use devnet_harness::verify::VerificationReport;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("devnet-harness v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.to_config()?;
    let mut network = Network::new(config)?;

    let outcome: color_eyre::Result<Option<VerificationReport>> = tokio::select! {
        outcome = run(&mut network, cli.manifest.as_deref()) => outcome.map_err(Into::into),
        signal = tokio::signal::ctrl_c() => {
            warn!("Interrupted, tearing down");
            signal.map(|()| None).map_err(Into::into)
        }
    };

    network.shutdown().await;

    let Some(report) = outcome? else {
        return Ok(());
    };

    let missing = report.missing();
    if missing.is_empty() {
        info!("Value propagated to all {} nodes", report.propagation.len());
    } else {
        warn!("Value missing on nodes {missing:?}");
        if cli.require_propagation {
            return Err(eyre!("value did not propagate to nodes {missing:?}"));
        }
    }
    Ok(())
}

async fn run(
    network: &mut Network,
    manifest: Option<&Path>,
) -> devnet_harness::Result<Option<VerificationReport>> {
    network.start().await?;

    if let Some(path) = manifest {
        network.manifest().write(path).await?;
    }

    network.verify().await.map(Some)
}
