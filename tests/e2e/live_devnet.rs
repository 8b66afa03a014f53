//! Runs against a real node binary.
//!
//! Set `DEVNET_NODE_BINARY`, `DEVNET_NODE_CONFIG` and `DEVNET_GENESIS` and run
//! with `--ignored`. Nodes write their state under the configured base path
//! prefix, so do not run this on a machine whose node state you care about.

use devnet_harness::{HarnessConfig, Network};
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

fn live_config(node_count: usize, connect: bool, log_dir: PathBuf) -> Option<HarnessConfig> {
    let binary = env::var("DEVNET_NODE_BINARY").ok()?;
    let mut config = HarnessConfig {
        node_count,
        connect,
        binary_path: binary.into(),
        log_dir,
        ..HarnessConfig::default()
    };
    if let Ok(path) = env::var("DEVNET_NODE_CONFIG") {
        config.node_config_path = path.into();
    }
    if let Ok(path) = env::var("DEVNET_GENESIS") {
        config.genesis_path = path.into();
    }
    Some(config)
}

async fn run_live(node_count: usize, connect: bool) {
    let logs = TempDir::new().unwrap();
    let Some(config) = live_config(node_count, connect, logs.path().to_path_buf()) else {
        println!("DEVNET_NODE_BINARY not set, skipping");
        return;
    };

    let mut network = Network::new(config).unwrap();
    let started = network.start().await;
    let report = match started {
        Ok(()) => Some(network.verify().await),
        Err(e) => {
            println!("start failed: {e}");
            None
        }
    };
    network.shutdown().await;

    let report = report.expect("network did not start").unwrap();
    assert!(report.all_observed(), "missing on nodes {:?}", report.missing());
}

#[tokio::test]
#[ignore = "Requires a real node binary - run with --ignored"]
async fn test_live_three_nodes_direct_connect() {
    run_live(3, true).await;
}

#[tokio::test]
#[ignore = "Requires a real node binary - run with --ignored"]
async fn test_live_nine_nodes() {
    run_live(9, false).await;
}
