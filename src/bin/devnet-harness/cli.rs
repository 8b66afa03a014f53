//! CLI definition for devnet-harness.

use clap::Parser;
use devnet_harness::config::{HarnessConfig, SubmitTarget};
use std::path::PathBuf;

/// Start a local node network and check that a storage write propagates.
#[derive(Parser, Debug)]
#[command(name = "devnet-harness")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Number of nodes to start (3, 6 or 9).
    #[arg(long)]
    pub num: usize,

    /// Point every node at the first one as bootnode.
    #[arg(long)]
    pub connect: bool,

    /// Path to the node binary.
    #[arg(long, env = "DEVNET_NODE_BINARY")]
    pub path: Option<PathBuf>,

    /// Node configuration file [default: config.toml].
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Genesis file [default: genesis.json].
    #[arg(long)]
    pub genesis: Option<PathBuf>,

    /// Base P2P port [default: 7000].
    #[arg(long)]
    pub base_port: Option<u16>,

    /// Base RPC port [default: 8540].
    #[arg(long)]
    pub base_rpc_port: Option<u16>,

    /// Directory for per-node log files [default: .].
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Submit the extrinsic to this node instead of a random one.
    #[arg(long)]
    pub submit_node: Option<usize>,

    /// Harness settings file (TOML); flags override its values.
    #[arg(long, env = "DEVNET_HARNESS_CONFIG")]
    pub harness_config: Option<PathBuf>,

    /// Path to write a network manifest JSON.
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Exit non-zero unless every node observed the written value.
    #[arg(long)]
    pub require_propagation: bool,

    /// Log level for the harness.
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Build the harness configuration from the settings file and flags.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file is given but cannot be loaded.
    pub fn to_config(&self) -> color_eyre::Result<HarnessConfig> {
        let mut config = if let Some(ref path) = self.harness_config {
            HarnessConfig::from_file(path)?
        } else {
            HarnessConfig::default()
        };

        config.node_count = self.num;
        config.connect |= self.connect;

        if let Some(ref path) = self.path {
            config.binary_path.clone_from(path);
        }
        if let Some(ref path) = self.config {
            config.node_config_path.clone_from(path);
        }
        if let Some(ref path) = self.genesis {
            config.genesis_path.clone_from(path);
        }
        if let Some(port) = self.base_port {
            config.base_port = port;
        }
        if let Some(port) = self.base_rpc_port {
            config.base_rpc_port = port;
        }
        if let Some(ref dir) = self.log_dir {
            config.log_dir.clone_from(dir);
        }
        if let Some(index) = self.submit_node {
            config.submit_target = SubmitTarget::Node(index);
        }

        Ok(config)
    }
}
