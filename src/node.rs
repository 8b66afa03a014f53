//! Per-node identity: label, ports, state directory, log files, endpoint.

use crate::config::HarnessConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything the harness derives for one node from its index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Position in start order.
    pub index: usize,
    /// Label, also used as the node's identity key.
    pub name: String,
    /// P2P listen port.
    pub port: u16,
    /// JSON-RPC port.
    pub rpc_port: u16,
    /// State directory handed to the binary as `--basepath`.
    pub base_path: String,
    /// Receives the init output and the node's stdout.
    pub log_file: PathBuf,
    /// Receives the node's stderr.
    pub err_file: PathBuf,
    /// JSON-RPC endpoint URL.
    pub endpoint: String,
}

impl NodeSpec {
    /// Derive the spec of node `index` from the harness configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if there is no label for `index` or a port
    /// would overflow.
    pub fn new(config: &HarnessConfig, index: usize) -> Result<Self> {
        let name = config
            .node_labels
            .get(index)
            .ok_or_else(|| Error::Config(format!("no node label for index {index}")))?
            .clone();
        let offset = u16::try_from(index)
            .map_err(|_| Error::Config(format!("node index {index} exceeds u16::MAX")))?;
        let port = config
            .base_port
            .checked_add(offset)
            .ok_or_else(|| Error::Config(format!("P2P port overflow for node {index}")))?;
        let rpc_port = config
            .base_rpc_port
            .checked_add(offset)
            .ok_or_else(|| Error::Config(format!("RPC port overflow for node {index}")))?;

        Ok(Self {
            index,
            base_path: format!("{}{name}", config.base_path_prefix),
            log_file: config.log_dir.join(format!("log_{name}.out")),
            err_file: config.log_dir.join(format!("err_{name}.out")),
            endpoint: format!("http://{}:{rpc_port}", config.rpc.host),
            name,
            port,
            rpc_port,
        })
    }

    /// Specs for every node of the configured network, in start order.
    ///
    /// # Errors
    ///
    /// See [`NodeSpec::new`].
    pub fn all(config: &HarnessConfig) -> Result<Vec<Self>> {
        (0..config.node_count)
            .map(|index| Self::new(config, index))
            .collect()
    }
}

/// Multiaddress other nodes use to dial `node` once its peer id is known.
#[must_use]
pub fn bootnode_address(config: &HarnessConfig, node: &NodeSpec, peer_id: &str) -> String {
    format!("{}{}/p2p/{peer_id}", config.bootnode_template, node.port)
}
