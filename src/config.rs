//! Configuration for devnet-harness.
//!
//! Everything that used to be a process-wide constant in ad hoc test scripts
//! (ports, retry ceilings, timeouts, file locations) lives in
//! [`HarnessConfig`] and is passed explicitly to each component, so tests can
//! point the harness at fake binaries and fake RPC endpoints.

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Node labels, in start order. Each node uses its label as identity key.
pub const DEFAULT_NODE_LABELS: [&str; 9] = [
    "alice", "bob", "charlie", "dave", "eve", "fred", "george", "heather", "ian",
];

/// Node counts must be a multiple of this.
pub const NODE_COUNT_STEP: usize = 3;

/// Default base P2P port; node `i` listens on `base_port + i`.
pub const DEFAULT_BASE_PORT: u16 = 7000;

/// Default base RPC port; node `i` serves RPC on `base_rpc_port + i`.
pub const DEFAULT_BASE_RPC_PORT: u16 = 8540;

/// Which node receives the extrinsic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitTarget {
    /// A uniformly random node.
    #[default]
    Random,
    /// The node with this index.
    Node(usize),
}

/// JSON-RPC client timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Host used to build node endpoints (`http://<host>:<rpc port>`).
    #[serde(default = "default_rpc_host")]
    pub host: String,

    /// TCP connect timeout in seconds.
    #[serde(default = "default_dial_timeout")]
    pub dial_timeout_secs: u64,

    /// Overall request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl RpcConfig {
    /// Connect timeout as a [`Duration`].
    #[must_use]
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: default_rpc_host(),
            dial_timeout_secs: default_dial_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Number of nodes to start (3, 6 or 9).
    #[serde(default = "default_node_count")]
    pub node_count: usize,

    /// Path to the node binary.
    #[serde(default = "default_binary_path")]
    pub binary_path: PathBuf,

    /// Node configuration file handed to every node.
    #[serde(default = "default_node_config_path")]
    pub node_config_path: PathBuf,

    /// Genesis file handed to every node's `init`.
    #[serde(default = "default_genesis_path")]
    pub genesis_path: PathBuf,

    /// Base P2P port.
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// Base RPC port.
    #[serde(default = "default_base_rpc_port")]
    pub base_rpc_port: u16,

    /// Prefix of each node's state directory; the node label is appended.
    /// Passed verbatim to the binary, which expands `~` itself.
    #[serde(default = "default_base_path_prefix")]
    pub base_path_prefix: String,

    /// Multiaddress prefix for the bootnode; port and peer id are appended.
    #[serde(default = "default_bootnode_template")]
    pub bootnode_template: String,

    /// Node labels in start order.
    #[serde(default = "default_node_labels")]
    pub node_labels: Vec<String>,

    /// Directory receiving `log_<name>.out` and `err_<name>.out`.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Connect every node directly to node 0.
    #[serde(default)]
    pub connect: bool,

    /// Which node receives the extrinsic.
    #[serde(default)]
    pub submit_target: SubmitTarget,

    /// Storage key written by the extrinsic.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Storage value written by the extrinsic.
    #[serde(default = "default_storage_value")]
    pub storage_value: String,

    /// Seconds to wait after bring-up before the first read.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_secs: u64,

    /// Retry policy for node 0's peer id.
    #[serde(default = "default_peer_id_retry")]
    pub peer_id_retry: RetryPolicy,

    /// Retry policy for the baseline storage read.
    #[serde(default = "default_baseline_retry")]
    pub baseline_retry: RetryPolicy,

    /// Retry policy for propagation polling.
    #[serde(default = "default_poll_retry")]
    pub poll_retry: RetryPolicy,

    /// JSON-RPC client settings.
    #[serde(default)]
    pub rpc: RpcConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            node_count: default_node_count(),
            binary_path: default_binary_path(),
            node_config_path: default_node_config_path(),
            genesis_path: default_genesis_path(),
            base_port: default_base_port(),
            base_rpc_port: default_base_rpc_port(),
            base_path_prefix: default_base_path_prefix(),
            bootnode_template: default_bootnode_template(),
            node_labels: default_node_labels(),
            log_dir: default_log_dir(),
            connect: false,
            submit_target: SubmitTarget::default(),
            storage_key: default_storage_key(),
            storage_value: default_storage_value(),
            settle_delay_secs: default_settle_delay(),
            peer_id_retry: default_peer_id_retry(),
            baseline_retry: default_baseline_retry(),
            poll_retry: default_poll_retry(),
            rpc: RpcConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Check the configuration before anything touches the filesystem.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the node count is not a positive multiple of
    /// three within the label list, if the port ranges overflow, or if the
    /// submission target is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.node_count == 0 || self.node_count % NODE_COUNT_STEP != 0 {
            return Err(Error::Config(format!(
                "must use 3, 6, or 9 nodes (got {})",
                self.node_count
            )));
        }

        if self.node_count > self.node_labels.len() {
            return Err(Error::Config(format!(
                "node count {} exceeds the {} available node labels",
                self.node_count,
                self.node_labels.len()
            )));
        }

        for (i, label) in self.node_labels.iter().enumerate() {
            if label.is_empty() {
                return Err(Error::Config(format!("node label {i} is empty")));
            }
            if self.node_labels[..i].contains(label) {
                return Err(Error::Config(format!("duplicate node label {label}")));
            }
        }

        let count = u16::try_from(self.node_count)
            .map_err(|_| Error::Config(format!("node count {} exceeds u16", self.node_count)))?;
        for (name, base) in [("base_port", self.base_port), ("base_rpc_port", self.base_rpc_port)] {
            if base.checked_add(count).is_none() {
                return Err(Error::Config(format!(
                    "port range overflow: {name} {base} + {count} nodes exceeds u16::MAX"
                )));
            }
        }

        if let SubmitTarget::Node(index) = self.submit_target {
            if index >= self.node_count {
                return Err(Error::Config(format!(
                    "submission target {index} is not one of the {} nodes",
                    self.node_count
                )));
            }
        }

        if self.storage_key.is_empty() {
            return Err(Error::Config("storage key must not be empty".to_string()));
        }

        if self.rpc.request_timeout_secs == 0 {
            return Err(Error::Config("RPC request timeout must be non-zero".to_string()));
        }

        Ok(())
    }

    /// Settle delay as a [`Duration`].
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

const fn default_node_count() -> usize {
    NODE_COUNT_STEP
}

fn default_binary_path() -> PathBuf {
    PathBuf::from("../../ChainSafe/gossamer/bin/gossamer")
}

fn default_node_config_path() -> PathBuf {
    PathBuf::from("config.toml")
}

fn default_genesis_path() -> PathBuf {
    PathBuf::from("genesis.json")
}

const fn default_base_port() -> u16 {
    DEFAULT_BASE_PORT
}

const fn default_base_rpc_port() -> u16 {
    DEFAULT_BASE_RPC_PORT
}

fn default_base_path_prefix() -> String {
    "~/.gossamer_".to_string()
}

fn default_bootnode_template() -> String {
    "/ip4/127.0.0.1/tcp/".to_string()
}

fn default_node_labels() -> Vec<String> {
    DEFAULT_NODE_LABELS.iter().map(ToString::to_string).collect()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_storage_key() -> String {
    "noot".to_string()
}

fn default_storage_value() -> String {
    "washere".to_string()
}

const fn default_settle_delay() -> u64 {
    5
}

fn default_peer_id_retry() -> RetryPolicy {
    RetryPolicy::fixed(36, Duration::from_secs(1))
}

fn default_baseline_retry() -> RetryPolicy {
    RetryPolicy::fixed(8, Duration::from_secs(1))
}

fn default_poll_retry() -> RetryPolicy {
    RetryPolicy::fixed(36, Duration::from_secs(1))
}

fn default_rpc_host() -> String {
    "localhost".to_string()
}

const fn default_dial_timeout() -> u64 {
    60
}

const fn default_request_timeout() -> u64 {
    120
}
