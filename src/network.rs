//! Network bring-up and teardown.
//!
//! [`Network`] validates the configuration, creates every node's log files,
//! launches the nodes (node 0 first when direct-connecting, so the others can
//! be pointed at it), supervises them, and kills them on shutdown.

use crate::config::HarnessConfig;
use crate::error::{Error, Result};
use crate::extrinsic::StorageChange;
use crate::launcher::{Launcher, NodeLogs, NodeProcess, Termination};
use crate::node::{bootnode_address, NodeSpec};
use crate::retry::retry;
use crate::rpc::RpcClient;
use crate::verify::{VerificationReport, Verifier};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Lifecycle of a harness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing started.
    Idle,
    /// Nodes are being initialized and started.
    Launching,
    /// Every node has been started.
    AllLaunched,
    /// The propagation check is running.
    Verifying,
    /// Nodes are being (or have been) killed.
    Teardown,
}

/// Snapshot of a running network, written for external tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkManifest {
    /// Node count.
    pub node_count: usize,
    /// Whether nodes were pointed at node 0.
    pub connect: bool,
    /// Bootnode address handed to nodes 1..N, if any.
    pub bootnode: Option<String>,
    /// Started nodes.
    pub nodes: Vec<ManifestNode>,
    /// Creation time in RFC3339.
    pub created_at: String,
}

/// One node in a [`NetworkManifest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestNode {
    /// Derived node settings.
    #[serde(flatten)]
    pub spec: NodeSpec,
    /// OS process id.
    pub pid: Option<u32>,
}

impl NetworkManifest {
    /// Write the manifest as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be written.
    pub async fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        tokio::fs::write(path, json).await?;
        info!("Wrote manifest to {}", path.display());
        Ok(())
    }
}

/// A local network of node processes.
pub struct Network {
    config: HarnessConfig,
    specs: Vec<NodeSpec>,
    launcher: Launcher,
    rpc: RpcClient,
    processes: Vec<NodeProcess>,
    bootnode: Option<String>,
    phase: Phase,
}

impl Network {
    /// Create a network from a validated configuration.
    ///
    /// Nothing is written and nothing is started.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid and
    /// `Error::Rpc` if the RPC client cannot be built.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        let specs = NodeSpec::all(&config)?;
        let launcher = Launcher::new(&config);
        let rpc = RpcClient::new(&config.rpc)?;

        Ok(Self {
            config,
            specs,
            launcher,
            rpc,
            processes: Vec::new(),
            bootnode: None,
            phase: Phase::Idle,
        })
    }

    /// Initialize and start every node.
    ///
    /// In direct-connect mode node 0 is started alone and its peer id is
    /// fetched before the remaining nodes start. Nodes that did start are
    /// kept for [`Network::shutdown`] even when this returns an error.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if a log file cannot be created, `Error::Init` or
    /// `Error::Startup` if a node cannot be launched, and `Error::Bootnode` if
    /// node 0 never reports a peer id.
    pub async fn start(&mut self) -> Result<()> {
        info!(
            "Starting {} nodes{}",
            self.specs.len(),
            if self.config.connect { " (direct-connect)" } else { "" }
        );
        self.phase = Phase::Launching;

        let mut logs = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            logs.push(NodeLogs::create(spec).await?);
        }
        let mut logs = logs.into_iter();

        let mut pending = &self.specs[..];
        if self.config.connect {
            let (first, rest) = self
                .specs
                .split_first()
                .ok_or_else(|| Error::Config("no nodes configured".to_string()))?;
            let first_logs = logs
                .next()
                .ok_or_else(|| Error::Config("missing log files for node 0".to_string()))?;
            let process = self.launcher.init_and_start(first, None, first_logs).await?;
            debug!("node {} released", first.name);
            self.processes.push(process);

            let peer_id = retry(&self.config.peer_id_retry, |attempt| {
                debug!(attempt, "querying peer id of {}", first.name);
                self.rpc.get_peer_id(&first.endpoint)
            })
            .await
            .map_err(Error::Bootnode)?;

            let addr = bootnode_address(&self.config, first, &peer_id);
            info!("Bootnode address: {addr}");
            self.bootnode = Some(addr);
            pending = rest;
        }

        let bootnode = self.bootnode.as_deref();
        let launcher = &self.launcher;
        let launches = pending.iter().zip(logs).map(|(spec, logs)| async move {
            let result = launcher.init_and_start(spec, bootnode, logs).await;
            debug!("node {} released", spec.name);
            result
        });
        let results = join_all(launches).await;

        let mut first_err = None;
        for result in results {
            match result {
                Ok(process) => self.processes.push(process),
                Err(e) => {
                    warn!("{e}");
                    first_err.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }

        for process in &mut self.processes {
            process.watch_exit();
        }

        self.phase = Phase::AllLaunched;
        info!("All {} nodes started", self.processes.len());
        Ok(())
    }

    /// Run the propagation check of the configured key and value.
    ///
    /// # Errors
    ///
    /// See [`Verifier::run`].
    pub async fn verify(&mut self) -> Result<VerificationReport> {
        self.phase = Phase::Verifying;
        let change = StorageChange::set(
            self.config.storage_key.as_bytes(),
            self.config.storage_value.as_bytes(),
        );
        Verifier::new(&self.config, &self.rpc, &self.specs)
            .run(&change)
            .await
    }

    /// Kill every started node.
    ///
    /// Kill failures are logged, not returned. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        info!("Shutting down network");
        self.phase = Phase::Teardown;

        for process in &mut self.processes {
            let name = process.spec().name.clone();
            match process.kill().await {
                Ok(Termination::Killed(status)) => debug!("killed process {name}: {status}"),
                Ok(Termination::Exited(status)) => {
                    debug!("process {name} had already exited: {status}");
                }
                Ok(Termination::AlreadyStopped) => {}
                Err(e) => warn!("could not kill process {name}: {e}"),
            }
        }
        info!("Network shutdown complete");
    }

    /// Describe the network as it currently runs.
    #[must_use]
    pub fn manifest(&self) -> NetworkManifest {
        NetworkManifest {
            node_count: self.specs.len(),
            connect: self.config.connect,
            bootnode: self.bootnode.clone(),
            nodes: self
                .processes
                .iter()
                .map(|process| ManifestNode {
                    spec: process.spec().clone(),
                    pid: process.pid(),
                })
                .collect(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Derived settings of every configured node.
    #[must_use]
    pub fn specs(&self) -> &[NodeSpec] {
        &self.specs
    }

    /// Started processes, in start order within each launch wave.
    #[must_use]
    pub fn processes(&self) -> &[NodeProcess] {
        &self.processes
    }

    /// Bootnode address, once known.
    #[must_use]
    pub fn bootnode(&self) -> Option<&str> {
        self.bootnode.as_deref()
    }

    /// Harness configuration.
    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }
}
