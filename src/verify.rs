//! Storage propagation check.
//!
//! Reads a baseline from every node, submits one storage-change extrinsic to
//! a single node, then polls every node until it reports a value. Results are
//! printed as they arrive and collected into a [`VerificationReport`].

use crate::config::{HarnessConfig, SubmitTarget};
use crate::error::{Error, Result};
use crate::extrinsic::ExtrinsicEncoder;
use crate::node::NodeSpec;
use crate::retry::poll_until;
use crate::rpc::{envelope, to_hex, RpcClient, RpcError};
use futures::future::join_all;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Result of reading the storage key from one node.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The node returned a non-empty value.
    Observed(Vec<u8>),
    /// The node answered, but the key has no value yet.
    Empty,
    /// The read failed.
    Failed(RpcError),
}

impl PollOutcome {
    /// The value read, empty unless [`PollOutcome::Observed`].
    #[must_use]
    pub fn value(&self) -> &[u8] {
        match self {
            Self::Observed(value) => value,
            Self::Empty | Self::Failed(_) => &[],
        }
    }

    fn is_read(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    fn is_observed(&self) -> bool {
        matches!(self, Self::Observed(_))
    }
}

impl From<std::result::Result<Vec<u8>, RpcError>> for PollOutcome {
    fn from(read: std::result::Result<Vec<u8>, RpcError>) -> Self {
        match read {
            Ok(value) if value.is_empty() => Self::Empty,
            Ok(value) => Self::Observed(value),
            Err(e) => Self::Failed(e),
        }
    }
}

/// Final read of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeObservation {
    /// Node index.
    pub index: usize,
    /// Node label.
    pub name: String,
    /// What the last read returned.
    pub outcome: PollOutcome,
}

/// The submitted extrinsic and the node's raw answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    /// Index of the node that received the extrinsic.
    pub node: usize,
    /// Hex encoding that was submitted.
    pub extrinsic: String,
    /// Raw response body.
    pub response: String,
}

/// Everything a verification run observed.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    /// Reads taken before submission.
    pub baseline: Vec<NodeObservation>,
    /// The submission.
    pub submission: Submission,
    /// Final reads after polling.
    pub propagation: Vec<NodeObservation>,
    /// Value the extrinsic wrote.
    pub expected: Vec<u8>,
}

impl VerificationReport {
    /// Indices of nodes whose final read is not the expected value.
    #[must_use]
    pub fn missing(&self) -> Vec<usize> {
        self.propagation
            .iter()
            .filter(|obs| obs.outcome != PollOutcome::Observed(self.expected.clone()))
            .map(|obs| obs.index)
            .collect()
    }

    /// Whether every node ended up reporting the expected value.
    #[must_use]
    pub fn all_observed(&self) -> bool {
        self.missing().is_empty()
    }
}

/// Runs the verification sequence against a set of nodes.
pub struct Verifier<'a> {
    config: &'a HarnessConfig,
    rpc: &'a RpcClient,
    nodes: &'a [NodeSpec],
}

impl<'a> Verifier<'a> {
    /// Create a verifier over `nodes`.
    #[must_use]
    pub fn new(config: &'a HarnessConfig, rpc: &'a RpcClient, nodes: &'a [NodeSpec]) -> Self {
        Self { config, rpc, nodes }
    }

    /// Settle, read the baseline, submit `extrinsic`, and poll every node.
    ///
    /// Individual reads never fail the run; they are reported.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encoding` if the extrinsic cannot be encoded, and
    /// `Error::Submission` if the submission request fails or the node
    /// rejects it.
    pub async fn run(&self, extrinsic: &dyn ExtrinsicEncoder) -> Result<VerificationReport> {
        let settle = self.config.settle_delay();
        info!("waiting {settle:?} for the network to settle");
        tokio::time::sleep(settle).await;

        let mut baseline = Vec::with_capacity(self.nodes.len());
        for node in self.nodes {
            baseline.push(self.baseline(node).await);
        }

        let hex = extrinsic.encode_hex()?;
        let submission = self.submit(hex).await?;

        let propagation = join_all(self.nodes.iter().map(|node| self.poll(node))).await;

        Ok(VerificationReport {
            baseline,
            submission,
            propagation,
            expected: self.config.storage_value.as_bytes().to_vec(),
        })
    }

    /// Index of the node that receives the extrinsic.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if there are no nodes or the configured index
    /// is out of range.
    pub fn target(&self) -> Result<usize> {
        match self.config.submit_target {
            _ if self.nodes.is_empty() => Err(Error::Config("no nodes to submit to".to_string())),
            SubmitTarget::Node(index) if index < self.nodes.len() => Ok(index),
            SubmitTarget::Node(index) => Err(Error::Config(format!(
                "submission target {index} is not one of the {} nodes",
                self.nodes.len()
            ))),
            SubmitTarget::Random => Ok(rand::thread_rng().gen_range(0..self.nodes.len())),
        }
    }

    async fn read(&self, node: &NodeSpec) -> PollOutcome {
        self.rpc
            .get_storage(&node.endpoint, self.config.storage_key.as_bytes())
            .await
            .into()
    }

    async fn baseline(&self, node: &NodeSpec) -> NodeObservation {
        let outcome = poll_until(
            &self.config.baseline_retry,
            |attempt| {
                debug!(node = %node.name, attempt, "baseline read");
                self.read(node)
            },
            PollOutcome::is_read,
        )
        .await;
        report(node, &outcome);
        NodeObservation {
            index: node.index,
            name: node.name.clone(),
            outcome,
        }
    }

    async fn submit(&self, extrinsic: String) -> Result<Submission> {
        let index = self.target()?;
        let node = &self.nodes[index];

        let body = self
            .rpc
            .submit_extrinsic(&node.endpoint, &extrinsic)
            .await
            .map_err(|source| Error::Submission {
                node: index,
                source,
            })?;
        let response = String::from_utf8_lossy(&body).into_owned();

        println!("submitted extrinsic to node {index}");
        println!("response: {response}");

        if let Some(source) = envelope::rejection(&body) {
            return Err(Error::Submission {
                node: index,
                source,
            });
        }

        Ok(Submission {
            node: index,
            extrinsic,
            response,
        })
    }

    async fn poll(&self, node: &NodeSpec) -> NodeObservation {
        let outcome = poll_until(
            &self.config.poll_retry,
            |attempt| {
                debug!(node = %node.name, attempt, "polling for propagated value");
                self.read(node)
            },
            PollOutcome::is_observed,
        )
        .await;
        report(node, &outcome);
        NodeObservation {
            index: node.index,
            name: node.name.clone(),
            outcome,
        }
    }
}

fn report(node: &NodeSpec, outcome: &PollOutcome) {
    match outcome {
        PollOutcome::Failed(e) => {
            warn!(node = %node.name, "storage read failed: {e}");
            println!("failed to get storage from node {}: {e}", node.index);
        }
        PollOutcome::Observed(_) | PollOutcome::Empty => {
            println!(
                "got storage from node {}: {}",
                node.index,
                to_hex(outcome.value())
            );
        }
    }
}
