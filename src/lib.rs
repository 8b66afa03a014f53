//! # devnet-harness
//!
//! Brings up a small local network of an external blockchain node binary and
//! checks that a storage write submitted to one node shows up on all of them.
//!
//! A run goes through these phases:
//! - **Launch**: `init` and start 3, 6 or 9 node processes, optionally pointing
//!   every node at the first one as bootnode
//! - **Verify**: read a baseline, submit one storage-change extrinsic over
//!   JSON-RPC, poll every node for the new value
//! - **Teardown**: kill every started process exactly once
//!
//! ## Example
//!
//! ```rust,no_run
//! use devnet_harness::{HarnessConfig, Network};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HarnessConfig {
//!         node_count: 3,
//!         connect: true,
//!         ..HarnessConfig::default()
//!     };
//!     let mut network = Network::new(config)?;
//!     let outcome = match network.start().await {
//!         Ok(()) => network.verify().await.map(|report| report.all_observed()),
//!         Err(e) => Err(e),
//!     };
//!     network.shutdown().await;
//!     println!("propagated everywhere: {}", outcome?);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod extrinsic;
pub mod launcher;
pub mod network;
pub mod node;
pub mod retry;
pub mod rpc;
pub mod verify;

pub use config::{HarnessConfig, RpcConfig, SubmitTarget};
pub use error::{Error, Result};
pub use extrinsic::{ExtrinsicEncoder, StorageChange};
pub use launcher::{Launcher, NodeLogs, NodeProcess, Termination};
pub use network::{ManifestNode, Network, NetworkManifest, Phase};
pub use node::{bootnode_address, NodeSpec};
pub use retry::RetryPolicy;
pub use rpc::{RpcClient, RpcError};
pub use verify::{NodeObservation, PollOutcome, Submission, VerificationReport, Verifier};
