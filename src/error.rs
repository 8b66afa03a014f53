//! Error types for devnet-harness.

use crate::rpc::RpcError;
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while bringing up and verifying a devnet.
///
/// Every variant is fatal to a harness run. Errors that the harness tolerates
/// (individual storage reads, kill failures) never surface as this type.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The node binary's `init` step failed.
    #[error("failed to initialize node {node}: {reason}")]
    Init {
        /// Label of the node being initialized.
        node: String,
        /// Why initialization failed.
        reason: String,
    },

    /// The node binary could not be started.
    #[error("failed to start node {node}: {reason}")]
    Startup {
        /// Label of the node being started.
        node: String,
        /// Why the start failed.
        reason: String,
    },

    /// The first node never reported a peer id.
    #[error("failed to get peer id from first node: {0}")]
    Bootnode(#[source] RpcError),

    /// JSON-RPC error.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Extrinsic encoding error.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Submitting the extrinsic failed.
    #[error("failed to submit extrinsic to node {node}: {source}")]
    Submission {
        /// Index of the node the extrinsic was sent to.
        node: usize,
        /// Underlying RPC failure.
        #[source]
        source: RpcError,
    },
}
