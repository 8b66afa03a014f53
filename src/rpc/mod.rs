//! Minimal JSON-RPC 2.0 client over HTTP.
//!
//! Requests are plain POSTs built from a method name and raw parameter JSON;
//! responses are decoded strictly (see [`envelope::decode`]).

pub mod envelope;
mod methods;

pub use envelope::{decode, RpcErrorObject, RpcResponse};
pub use methods::{
    decode_storage_value, to_hex, NetworkState, NetworkStateResponse, AUTHOR_SUBMIT_EXTRINSIC,
    STATE_GET_STORAGE, SYSTEM_NETWORK_STATE,
};

use crate::config::RpcConfig;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

/// Errors returned by the RPC client.
///
/// Transport failures are worth retrying; protocol errors mean the node
/// answered and rejected or garbled the call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    /// The request never produced a 200 response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response was an error object or did not match the expected shape.
    #[error("{message}")]
    Protocol {
        /// Error message, verbatim from the server when it sent one.
        message: String,
        /// Server error code, if the server sent one.
        code: Option<i64>,
        /// Structured error data, if the server sent any.
        data: Option<Value>,
    },
}

impl RpcError {
    /// A protocol error raised locally, without a server code.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
            code: None,
            data: None,
        }
    }

    /// Whether the request failed before a response was received.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether the node answered but the answer was an error.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }
}

/// HTTP JSON-RPC client shared by every phase of the harness.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: reqwest::Client,
}

impl RpcClient {
    /// Create a client with the configured connect and request timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &RpcConfig) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("devnet-harness/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.dial_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| RpcError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// POST one request and return the raw response body.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Transport`] on connection failures, timeouts, and
    /// any status other than 200.
    pub async fn post(
        &self,
        endpoint: &str,
        method: &str,
        params: &str,
    ) -> Result<Bytes, RpcError> {
        let body = envelope::request_body(method, params);
        trace!(%endpoint, %method, %body, "JSON-RPC request");

        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                RpcError::Transport(format!("{method} request to {endpoint} failed: {e}"))
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RpcError::Transport(format!(
                "{method} request to {endpoint} returned status {status}"
            )));
        }

        response.bytes().await.map_err(|e| {
            RpcError::Transport(format!("failed to read {method} response from {endpoint}: {e}"))
        })
    }

    /// POST one request and decode its result as `T`.
    ///
    /// # Errors
    ///
    /// Transport errors from [`Self::post`], protocol errors from [`decode`].
    pub async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: &str,
        params: &str,
    ) -> Result<T, RpcError> {
        let body = self.post(endpoint, method, params).await?;
        decode(&body)
    }
}
