//! Typed helpers for the node RPC methods the harness uses.

use super::{decode, RpcClient, RpcError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Reads a storage value: params `["0x<key>"]`, result hex string.
pub const STATE_GET_STORAGE: &str = "state_getStorage";

/// Reports the node's network state, including its peer id.
pub const SYSTEM_NETWORK_STATE: &str = "system_networkState";

/// Submits an encoded extrinsic: params `"0x<extrinsic>"`.
pub const AUTHOR_SUBMIT_EXTRINSIC: &str = "author_submitExtrinsic";

/// Result of `system_networkState`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NetworkStateResponse {
    /// The node's network state.
    pub network_state: NetworkState,
}

/// Network state of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct NetworkState {
    /// libp2p peer id.
    pub peer_id: String,
    /// Addresses the node listens on.
    #[serde(default)]
    pub multiaddrs: Vec<String>,
}

/// `0x`-prefixed lowercase hex.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Interpret a `state_getStorage` result.
///
/// `null` and `""` both become an empty vector; anything else is hex with an
/// optional `0x` prefix.
///
/// # Errors
///
/// Returns [`RpcError::Protocol`] if the value is not valid hex.
pub fn decode_storage_value(value: Option<&str>) -> Result<Vec<u8>, RpcError> {
    match value {
        None | Some("") => Ok(Vec::new()),
        Some(value) => {
            let digits = value.strip_prefix("0x").unwrap_or(value);
            hex::decode(digits).map_err(|e| {
                RpcError::protocol(format!("invalid hex storage value {value:?}: {e}"))
            })
        }
    }
}

impl RpcClient {
    /// Read the value stored under `key` on the node at `endpoint`.
    ///
    /// # Errors
    ///
    /// Transport errors, server errors, or a result that is not a hex string.
    pub async fn get_storage(&self, endpoint: &str, key: &[u8]) -> Result<Vec<u8>, RpcError> {
        let params = format!("[\"{}\"]", to_hex(key));
        let body = self.post(endpoint, STATE_GET_STORAGE, &params).await?;
        let value: Option<String> = decode(&body)?;
        decode_storage_value(value.as_deref())
    }

    /// Ask the node at `endpoint` for its peer id.
    ///
    /// # Errors
    ///
    /// Transport errors, server errors, an unexpected response shape, or an
    /// empty peer id.
    pub async fn get_peer_id(&self, endpoint: &str) -> Result<String, RpcError> {
        let state: NetworkStateResponse = self.call(endpoint, SYSTEM_NETWORK_STATE, "[]").await?;
        let peer_id = state.network_state.peer_id;
        if peer_id.is_empty() {
            return Err(RpcError::protocol("node reported an empty peer id"));
        }
        Ok(peer_id)
    }

    /// Submit a hex-encoded extrinsic and return the raw response body.
    ///
    /// The `0x` prefix on `extrinsic_hex` is optional.
    ///
    /// # Errors
    ///
    /// Only transport errors; the body is returned as-is.
    pub async fn submit_extrinsic(
        &self,
        endpoint: &str,
        extrinsic_hex: &str,
    ) -> Result<Bytes, RpcError> {
        let digits = extrinsic_hex.strip_prefix("0x").unwrap_or(extrinsic_hex);
        let params = format!("\"0x{digits}\"");
        self.post(endpoint, AUTHOR_SUBMIT_EXTRINSIC, &params).await
    }
}
