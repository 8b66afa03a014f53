//! JSON-RPC 2.0 request/response envelopes.

use super::RpcError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request id used for every call; the harness never pipelines requests.
pub const REQUEST_ID: u64 = 1;

/// Build a request body around caller-supplied parameter JSON.
///
/// `params` is inserted verbatim and must already be valid JSON.
#[must_use]
pub fn request_body(method: &str, params: &str) -> String {
    format!(r#"{{"jsonrpc":"2.0","method":"{method}","params":{params},"id":{REQUEST_ID}}}"#)
}

/// A JSON-RPC response. Unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcResponse {
    /// Protocol version, `"2.0"`.
    #[serde(default)]
    pub jsonrpc: String,
    /// Result payload, absent or `null` on error.
    #[serde(default)]
    pub result: Option<Value>,
    /// Error object, absent or `null` on success.
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
    /// Request id echoed back.
    #[serde(default)]
    pub id: Option<Value>,
}

/// The `error` member of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcErrorObject {
    /// Human readable message.
    pub message: String,
    /// Numeric error code.
    #[serde(default)]
    pub code: i64,
    /// Optional structured details.
    #[serde(default)]
    pub data: Option<Value>,
}

impl From<RpcErrorObject> for RpcError {
    fn from(err: RpcErrorObject) -> Self {
        Self::Protocol {
            message: err.message,
            code: Some(err.code),
            data: err.data,
        }
    }
}

/// Decode a response body into `T`.
///
/// A populated `error` member is returned as [`RpcError::Protocol`] without
/// looking at `result`. A missing or `null` result decodes as JSON `null`, so
/// `T = Option<_>` observes it as `None`.
///
/// # Errors
///
/// Returns [`RpcError::Protocol`] for malformed envelopes, unknown fields,
/// server errors, and results that do not match `T`.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, RpcError> {
    let response: RpcResponse = serde_json::from_slice(body)
        .map_err(|e| RpcError::protocol(format!("invalid response envelope: {e}")))?;

    if let Some(err) = response.error {
        return Err(err.into());
    }

    serde_json::from_value(response.result.unwrap_or(Value::Null))
        .map_err(|e| RpcError::protocol(format!("invalid result payload: {e}")))
}

/// The server-side error carried by `body`, if it is a well-formed envelope
/// with a populated `error` member.
#[must_use]
pub fn rejection(body: &[u8]) -> Option<RpcError> {
    serde_json::from_slice::<RpcResponse>(body)
        .ok()
        .and_then(|response| response.error)
        .map(Into::into)
}
