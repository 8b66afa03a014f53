//! Extrinsic encoding.
//!
//! The node's transaction format is not ours to define; the harness only needs
//! one "set storage key to value" extrinsic. [`ExtrinsicEncoder`] is the seam
//! for plugging in a different format.

use crate::error::Result;
use crate::rpc::to_hex;
use parity_scale_codec::Encode;

/// Type tag of a storage-change extrinsic.
pub const STORAGE_CHANGE_TYPE: u8 = 3;

/// Produces the opaque bytes submitted via `author_submitExtrinsic`.
pub trait ExtrinsicEncoder: Send + Sync {
    /// Encode the extrinsic.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encoding` if the extrinsic cannot be represented.
    fn encode_extrinsic(&self) -> Result<Vec<u8>>;

    /// Encode the extrinsic as `0x`-prefixed hex.
    ///
    /// # Errors
    ///
    /// See [`ExtrinsicEncoder::encode_extrinsic`].
    fn encode_hex(&self) -> Result<String> {
        Ok(to_hex(&self.encode_extrinsic()?))
    }
}

/// Sets (or, with `value: None`, clears) one storage entry.
///
/// Encoded as the type tag followed by the SCALE encoding of the key and the
/// optional value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    /// Storage key.
    pub key: Vec<u8>,
    /// New value, or `None` to delete.
    pub value: Option<Vec<u8>>,
}

impl StorageChange {
    /// A change setting `key` to `value`.
    pub fn set(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }
}

impl ExtrinsicEncoder for StorageChange {
    fn encode_extrinsic(&self) -> Result<Vec<u8>> {
        let mut out = vec![STORAGE_CHANGE_TYPE];
        (&self.key, &self.value).encode_to(&mut out);
        Ok(out)
    }
}
