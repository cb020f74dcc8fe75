//! Codec trait and implementations for serializing/deserializing values.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The session store persists profiles and timestamps through a [`Codec`]
//! so the on-disk format can change without touching the store itself.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// - `Send + Sync` → safe to share between tasks.
/// - `'static` → the codec owns everything it needs, so it can live inside
///   long-lived stores and background tasks.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// JSON keeps stored session entries readable, which matches how a browser
/// profile keeps them in local storage.
///
/// ```rust
/// use buho_protocol::{Codec, JsonCodec, Role};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&Role::Owner).unwrap();
/// assert_eq!(bytes, br#""owner""#);
///
/// let role: Role = codec.decode(&bytes).unwrap();
/// assert_eq!(role, Role::Owner);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
