//! Error types for the protocol layer.
//!
//! Each crate in Buho defines its own error enum. A `ProtocolError` always
//! means a value could not be converted to or from its wire form.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, or
    /// truncated storage entries.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A method name that isn't one of the supported HTTP verbs.
    #[error("unknown method: {0}")]
    UnknownMethod(String),
}
