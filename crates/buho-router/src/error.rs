//! Error types for the router.

use buho_protocol::Method;

/// Errors raised while building a [`RouteTable`](crate::RouteTable) or a
/// verifier.
///
/// Dispatch itself never fails: misses, rejections, and handler faults all
/// come back as response envelopes.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// A path pattern could not be parsed.
    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Two routes with the same method and the same path shape.
    #[error("duplicate route: {method} {pattern}")]
    DuplicateRoute { method: Method, pattern: String },

    /// A bearer verifier was built without a signing secret.
    #[error("signing secret must not be empty")]
    EmptySecret,

    /// A token could not be signed.
    #[error("token signing failed: {0}")]
    Token(String),
}
