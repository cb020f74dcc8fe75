//! Unified error type for Buho.

use buho_protocol::ProtocolError;
use buho_router::RouterError;
use buho_session::{SessionError, StoreError};
use buho_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// With the `buho` meta crate you deal with this single type instead of
/// importing each sub-crate's error. Every variant converts with `?`.
#[derive(Debug, thiserror::Error)]
pub enum BuhoError {
    /// Encoding or decoding shared types.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Reaching the server.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Logging in or acting on the client session.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Reading or writing the stored session.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Building the route table or the verifier.
    #[error(transparent)]
    Router(#[from] RouterError),
}
