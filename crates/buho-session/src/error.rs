//! Error types for the session layer.

use buho_protocol::ProtocolError;
use buho_transport::TransportError;

/// Errors surfaced by the client session layer.
///
/// Expiry, inactivity, and unreadable credentials are not errors here: they
/// end the session and redirect, and callers see an absent credential or
/// [`SessionError::NotAuthenticated`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Login was attempted with an empty email or password.
    #[error("email and password are required")]
    MissingCredentials,

    /// The email address isn't shaped like one.
    #[error("invalid email address")]
    InvalidEmail,

    /// The server answered the login with `success: false`.
    #[error("login rejected: {0}")]
    LoginRejected(String),

    /// A registration password missed one or more rules. Lists every
    /// rule that failed.
    #[error("weak password: {}", .0.join("; "))]
    WeakPassword(Vec<String>),

    /// The server answered the registration with `success: false`.
    #[error("registration rejected: {0}")]
    RegistrationRejected(String),

    /// The server reported success but left out the token or the user.
    #[error("login response was incomplete")]
    IncompleteResponse,

    /// The credential could not be wrapped for storage.
    #[error("credential could not be protected: {0}")]
    Cipher(String),

    /// There is no active session to act on.
    #[error("no active session")]
    NotAuthenticated,

    /// The server could not be reached.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Session storage failed while writing.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from a [`SessionStore`](crate::SessionStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O failed: {0}")]
    Io(#[source] std::io::Error),

    /// The backing file doesn't hold a valid key/value map.
    #[error(transparent)]
    Codec(#[from] ProtocolError),
}
