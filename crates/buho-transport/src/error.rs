/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP client could not be constructed.
    #[cfg(feature = "http")]
    #[error("client setup failed: {0}")]
    Client(#[source] reqwest::Error),

    /// The request never produced a response (connect, TLS, timeout).
    #[cfg(feature = "http")]
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The server answered with something that isn't a response envelope.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The server is not reachable through this transport at all.
    #[error("server unreachable: {0}")]
    Unreachable(String),
}
