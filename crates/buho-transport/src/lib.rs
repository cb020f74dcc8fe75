//! Transport abstraction layer for Buho.
//!
//! Provides the [`ApiTransport`] trait the client session layer uses to reach
//! the server: the login and logout endpoints, plus every other API call
//! once a credential is available.
//!
//! # Feature Flags
//!
//! - `http` (default): HTTP transport via `reqwest` ([`HttpTransport`])

mod error;
#[cfg(feature = "http")]
mod http;

pub use error::TransportError;
#[cfg(feature = "http")]
pub use http::{HttpConfig, HttpTransport};

use std::fmt;
use std::future::Future;

use buho_protocol::{LoginData, LoginRequest, Method, ResponseEnvelope};
use serde_json::Value;

/// One API call as the client sees it.
#[derive(Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base, e.g. `/restaurants/42`.
    pub path: String,
    pub body: Option<Value>,
    /// Credential sent as `Authorization: Bearer <credential>`.
    pub bearer: Option<String>,
}

impl ApiRequest {
    /// A request with no body and no credential.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            bearer: None,
        }
    }

    /// Attaches a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attaches a bearer credential.
    pub fn with_bearer(mut self, credential: impl Into<String>) -> Self {
        self.bearer = Some(credential.into());
        self
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body", &self.body)
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Reaches the server on behalf of the client.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → the session manager shares one transport
///   between the caller, the background activity watch, and the
///   fire-and-forget logout task.
/// - Every returned future is `Send`, so calls can be spawned onto Tokio.
pub trait ApiTransport: Send + Sync + 'static {
    /// `POST login {email, password}`.
    ///
    /// A rejected login is a normal envelope with `success: false`; only
    /// failures to get any answer are `Err`.
    fn login(
        &self,
        request: &LoginRequest,
    ) -> impl Future<Output = Result<ResponseEnvelope<LoginData>, TransportError>>
    + Send;

    /// `POST logout` with the bearer credential. Best effort.
    fn logout(
        &self,
        credential: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Any other API call.
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ResponseEnvelope, TransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_request_builders_set_fields() {
        let req = ApiRequest::new(Method::Post, "/reviews")
            .with_body(json!({ "rating": 5 }))
            .with_bearer("tok");

        assert_eq!(req.method, Method::Post);
        assert_eq!(req.path, "/reviews");
        assert_eq!(req.body, Some(json!({ "rating": 5 })));
        assert_eq!(req.bearer.as_deref(), Some("tok"));
    }

    #[test]
    fn test_api_request_debug_redacts_bearer() {
        let req = ApiRequest::new(Method::Get, "/favorites")
            .with_bearer("very-secret-token");

        let debug = format!("{req:?}");

        assert!(!debug.contains("very-secret-token"));
        assert!(debug.contains("<redacted>"));
    }
}
