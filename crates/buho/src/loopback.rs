//! An in-process transport: the client session talks straight to a
//! [`Dispatcher`] without a network in between.
//!
//! Used by the end-to-end tests and the demo, and handy for embedding the
//! API in a single binary.

use std::sync::Arc;

use buho_protocol::{Headers, LoginData, LoginRequest, Method, ResponseEnvelope};
use buho_router::{AuthVerifier, Dispatcher};
use buho_transport::{ApiRequest, ApiTransport, TransportError};
use serde_json::json;

/// Path prefix the route table serves the API under.
pub const DEFAULT_API_PREFIX: &str = "/api";

/// Implements [`ApiTransport`] by calling [`Dispatcher::dispatch`].
///
/// Client paths such as `/restaurants` are prefixed with the API prefix
/// (`/api` by default) before dispatch, mirroring the HTTP base URL.
pub struct LoopbackTransport<V: AuthVerifier> {
    dispatcher: Arc<Dispatcher<V>>,
    prefix: String,
}

impl<V: AuthVerifier> LoopbackTransport<V> {
    pub fn new(dispatcher: Arc<Dispatcher<V>>) -> Self {
        Self {
            dispatcher,
            prefix: DEFAULT_API_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<V>> {
        &self.dispatcher
    }

    fn path(&self, path: &str) -> String {
        format!("{}{}", self.prefix.trim_end_matches('/'), path)
    }
}

impl<V: AuthVerifier> Clone for LoopbackTransport<V> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            prefix: self.prefix.clone(),
        }
    }
}

impl<V: AuthVerifier> ApiTransport for LoopbackTransport<V> {
    async fn login(
        &self,
        request: &LoginRequest,
    ) -> Result<ResponseEnvelope<LoginData>, TransportError> {
        let body = json!({ "email": request.email, "password": request.password });
        self.dispatcher
            .dispatch(Method::Post, &self.path("/auth/login"), &Headers::new(), Some(body))
            .await
            .into_typed()
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }

    async fn logout(&self, credential: &str) -> Result<(), TransportError> {
        let envelope = self
            .dispatcher
            .dispatch(
                Method::Post,
                &self.path("/auth/logout"),
                &Headers::with_bearer(credential),
                None,
            )
            .await;
        if !envelope.success {
            tracing::debug!(status = envelope.status_code, "server refused logout");
        }
        Ok(())
    }

    async fn send(&self, request: ApiRequest) -> Result<ResponseEnvelope, TransportError> {
        let headers = match &request.bearer {
            Some(credential) => Headers::with_bearer(credential),
            None => Headers::new(),
        };
        Ok(self
            .dispatcher
            .dispatch(request.method, &self.path(&request.path), &headers, request.body)
            .await)
    }
}
