//! HTTP transport built on `reqwest`.

use std::time::Duration;

use buho_protocol::{
    LoginData, LoginRequest, Method, ResponseEnvelope, status,
};
use serde_json::Value;

use crate::{ApiRequest, ApiTransport, TransportError};

/// Where the API lives and how long to wait for it.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// API root, e.g. `http://localhost:3000/api`. Request paths are
    /// appended to it.
    pub base_url: String,
    pub login_path: String,
    pub logout_path: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            login_path: "/auth/login".to_string(),
            logout_path: "/auth/logout".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// An [`ApiTransport`] that talks JSON over HTTP.
///
/// `reqwest::Client` pools connections internally and is cheap to clone,
/// so one `HttpTransport` serves every call a client makes.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpConfig,
}

impl HttpTransport {
    /// Creates a transport for the given API root.
    ///
    /// # Errors
    /// Returns [`TransportError::Client`] if the TLS backend fails to
    /// initialize.
    pub fn new(config: HttpConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self { client, config })
    }

    /// Returns the configuration in use.
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn execute(
        &self,
        request: ApiRequest,
    ) -> Result<ResponseEnvelope, TransportError> {
        let url = self.url(&request.path);
        let mut builder = self.client.request(to_reqwest(request.method), &url);
        if let Some(credential) = &request.bearer {
            builder = builder.bearer_auth(credential);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response =
            builder.send().await.map_err(TransportError::Request)?;
        let http_status = response.status();
        let bytes =
            response.bytes().await.map_err(TransportError::Request)?;

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            status = http_status.as_u16(),
            "api call finished"
        );

        match serde_json::from_slice::<ResponseEnvelope>(&bytes) {
            Ok(mut envelope) => {
                // The HTTP status wins over whatever the body claims.
                if !http_status.is_success() {
                    envelope.success = false;
                    envelope.status_code = http_status.as_u16();
                }
                Ok(envelope)
            }
            Err(_) if !http_status.is_success() => {
                Ok(ResponseEnvelope::failure(http_status.as_u16(), "server error"))
            }
            Err(e) => Err(TransportError::InvalidResponse(e.to_string())),
        }
    }
}

impl ApiTransport for HttpTransport {
    async fn login(
        &self,
        request: &LoginRequest,
    ) -> Result<ResponseEnvelope<LoginData>, TransportError> {
        let body = serde_json::to_value(request)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        let envelope = self
            .execute(
                ApiRequest::new(Method::Post, self.config.login_path.clone())
                    .with_body(body),
            )
            .await?;

        if !envelope.success {
            return Ok(ResponseEnvelope::failure(
                envelope.status_code,
                envelope.error.unwrap_or_else(|| "login failed".into()),
            ));
        }
        envelope
            .into_typed()
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))
    }

    async fn logout(&self, credential: &str) -> Result<(), TransportError> {
        let envelope = self
            .execute(
                ApiRequest::new(Method::Post, self.config.logout_path.clone())
                    .with_bearer(credential),
            )
            .await?;
        if envelope.status_code != status::OK {
            tracing::debug!(
                status = envelope.status_code,
                "server did not acknowledge logout"
            );
        }
        Ok(())
    }

    async fn send(
        &self,
        request: ApiRequest,
    ) -> Result<ResponseEnvelope<Value>, TransportError> {
        self.execute(request).await
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}
