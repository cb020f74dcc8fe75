//! The request handler seam.

use std::collections::HashMap;
use std::future::Future;

use buho_protocol::{AuthContext, Headers, ResponseEnvelope};
use futures_util::future::BoxFuture;
use serde_json::Value;

/// Any error a handler wants to report. The dispatcher logs it and answers
/// with a generic 500; its text never reaches the caller.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerResult = Result<ResponseEnvelope, HandlerError>;

/// Everything a handler gets to see about a request.
#[derive(Debug, Clone, Default)]
pub struct HandlerRequest {
    /// Values bound by `:name` segments of the matched pattern.
    pub params: HashMap<String, String>,
    pub body: Option<Value>,
    /// Present exactly when the route requires authentication.
    pub auth: Option<AuthContext>,
    pub headers: Headers,
}

impl HandlerRequest {
    /// A bound path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Serves one route.
///
/// Implemented for any `Fn(HandlerRequest) -> impl Future<Output =
/// HandlerResult>`, so plain `async fn`s work:
///
/// ```ignore
/// async fn get_menu_item(req: HandlerRequest) -> HandlerResult {
///     let id = req.param("id").unwrap_or_default();
///     Ok(ResponseEnvelope::ok(json!({ "id": id })))
/// }
/// ```
///
/// The returned future is boxed so routes with different handlers can
/// share one table.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: HandlerRequest) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(HandlerRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, request: HandlerRequest) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(request))
    }
}
