//! The server-side request pipeline.
//!
//! ```text
//! (method, path, headers, body)
//!   → match route ──── none ──────────────→ 404
//!   → requires auth? ─ verifier rejects ──→ 401 (handler not called)
//!                   └─ role not allowed ──→ 403 (handler not called)
//!   → handler ──────── Err or panic ──────→ 500 (logged, details withheld)
//!   → handler's envelope, unchanged
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;

use buho_protocol::{Headers, Method, ResponseEnvelope};
use futures_util::FutureExt;
use serde_json::Value;

use crate::{AuthVerifier, HandlerRequest, RouteTable};

/// Routes requests through a [`RouteTable`], checking credentials with `V`.
///
/// Holds no per-request state; share it behind an `Arc` and call
/// [`dispatch`](Self::dispatch) from as many tasks as needed.
pub struct Dispatcher<V: AuthVerifier> {
    table: RouteTable,
    verifier: V,
}

impl<V: AuthVerifier> Dispatcher<V> {
    pub fn new(table: RouteTable, verifier: V) -> Self {
        Self { table, verifier }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    /// Handles one request. Never fails: every outcome is an envelope.
    ///
    /// At most one handler runs, at most once.
    pub async fn dispatch(
        &self,
        method: Method,
        path: &str,
        headers: &Headers,
        body: Option<Value>,
    ) -> ResponseEnvelope {
        let Some(matched) = self.table.match_route(method, path) else {
            tracing::debug!(%method, %path, "no route");
            return ResponseEnvelope::not_found();
        };
        let route = matched.route;
        let pattern = route.pattern.as_str();

        let auth = if route.access.requires_auth() {
            match self.verifier.verify(headers).await {
                Ok(ctx) if route.access.permits(ctx.role) => Some(ctx),
                Ok(ctx) => {
                    tracing::debug!(%method, %pattern, user_id = %ctx.user_id, role = %ctx.role, "role not permitted");
                    return ResponseEnvelope::forbidden();
                }
                Err(rejection) => {
                    tracing::debug!(%method, %pattern, reason = %rejection.message, "request rejected");
                    return rejection.into_envelope();
                }
            }
        } else {
            None
        };

        let request = HandlerRequest {
            params: matched.params,
            body,
            auth,
            headers: headers.clone(),
        };
        let handler = &route.handler;

        // The call itself sits inside the async block so a panic while
        // building the future is caught too.
        match AssertUnwindSafe(async move { handler.call(request).await })
            .catch_unwind()
            .await
        {
            Ok(Ok(envelope)) => envelope,
            Ok(Err(e)) => {
                tracing::error!(%method, %pattern, error = %e, "handler failed");
                ResponseEnvelope::internal_error()
            }
            Err(panic) => {
                tracing::error!(%method, %pattern, panic = panic_message(&*panic), "handler panicked");
                ResponseEnvelope::internal_error()
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic>")
}
