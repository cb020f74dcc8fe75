//! Server-side routing and authorization for the Buho API.
//!
//! # Key types
//!
//! - [`RouteTable`]: every `method + pattern`, built once at startup
//!   ([`RouteTableBuilder`] groups routes as public, authenticated, or
//!   role-restricted)
//! - [`RouteTable::match_route`]: exact literal lookup first, then an
//!   ordered scan of parametrized patterns
//! - [`Dispatcher`]: match, verify, call the handler, and turn every
//!   outcome into a [`ResponseEnvelope`](buho_protocol::ResponseEnvelope)
//! - [`AuthVerifier`]: the credential check seam; [`JwtVerifier`] is the
//!   HS256 implementation
//! - [`Handler`]: what a route runs; any `async fn(HandlerRequest)` fits

#![allow(async_fn_in_trait)]

mod dispatch;
mod error;
mod handler;
mod matcher;
mod pattern;
mod table;
mod verify;

pub use dispatch::Dispatcher;
pub use error::RouterError;
pub use handler::{Handler, HandlerError, HandlerRequest, HandlerResult};
pub use matcher::RouteMatch;
pub use pattern::{PathPattern, Segment, PARAM_MARKER};
pub use table::{Access, Route, RouteInfo, RouteTable, RouteTableBuilder};
pub use verify::{AuthRejection, AuthVerifier, Claims, JwtVerifier};
