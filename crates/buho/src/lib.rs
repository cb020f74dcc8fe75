//! # Buho
//!
//! Session handling and request authorization for the Buho restaurant app.
//!
//! The client half keeps a device-bound, expiring session and attaches its
//! credential to API calls; the server half routes each call, checks the
//! credential, and runs the handler behind a fault boundary.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use buho::prelude::*;
//!
//! buho::telemetry::init("buho=info");
//!
//! let table = RouteTable::builder()
//!     .public(Method::Post, "/api/auth/login", login)
//!     .authenticated(Method::Get, "/api/favorites", list_favorites)
//!     .build()?;
//! let dispatcher = Arc::new(Dispatcher::new(table, JwtVerifier::new(secret)?));
//!
//! let session = SessionManagerBuilder::new().build(
//!     MemoryStore::new(),
//!     LoopbackTransport::new(dispatcher),
//!     TokenCodec::new(&DeviceFingerprint::from_host()),
//! );
//! session.login("ana@example.com", "secret").await?;
//! let favorites = session.request(Method::Get, "/favorites", None).await?;
//! ```

mod error;
mod loopback;
pub mod telemetry;

pub use error::BuhoError;
pub use loopback::{LoopbackTransport, DEFAULT_API_PREFIX};

pub use buho_protocol as protocol;
pub use buho_router as router;
pub use buho_session as session;
pub use buho_transport as transport;

pub mod prelude {
    pub use crate::{BuhoError, LoopbackTransport};

    pub use buho_protocol::{
        status, AuthContext, Clock, Headers, LoginData, ManualClock, Method,
        RegisterRequest, ResponseEnvelope, RestaurantDetails, Role,
        SystemClock, UserId, UserProfile,
    };
    pub use buho_router::{
        Access, AuthRejection, AuthVerifier, Dispatcher, HandlerError,
        HandlerRequest, HandlerResult, JwtVerifier, RouteTable,
    };
    pub use buho_session::{
        ActivityEvent, DeviceFingerprint, FileStore, Landing, MemoryStore,
        Navigator, SessionConfig, SessionError, SessionManager,
        SessionManagerBuilder, SessionStatus, SessionStore, SessionWatch,
        TokenCodec,
    };
    pub use buho_transport::{ApiRequest, ApiTransport, TransportError};
    #[cfg(feature = "http")]
    pub use buho_transport::{HttpConfig, HttpTransport};
}
