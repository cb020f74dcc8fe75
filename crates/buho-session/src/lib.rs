//! Client-side session management for Buho.
//!
//! Owns everything the client knows about being logged in: the protected
//! credential, the profile, and the two timestamps that decide when the
//! session ends.
//!
//! # Key types
//!
//! - [`SessionManager`]: login, logout, credential access, navigation guards
//! - [`TokenCodec`]: encrypts the credential under a device-derived key
//! - [`SessionClock`]: applies lifetime and inactivity deadlines
//! - [`SessionStore`]: where the record lives ([`MemoryStore`], [`FileStore`])
//! - [`SessionWatch`]: background task that ends idle sessions
//! - [`Navigator`]: receives redirects

#![allow(async_fn_in_trait)]

mod clock;
mod codec;
mod error;
mod manager;
mod navigate;
mod store;
mod watch;

pub use clock::{SessionClock, SessionConfig, SessionStatus, Timestamps};
pub use codec::{
    jwt_expiry, looks_like_jwt, CodecParams, DeviceFingerprint, JwtExpiry,
    TokenCodec, WrappedCredential,
};
pub use error::{SessionError, StoreError};
pub use manager::{
    password_problems, ActivityEvent, SessionManager, SessionManagerBuilder,
    TeardownReason,
};
pub use navigate::{landing_for, Landing, Navigator, TracingNavigator};
pub use store::{keys, FileStore, MemoryStore, SessionStore};
pub use watch::SessionWatch;
