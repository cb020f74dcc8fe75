//! Shared types for Buho's client and server halves.
//!
//! This crate defines the vocabulary both sides agree on:
//!
//! - **Identity** ([`UserId`], [`Role`], [`UserProfile`], [`AuthContext`]):
//!   who a caller is once their bearer credential has been checked.
//! - **Requests and responses** ([`Method`], [`Headers`],
//!   [`ResponseEnvelope`], [`LoginRequest`], [`LoginData`],
//!   [`RegisterRequest`]): the shapes that
//!   travel between the session layer and the router.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how values are turned into
//!   bytes for storage.
//! - **Clock** ([`Clock`], [`SystemClock`], [`ManualClock`]): wall-clock
//!   milliseconds, injectable so expiry rules can be tested exactly.
//!
//! # Architecture
//!
//! ```text
//! Session (client) ─┐
//!                   ├─→ Protocol (this crate)
//! Router (server) ──┘
//! ```

mod clock;
mod codec;
mod error;
mod headers;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use headers::Headers;
pub use types::{
    status, AuthContext, LoginData, LoginRequest, Method, RegisterRequest,
    ResponseEnvelope, RestaurantDetails, Role, UserId, UserProfile,
};
