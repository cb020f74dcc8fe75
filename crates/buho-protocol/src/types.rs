//! Core types shared by the session layer and the router.
//!
//! Everything here crosses the client/server boundary at some point, either
//! as JSON on the wire or as a value persisted in client storage, so every
//! type derives `Serialize`/`Deserialize` with the field names the web
//! client uses (camelCase).

use std::fmt;
use std::str::FromStr;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a user account.
///
/// `#[serde(transparent)]` keeps it a bare number on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// What a user is allowed to do.
///
/// Roles arrive as lowercase strings (`"admin"`, `"owner"`, `"user"`).
/// Anything else, including a missing role, becomes [`Role::Unknown`],
/// which is treated as the least-privileged role everywhere.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Site administrator.
    Admin,
    /// Restaurant owner: manages one restaurant, its menu, and its reviews.
    Owner,
    /// Regular diner: reviews and favorites.
    User,
    /// Unrecognised or absent role.
    #[default]
    #[serde(other)]
    Unknown,
}

impl Role {
    /// The wire name of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Owner => "owner",
            Self::User => "user",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The profile the client keeps alongside its credential.
///
/// There is no `password` field. When the server's login response includes
/// one, serde drops it on the way in and nothing can write it back out.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Server-side account id, when the server sends it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    pub email: String,

    #[serde(default)]
    pub role: Role,

    /// Relative URL of the profile photo, if one was uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

impl UserProfile {
    /// First and last name joined with a space.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Identity attached to a request after its bearer credential verified.
///
/// A route that requires authentication never reaches its handler without
/// one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub user_id: UserId,
    pub role: Role,
}

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

/// HTTP methods the API routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// The uppercase method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(ProtocolError::UnknownMethod(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ResponseEnvelope
// ---------------------------------------------------------------------------

/// Status codes used in response envelopes.
pub mod status {
    pub const OK: u16 = 200;
    pub const CREATED: u16 = 201;
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const FORBIDDEN: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const INTERNAL_ERROR: u16 = 500;
}

fn default_status() -> u16 {
    status::OK
}

/// The result of every API call: a success flag, a status code, and either
/// data or an error message.
///
/// ```json
/// { "success": true, "statusCode": 200, "data": { ... } }
/// { "success": false, "statusCode": 401, "error": "unauthorized" }
/// ```
///
/// `T` defaults to untyped JSON, which is what handlers and the router deal
/// in; clients narrow it with [`ResponseEnvelope::into_typed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope<T = Value> {
    pub success: bool,

    #[serde(default = "default_status")]
    pub status_code: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ResponseEnvelope<T> {
    /// A successful envelope carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            status_code: status::OK,
            data: Some(data),
            error: None,
        }
    }

    /// A failed envelope with the given status and message.
    pub fn failure(status_code: u16, error: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code,
            data: None,
            error: Some(error.into()),
        }
    }

    /// 401: missing or invalid credential.
    pub fn unauthorized(error: impl Into<String>) -> Self {
        Self::failure(status::UNAUTHORIZED, error)
    }

    /// 403: valid credential, wrong role.
    pub fn forbidden() -> Self {
        Self::failure(status::FORBIDDEN, "forbidden")
    }

    /// 404: no route matched.
    pub fn not_found() -> Self {
        Self::failure(status::NOT_FOUND, "not found")
    }

    /// 500: a handler failed. The message never carries fault details.
    pub fn internal_error() -> Self {
        Self::failure(status::INTERNAL_ERROR, "internal server error")
    }
}

impl ResponseEnvelope<Value> {
    /// Converts untyped `data` into a concrete type.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if `data` doesn't match `U`.
    pub fn into_typed<U: DeserializeOwned>(
        self,
    ) -> Result<ResponseEnvelope<U>, ProtocolError> {
        let data = self
            .data
            .map(serde_json::from_value)
            .transpose()
            .map_err(ProtocolError::Decode)?;
        Ok(ResponseEnvelope {
            success: self.success,
            status_code: self.status_code,
            data,
            error: self.error,
        })
    }
}

// ---------------------------------------------------------------------------
// Login contract
// ---------------------------------------------------------------------------

/// Body of `POST /auth/login`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Keeps the password out of logs.
impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `data` of a successful login response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginData {
    /// Server-issued bearer credential.
    pub token: String,
    pub user: UserProfile,
}

// ---------------------------------------------------------------------------
// Registration contract
// ---------------------------------------------------------------------------

/// Body of `POST /auth/register`.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub role: Role,

    /// The restaurant an owner manages. Only sent for [`Role::Owner`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant: Option<RestaurantDetails>,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .field("restaurant", &self.restaurant)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RestaurantDetails {
    pub name: String,
    pub address: String,
}
