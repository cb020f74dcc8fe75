//! Bearer credential verification.
//!
//! [`AuthVerifier`] is the seam the dispatcher calls for every route that
//! requires authentication. [`JwtVerifier`] is the stock implementation:
//! HS256-signed tokens carrying the user id and role.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use buho_protocol::{
    status, AuthContext, Clock, Headers, ResponseEnvelope, Role, SystemClock,
    UserId,
};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::RouterError;

/// Why a request was refused before reaching its handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRejection {
    pub status_code: u16,
    pub message: String,
}

impl AuthRejection {
    /// A 401 with the given message.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status_code: status::UNAUTHORIZED,
            message: message.into(),
        }
    }

    pub fn into_envelope(self) -> ResponseEnvelope {
        ResponseEnvelope::failure(self.status_code, self.message)
    }
}

/// Checks the credential on an incoming request.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static`: one verifier serves every request
///   concurrently, so any key material it holds must be safe to read from
///   many tasks at once.
pub trait AuthVerifier: Send + Sync + 'static {
    /// Validates the `Authorization` header.
    ///
    /// # Returns
    /// - `Ok(AuthContext)`: who the caller is
    /// - `Err(AuthRejection)`: missing, malformed, or expired credential
    ///   (401 unless the verifier says otherwise)
    fn verify(
        &self,
        headers: &Headers,
    ) -> impl Future<Output = Result<AuthContext, AuthRejection>> + Send;
}

// ---------------------------------------------------------------------------
// JwtVerifier
// ---------------------------------------------------------------------------

/// Claims carried by a Buho bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub role: Role,
    /// Issued at, epoch seconds.
    pub iat: u64,
    /// Expires at, epoch seconds.
    pub exp: u64,
}

/// Issues and verifies HS256 JWTs signed with a shared secret.
///
/// Expiry is checked against the verifier's own [`Clock`], so tests can
/// step past `exp` without sleeping.
#[derive(Clone)]
pub struct JwtVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl JwtVerifier {
    /// # Errors
    /// [`RouterError::EmptySecret`] for an empty secret.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, RouterError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(RouterError::EmptySecret);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = false;
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            clock: Arc::new(SystemClock),
        })
    }

    /// Uses `clock` for `iat`/`exp` instead of the system clock.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn now_secs(&self) -> u64 {
        self.clock.now_millis() / 1000
    }

    /// Mints a token for `user_id` valid for `ttl`.
    ///
    /// # Errors
    /// [`RouterError::Token`] if the claims cannot be signed.
    pub fn issue(
        &self,
        user_id: UserId,
        role: Role,
        ttl: Duration,
    ) -> Result<String, RouterError> {
        let iat = self.now_secs();
        let claims = Claims {
            sub: user_id,
            role,
            iat,
            exp: iat.saturating_add(ttl.as_secs()),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| RouterError::Token(e.to_string()))
    }

    /// Checks algorithm, signature, claims, and expiry.
    pub fn decode(&self, token: &str) -> Result<Claims, AuthRejection> {
        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthRejection::unauthorized("token expired"),
                _ => AuthRejection::unauthorized("invalid token"),
            })?
            .claims;
        if self.now_secs() >= claims.exp {
            return Err(AuthRejection::unauthorized("token expired"));
        }
        Ok(claims)
    }
}

impl AuthVerifier for JwtVerifier {
    async fn verify(&self, headers: &Headers) -> Result<AuthContext, AuthRejection> {
        let token = headers
            .bearer_token()
            .ok_or_else(|| AuthRejection::unauthorized("authentication required"))?;
        let claims = self.decode(token)?;
        Ok(AuthContext {
            user_id: claims.sub,
            role: claims.role,
        })
    }
}
