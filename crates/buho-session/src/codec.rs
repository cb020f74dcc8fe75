//! Wrapping the bearer credential before it is written to client storage.
//!
//! The credential is encrypted with AES-256-GCM under a key derived
//! (PBKDF2-HMAC-SHA256) from a [`DeviceFingerprint`]. The fingerprint is
//! built from public properties of the client environment and a fixed
//! application constant, so this is NOT a secret: anyone with the stored
//! value and the same environment can unwrap it. What it does do is stop a
//! stored session from working after being copied to a different device.
//!
//! # Stored format
//!
//! ```text
//! base64( iv[12] ‖ ciphertext ‖ tag[16] )
//! ```
//!
//! Standard base64 never contains `.`, so a wrapped value can always be
//! told apart from a three-segment JWT stored before wrapping existed.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use rand::Rng;
use serde_json::{Map, Value};
use sha2::Sha256;

use crate::SessionError;

/// AES-GCM nonce length (96 bits).
const IV_LEN: usize = 12;

/// AES-GCM authentication tag length.
const TAG_LEN: usize = 16;

// ---------------------------------------------------------------------------
// DeviceFingerprint
// ---------------------------------------------------------------------------

/// Public properties of the client environment used as key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFingerprint {
    pub user_agent: String,
    pub locale: String,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl DeviceFingerprint {
    /// Fingerprint for a native client: crate version, OS, and
    /// architecture as the user agent, `LANG` as the locale. Native
    /// clients have no screen, so both dimensions are zero.
    pub fn from_host() -> Self {
        let locale = std::env::var("LANG")
            .ok()
            .and_then(|lang| lang.split('.').next().map(str::to_string))
            .filter(|lang| !lang.is_empty())
            .unwrap_or_else(|| "en-US".to_string());
        Self {
            user_agent: format!(
                "buho-client/{} ({}; {})",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
            locale,
            screen_width: 0,
            screen_height: 0,
        }
    }

    /// The PBKDF2 password: every field concatenated, then the application
    /// constant.
    pub fn key_material(&self, app_constant: &str) -> String {
        format!(
            "{}{}{}{}{}",
            self.user_agent,
            self.locale,
            self.screen_width,
            self.screen_height,
            app_constant
        )
    }
}

// ---------------------------------------------------------------------------
// CodecParams
// ---------------------------------------------------------------------------

/// Fixed key-derivation parameters.
///
/// Every client of one deployment must use the same values, or credentials
/// stored by one build can't be read by the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecParams {
    pub salt: String,
    pub iterations: u32,
    pub app_constant: String,
}

impl Default for CodecParams {
    fn default() -> Self {
        Self {
            salt: "buho-eats-salt-2025".to_string(),
            iterations: 100_000,
            app_constant: "buho-eats-secret-key-2025".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// TokenCodec
// ---------------------------------------------------------------------------

/// A wrapped credential, ready to store.
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedCredential(String);

impl WrappedCredential {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for WrappedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WrappedCredential({} bytes)", self.0.len())
    }
}

/// Wraps and unwraps bearer credentials for one device.
///
/// The key is derived once, when the codec is built. PBKDF2 with the
/// default 100 000 iterations is slow, so build the codec once
/// at startup and clone it (cloning copies the expanded key, nothing more).
#[derive(Clone)]
pub struct TokenCodec {
    cipher: Aes256Gcm,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Derives the key for `fingerprint` with the default parameters.
    pub fn new(fingerprint: &DeviceFingerprint) -> Self {
        Self::with_params(fingerprint, &CodecParams::default())
    }

    /// Derives the key for `fingerprint` with explicit parameters.
    pub fn with_params(
        fingerprint: &DeviceFingerprint,
        params: &CodecParams,
    ) -> Self {
        let mut key = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(
            fingerprint.key_material(&params.app_constant).as_bytes(),
            params.salt.as_bytes(),
            params.iterations.max(1),
            &mut key,
        );
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        Self { cipher }
    }

    /// Encrypts `credential` under a fresh random IV.
    ///
    /// # Errors
    /// Returns [`SessionError::Cipher`] if the cipher refuses the input
    /// (only possible for inputs far beyond any real token size).
    pub fn wrap(
        &self,
        credential: &str,
    ) -> Result<WrappedCredential, SessionError> {
        let iv: [u8; IV_LEN] = rand::rng().random();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&iv), credential.as_bytes())
            .map_err(|_| SessionError::Cipher("encryption failed".into()))?;

        let mut combined = Vec::with_capacity(IV_LEN + ciphertext.len());
        combined.extend_from_slice(&iv);
        combined.extend_from_slice(&ciphertext);
        Ok(WrappedCredential(STANDARD.encode(combined)))
    }

    /// Recovers the credential from a stored value.
    ///
    /// A value that already looks like a JWT is returned unchanged, since
    /// it was stored before wrapping existed. Everything else must decrypt
    /// and authenticate under this device's key; any failure (bad base64,
    /// too short, tag mismatch, not UTF-8) yields `None`.
    pub fn unwrap(&self, stored: &str) -> Option<String> {
        let stored = stored.trim();
        if looks_like_jwt(stored) {
            return Some(stored.to_string());
        }

        let combined = match STANDARD.decode(stored) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(error = %e, "stored credential is not base64");
                return None;
            }
        };
        if combined.len() < IV_LEN + TAG_LEN {
            tracing::debug!(
                len = combined.len(),
                "stored credential is too short"
            );
            return None;
        }

        let (iv, ciphertext) = combined.split_at(IV_LEN);
        let plaintext =
            match self.cipher.decrypt(Nonce::from_slice(iv), ciphertext) {
                Ok(plaintext) => plaintext,
                Err(_) => {
                    // Wrong device, or the value was tampered with.
                    tracing::debug!("stored credential failed authentication");
                    return None;
                }
            };
        String::from_utf8(plaintext).ok()
    }
}

// ---------------------------------------------------------------------------
// JWT shape
// ---------------------------------------------------------------------------

/// Decodes one JWT segment. Tokens in the wild use both the URL-safe and
/// the standard alphabet, with or without padding.
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let segment = segment.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(segment)
        .or_else(|_| STANDARD_NO_PAD.decode(segment))
        .ok()
}

fn decode_json_segment(segment: &str) -> Option<Map<String, Value>> {
    serde_json::from_slice(&decode_segment(segment)?).ok()
}

/// Returns `true` for `header.payload.signature` where the header decodes
/// to a JSON object naming an `alg` or a `typ`.
pub fn looks_like_jwt(value: &str) -> bool {
    let segments: Vec<&str> = value.split('.').collect();
    if segments.len() != 3 {
        return false;
    }
    decode_json_segment(segments[0])
        .is_some_and(|header| header.contains_key("alg") || header.contains_key("typ"))
}

/// What a credential says about its own expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwtExpiry {
    /// Not JWT-shaped: the server decides when it expires.
    Opaque,
    /// A JWT without a numeric `exp` claim.
    Unbounded,
    /// A JWT whose `exp` claim is this many epoch seconds.
    At(u64),
    /// JWT-shaped, but the payload doesn't decode to a JSON object. Treated
    /// as already expired.
    Unreadable,
}

/// Reads the `exp` claim of a JWT-shaped credential.
pub fn jwt_expiry(value: &str) -> JwtExpiry {
    if !looks_like_jwt(value) {
        return JwtExpiry::Opaque;
    }
    let Some(payload) = value.split('.').nth(1).and_then(decode_json_segment)
    else {
        return JwtExpiry::Unreadable;
    };
    match payload.get("exp") {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f as u64))
            .map_or(JwtExpiry::Unbounded, JwtExpiry::At),
        _ => JwtExpiry::Unbounded,
    }
}
