//! The session manager: the client's single owner of login state.
//!
//! It is responsible for:
//! - Logging in and persisting the wrapped credential with its timestamps
//! - Handing out the credential only while the session is Active
//! - Recording activity and noticing expiry or inactivity
//! - Tearing the session down (clear storage, tell the server, redirect)
//! - Guarding navigation by authentication and role
//!
//! # Concurrency note
//!
//! Several independent triggers can reach the manager at once: a caller
//! fetching the credential, an interaction event, the background
//! [`SessionWatch`](crate::SessionWatch). Every operation that reads the
//! stored record and then acts on it holds the `gate` mutex for the whole
//! check-then-act sequence, so a teardown can never land between "the
//! session is Active" and "here is the credential".

use std::fmt;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use buho_protocol::{
    status, Clock, LoginRequest, Method, ProtocolError, RegisterRequest,
    ResponseEnvelope, RestaurantDetails, Role, SystemClock, UserProfile,
};
use buho_transport::{ApiRequest, ApiTransport, TransportError};
use regex::Regex;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::codec::{jwt_expiry, JwtExpiry};
use crate::store::keys;
use crate::{
    landing_for, Landing, Navigator, SessionClock, SessionConfig,
    SessionError, SessionStatus, SessionStore, StoreError, Timestamps,
    TokenCodec, TracingNavigator,
};

// ---------------------------------------------------------------------------
// Public helper types
// ---------------------------------------------------------------------------

/// User interactions that count as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    PointerDown,
    KeyPress,
    Scroll,
    Touch,
}

/// Why a session was torn down. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    /// The user logged out.
    Logout,
    /// The session lifetime (or the credential's own `exp`) passed.
    Expired,
    /// No interaction within the inactivity limit.
    Inactive,
    /// Stored entries were incomplete or the credential was unreadable.
    Invalid,
    /// The server answered 401 to an authenticated call.
    Rejected,
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Logout => "logout",
            Self::Expired => "expired",
            Self::Inactive => "inactive",
            Self::Invalid => "invalid",
            Self::Rejected => "rejected",
        })
    }
}

// ---------------------------------------------------------------------------
// Internal record types
// ---------------------------------------------------------------------------

/// What storage currently holds.
enum Stored {
    /// None of the session keys.
    Empty,
    /// Some keys, or all keys with unreadable values.
    Partial,
    Complete {
        wrapped: String,
        profile: UserProfile,
        timestamps: Timestamps,
    },
}

/// A session that passed every check.
struct ActiveSession {
    credential: String,
    profile: UserProfile,
}

/// Outcome of a check that tears down on failure.
enum Check {
    Active(ActiveSession),
    /// No usable session. `redirected` says whether teardown already sent
    /// the user to the anonymous landing.
    Ended { redirected: bool },
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Owns the client's session record.
///
/// ## Lifecycle
///
/// ```text
/// login() ──→ [Active] ──→ credential() / request() / require_auth()
///                │
///                ├── lifetime elapsed ──→ teardown ──→ [NoSession] + redirect
///                ├── inactivity limit ──→ teardown ──→ [NoSession] + redirect
///                └── logout() ──────────→ teardown ──→ [NoSession] + redirect
/// ```
///
/// Teardown is idempotent: it clears whatever keys are present, and only
/// redirects and notifies the server if there was something to clear.
pub struct SessionManager<S: SessionStore, T: ApiTransport> {
    store: S,
    transport: Arc<T>,
    codec: TokenCodec,
    clock: SessionClock,
    navigator: Arc<dyn Navigator>,
    gate: Mutex<()>,
}

impl<S: SessionStore, T: ApiTransport> SessionManager<S, T> {
    pub fn config(&self) -> &SessionConfig {
        self.clock.config()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // -- Login / logout ---------------------------------------------------

    /// Logs in and persists a fresh session.
    ///
    /// The email is trimmed and shape-checked before any network call.
    /// Any existing session is replaced.
    ///
    /// # Errors
    /// - [`SessionError::MissingCredentials`] or [`SessionError::InvalidEmail`]:
    ///   rejected locally, nothing was sent
    /// - [`SessionError::LoginRejected`]: the server said no
    /// - [`SessionError::IncompleteResponse`]: success without a token
    /// - [`SessionError::Transport`]: the server couldn't be reached
    /// - [`SessionError::Store`]: the session couldn't be persisted; any
    ///   entries already written are removed again
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, SessionError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(SessionError::MissingCredentials);
        }
        if !is_valid_email(email) {
            return Err(SessionError::InvalidEmail);
        }

        let envelope = self
            .transport
            .login(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .await?;

        if !envelope.success {
            let reason = envelope
                .error
                .unwrap_or_else(|| "invalid credentials".to_string());
            tracing::debug!(status = envelope.status_code, "login rejected");
            return Err(SessionError::LoginRejected(reason));
        }
        let data = envelope
            .data
            .filter(|data| !data.token.is_empty())
            .ok_or(SessionError::IncompleteResponse)?;

        let wrapped = self.codec.wrap(&data.token)?;
        let profile = serde_json::to_string(&data.user)
            .map_err(|e| StoreError::Codec(ProtocolError::Encode(e)))?;

        let _gate = self.gate.lock().await;
        let now = self.clock.now().to_string();
        let entries = [
            (keys::WRAPPED_CREDENTIAL, wrapped.into_string()),
            (keys::USER_PROFILE, profile),
            (keys::LOGIN_TIMESTAMP, now.clone()),
            (keys::LAST_ACTIVITY_TIMESTAMP, now),
        ];
        for (key, value) in entries {
            if let Err(e) = self.store.set(key, value).await {
                tracing::warn!(%key, error = %e, "failed to persist session");
                self.clear_locked().await;
                return Err(e.into());
            }
        }

        tracing::info!(role = %data.user.role, "session started");
        Ok(data.user)
    }

    /// Creates an account. Does not log in.
    ///
    /// The email is trimmed, shape-checked, and lowercased, and the password
    /// is checked against [`password_problems`], all before any network
    /// call. Restaurant details are sent for owners only; an owner without
    /// them sends empty ones.
    ///
    /// Returns the `data` of the server's answer (`Null` if it sent none).
    ///
    /// # Errors
    /// - [`SessionError::InvalidEmail`] or [`SessionError::WeakPassword`]:
    ///   rejected locally, nothing was sent
    /// - [`SessionError::RegistrationRejected`]: the server said no
    /// - [`SessionError::Transport`]: the server couldn't be reached
    pub async fn register(
        &self,
        mut request: RegisterRequest,
    ) -> Result<Value, SessionError> {
        request.email = request.email.trim().to_lowercase();
        if !is_valid_email(&request.email) {
            return Err(SessionError::InvalidEmail);
        }
        let problems = password_problems(&request.password);
        if !problems.is_empty() {
            return Err(SessionError::WeakPassword(problems));
        }
        request.restaurant = match request.role {
            Role::Owner => Some(request.restaurant.unwrap_or_default()),
            _ => None,
        };

        let body = serde_json::to_value(&request)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        let envelope = self
            .transport
            .send(ApiRequest::new(Method::Post, REGISTER_PATH).with_body(body))
            .await?;

        if !envelope.success {
            tracing::debug!(status = envelope.status_code, "registration rejected");
            return Err(SessionError::RegistrationRejected(
                envelope
                    .error
                    .unwrap_or_else(|| "registration failed".to_string()),
            ));
        }
        tracing::info!(role = %request.role, "account registered");
        Ok(envelope.data.unwrap_or(Value::Null))
    }

    /// Ends the session. Safe to call with no session.
    pub async fn logout(&self) {
        let _gate = self.gate.lock().await;
        self.teardown_locked(TeardownReason::Logout).await;
    }

    // -- Credential and status --------------------------------------------

    /// The bearer credential, if the session is Active.
    ///
    /// An expired, inactive, incomplete, or unreadable session is torn down
    /// and yields `None`.
    pub async fn credential(&self) -> Option<String> {
        let _gate = self.gate.lock().await;
        match self.check_locked().await {
            Check::Active(session) => Some(session.credential),
            Check::Ended { .. } => None,
        }
    }

    /// Where the stored session is, without tearing anything down.
    pub async fn status(&self) -> SessionStatus {
        let _gate = self.gate.lock().await;
        match self.classify(self.load().await) {
            Ok(_) => SessionStatus::Active,
            Err(None) | Err(Some(TeardownReason::Invalid)) => {
                SessionStatus::NoSession
            }
            Err(Some(TeardownReason::Inactive)) => SessionStatus::Inactive,
            Err(Some(_)) => SessionStatus::Expired,
        }
    }

    /// Re-checks the session and tears it down if it is no longer Active.
    ///
    /// Returns the status found *before* any teardown. Called by the
    /// background watch.
    pub async fn check_expiry(&self) -> SessionStatus {
        let _gate = self.gate.lock().await;
        match self.classify(self.load().await) {
            Ok(_) => SessionStatus::Active,
            Err(None) => SessionStatus::NoSession,
            Err(Some(reason)) => {
                self.teardown_locked(reason).await;
                match reason {
                    TeardownReason::Inactive => SessionStatus::Inactive,
                    TeardownReason::Expired => SessionStatus::Expired,
                    _ => SessionStatus::NoSession,
                }
            }
        }
    }

    /// Lifetime left on the stored session; zero without one.
    pub async fn time_remaining(&self) -> Duration {
        let _gate = self.gate.lock().await;
        match self.store.get(keys::LOGIN_TIMESTAMP).await {
            Ok(Some(raw)) => raw
                .parse::<u64>()
                .map(|login_at| self.clock.remaining(login_at))
                .unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }

    // -- Activity ---------------------------------------------------------

    /// Marks the session as used now. Returns `false` (and tears down if
    /// needed) when there is no Active session.
    pub async fn record_activity(&self) -> bool {
        let _gate = self.gate.lock().await;
        match self.check_locked().await {
            Check::Active(_) => {
                self.touch_locked().await;
                true
            }
            Check::Ended { .. } => false,
        }
    }

    /// Feeds a user interaction into [`record_activity`](Self::record_activity).
    pub async fn on_interaction(&self, event: ActivityEvent) -> bool {
        tracing::trace!(?event, "interaction");
        self.record_activity().await
    }

    // -- Profile ----------------------------------------------------------

    /// The stored profile, if the session is Active.
    pub async fn user(&self) -> Option<UserProfile> {
        let _gate = self.gate.lock().await;
        match self.check_locked().await {
            Check::Active(session) => Some(session.profile),
            Check::Ended { .. } => None,
        }
    }

    /// The stored role, if the session is Active.
    pub async fn role(&self) -> Option<Role> {
        self.user().await.map(|profile| profile.role)
    }

    /// Replaces the stored profile (e.g. after the user edits it).
    ///
    /// # Errors
    /// [`SessionError::NotAuthenticated`] without an Active session;
    /// [`SessionError::Store`] if the write fails.
    pub async fn save_profile(
        &self,
        profile: &UserProfile,
    ) -> Result<(), SessionError> {
        let _gate = self.gate.lock().await;
        if let Check::Ended { .. } = self.check_locked().await {
            return Err(SessionError::NotAuthenticated);
        }
        let json = serde_json::to_string(profile)
            .map_err(|e| StoreError::Codec(ProtocolError::Encode(e)))?;
        self.store.set(keys::USER_PROFILE, json).await?;
        Ok(())
    }

    // -- Navigation guards ------------------------------------------------

    /// Guards a page that needs a session.
    ///
    /// Without one, redirects to the anonymous landing and returns `false`.
    /// With one, counts as activity and returns `true`.
    pub async fn require_auth(&self) -> bool {
        let _gate = self.gate.lock().await;
        self.active_or_redirect_locked().await.is_some()
    }

    /// Guards a page that needs one of `roles`.
    ///
    /// Without a session, behaves like [`require_auth`](Self::require_auth).
    /// With a session in some other role, redirects to that role's landing
    /// and returns `false`.
    pub async fn require_role(&self, roles: &[Role]) -> bool {
        let _gate = self.gate.lock().await;
        let Some(session) = self.active_or_redirect_locked().await else {
            return false;
        };
        let role = session.profile.role;
        if roles.contains(&role) {
            return true;
        }
        tracing::debug!(%role, "role not permitted here");
        self.navigator.redirect(landing_for(role));
        false
    }

    // -- Requests ---------------------------------------------------------

    /// Calls the API, attaching the credential when there is an Active
    /// session. For endpoints that work both with and without one.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ResponseEnvelope, SessionError> {
        let mut request = ApiRequest::new(method, path);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        if let Some(credential) = self.credential().await {
            request = request.with_bearer(credential);
        }
        Ok(self.transport.send(request).await?)
    }

    /// Calls an endpoint that requires authentication.
    ///
    /// The session is checked (and activity recorded) before anything is
    /// sent. Without an Active session this returns
    /// [`SessionError::NotAuthenticated`] and the network is never touched.
    /// A 401 from the server tears the session down.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ResponseEnvelope, SessionError> {
        let credential = {
            let _gate = self.gate.lock().await;
            match self.active_or_redirect_locked().await {
                Some(session) => session.credential,
                None => return Err(SessionError::NotAuthenticated),
            }
        };

        let mut request =
            ApiRequest::new(method, path).with_bearer(credential.clone());
        if let Some(body) = body {
            request = request.with_body(body);
        }
        let envelope = self.transport.send(request).await?;

        if envelope.status_code == status::UNAUTHORIZED {
            let _gate = self.gate.lock().await;
            // A login may have replaced the session while the call was out.
            if self.stored_credential_locked().await.as_deref()
                == Some(credential.as_str())
            {
                self.teardown_locked(TeardownReason::Rejected).await;
            } else {
                tracing::debug!("401 for a credential that is no longer stored");
            }
        }
        Ok(envelope)
    }

    // -- Internals (call with `gate` held) --------------------------------

    /// Reads the four session entries.
    async fn load(&self) -> Stored {
        let mut values: [Option<String>; 4] = Default::default();
        for (slot, key) in values.iter_mut().zip(keys::ALL) {
            match self.store.get(key).await {
                Ok(value) => *slot = value,
                Err(e) => {
                    tracing::warn!(%key, error = %e, "session storage unreadable");
                    return Stored::Partial;
                }
            }
        }
        if values.iter().all(Option::is_none) {
            return Stored::Empty;
        }

        let [wrapped, profile, login_at, last_activity_at] = values;
        let (Some(wrapped), Some(profile), Some(login_at), Some(last_activity_at)) =
            (wrapped, profile, login_at, last_activity_at)
        else {
            return Stored::Partial;
        };
        let Ok(profile) = serde_json::from_str::<UserProfile>(&profile) else {
            tracing::debug!("stored profile is unreadable");
            return Stored::Partial;
        };
        let (Ok(login_at), Ok(last_activity_at)) =
            (login_at.parse::<u64>(), last_activity_at.parse::<u64>())
        else {
            tracing::debug!("stored timestamps are unreadable");
            return Stored::Partial;
        };

        Stored::Complete {
            wrapped,
            profile,
            timestamps: Timestamps {
                login_at,
                last_activity_at,
            },
        }
    }

    /// Decides whether a stored record is usable.
    ///
    /// `Err(None)`: nothing stored. `Err(Some(reason))`: stored but must be
    /// torn down.
    fn classify(
        &self,
        stored: Stored,
    ) -> Result<ActiveSession, Option<TeardownReason>> {
        let (wrapped, profile, timestamps) = match stored {
            Stored::Empty => return Err(None),
            Stored::Partial => return Err(Some(TeardownReason::Invalid)),
            Stored::Complete {
                wrapped,
                profile,
                timestamps,
            } => (wrapped, profile, timestamps),
        };

        match self.clock.evaluate(Some(timestamps)) {
            SessionStatus::Active => {}
            SessionStatus::Expired => return Err(Some(TeardownReason::Expired)),
            SessionStatus::Inactive => {
                return Err(Some(TeardownReason::Inactive));
            }
            SessionStatus::NoSession => return Err(Some(TeardownReason::Invalid)),
        }

        let credential = self
            .codec
            .unwrap(&wrapped)
            .ok_or(Some(TeardownReason::Invalid))?;
        match jwt_expiry(&credential) {
            JwtExpiry::At(exp) if self.clock.now() / 1000 >= exp => {
                return Err(Some(TeardownReason::Expired));
            }
            JwtExpiry::Unreadable => return Err(Some(TeardownReason::Expired)),
            _ => {}
        }

        Ok(ActiveSession {
            credential,
            profile,
        })
    }

    /// Loads and classifies, tearing down anything that isn't Active.
    async fn check_locked(&self) -> Check {
        match self.classify(self.load().await) {
            Ok(session) => Check::Active(session),
            Err(None) => Check::Ended { redirected: false },
            Err(Some(reason)) => Check::Ended {
                redirected: self.teardown_locked(reason).await,
            },
        }
    }

    /// Like [`check_locked`](Self::check_locked), but also records activity
    /// on success and makes sure the user ends up on the anonymous landing
    /// on failure.
    async fn active_or_redirect_locked(&self) -> Option<ActiveSession> {
        match self.check_locked().await {
            Check::Active(session) => {
                self.touch_locked().await;
                Some(session)
            }
            Check::Ended { redirected } => {
                if !redirected {
                    self.navigator.redirect(Landing::Anonymous);
                }
                None
            }
        }
    }

    /// The unwrapped credential currently in storage, if any.
    async fn stored_credential_locked(&self) -> Option<String> {
        let wrapped = self.store.get(keys::WRAPPED_CREDENTIAL).await.ok()??;
        self.codec.unwrap(&wrapped)
    }

    async fn touch_locked(&self) {
        let now = self.clock.now().to_string();
        if let Err(e) = self.store.set(keys::LAST_ACTIVITY_TIMESTAMP, now).await
        {
            tracing::warn!(error = %e, "failed to record activity");
        }
    }

    /// Removes every session key, logging (not propagating) failures.
    async fn clear_locked(&self) {
        for key in keys::ALL {
            if let Err(e) = self.store.remove(key).await {
                tracing::warn!(%key, error = %e, "failed to clear session entry");
            }
        }
    }

    /// Clears the session, notifies the server, and redirects.
    ///
    /// Returns `true` if there was anything to tear down (and so a redirect
    /// was issued). A second call finds nothing and returns `false`.
    async fn teardown_locked(&self, reason: TeardownReason) -> bool {
        // An unreadable entry counts as present: it still has to go.
        let wrapped = self.store.get(keys::WRAPPED_CREDENTIAL).await;
        let mut had_session = !matches!(wrapped, Ok(None));
        let wrapped = wrapped.ok().flatten();
        for key in &keys::ALL[1..] {
            had_session |= !matches!(self.store.get(key).await, Ok(None));
        }

        self.clear_locked().await;
        if !had_session {
            return false;
        }

        tracing::info!(%reason, "session ended");
        if let Some(credential) =
            wrapped.as_deref().and_then(|w| self.codec.unwrap(w))
        {
            self.notify_logout(credential);
        }
        self.navigator.redirect(Landing::Anonymous);
        true
    }

    /// Tells the server about the logout without waiting for it.
    fn notify_logout(&self, credential: String) {
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            if let Err(e) = transport.logout(&credential).await {
                tracing::debug!(error = %e, "logout notification failed");
            }
        });
    }
}

const REGISTER_PATH: &str = "/auth/register";

/// `local@host.tld`, where the TLD is at least two letters.
static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern compiles")
});

const PASSWORD_SPECIALS: &str = r#"!@#$%^&*()_+-=[]{};':"\|,.<>/?"#;

fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Every registration password rule that `password` breaks, in a fixed
/// order. Empty when the password is acceptable.
pub fn password_problems(password: &str) -> Vec<String> {
    let rules: [(bool, &str); 5] = [
        (password.chars().count() >= 8, "must be at least 8 characters long"),
        (
            password.chars().any(|c| c.is_ascii_uppercase()),
            "must contain an uppercase letter",
        ),
        (
            password.chars().any(|c| c.is_ascii_lowercase()),
            "must contain a lowercase letter",
        ),
        (
            password.chars().any(|c| c.is_ascii_digit()),
            "must contain a digit",
        ),
        (
            password.chars().any(|c| PASSWORD_SPECIALS.contains(c)),
            "must contain a special character",
        ),
    ];
    rules
        .into_iter()
        .filter(|(ok, _)| !ok)
        .map(|(_, problem)| problem.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for a [`SessionManager`].
///
/// ```rust,ignore
/// let manager = SessionManagerBuilder::new()
///     .config(SessionConfig::from_env())
///     .navigator(my_navigator)
///     .build(FileStore::new(path), HttpTransport::new(http)?, codec);
/// ```
///
/// Defaults: [`SessionConfig::default`], the system clock, and a
/// [`TracingNavigator`].
pub struct SessionManagerBuilder {
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    navigator: Arc<dyn Navigator>,
}

impl SessionManagerBuilder {
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            clock: Arc::new(SystemClock),
            navigator: Arc::new(TracingNavigator),
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn navigator(mut self, navigator: impl Navigator) -> Self {
        self.navigator = Arc::new(navigator);
        self
    }

    pub fn build<S: SessionStore, T: ApiTransport>(
        self,
        store: S,
        transport: T,
        codec: TokenCodec,
    ) -> SessionManager<S, T> {
        SessionManager {
            store,
            transport: Arc::new(transport),
            codec,
            clock: SessionClock::new(self.config.validated(), self.clock),
            navigator: self.navigator,
            gate: Mutex::new(()),
        }
    }
}

impl Default for SessionManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `SessionManager`.
    //!
    //! Time is driven by a `ManualClock`, so expiry boundaries are hit
    //! exactly instead of by sleeping.

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use buho_protocol::{LoginData, ManualClock};

    use crate::{CodecParams, DeviceFingerprint, MemoryStore};

    const NOW: u64 = 1_760_000_000_000;
    const EMAIL: &str = "ana@example.com";
    const PASSWORD: &str = "Secret#123";

    // -- Helpers ----------------------------------------------------------

    /// Records every call; answers logins with a fixed token.
    #[derive(Clone, Default)]
    struct MockTransport {
        token: Arc<StdMutex<String>>,
        reject_login: bool,
        send_status: u16,
        /// `data` of a successful `send`.
        reply: Value,
        /// Written as the stored credential while the next `send` is in
        /// flight, like a login finishing in another task.
        swap_in: Arc<StdMutex<Option<(MemoryStore, String)>>>,
        logins: Arc<AtomicUsize>,
        logouts: Arc<AtomicUsize>,
        sent: Arc<StdMutex<Vec<ApiRequest>>>,
    }

    impl MockTransport {
        fn issuing(token: &str) -> Self {
            Self {
                token: Arc::new(StdMutex::new(token.to_string())),
                send_status: status::OK,
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<ApiRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl ApiTransport for MockTransport {
        async fn login(
            &self,
            request: &LoginRequest,
        ) -> Result<ResponseEnvelope<LoginData>, TransportError> {
            self.logins.fetch_add(1, Ordering::SeqCst);
            if self.reject_login {
                return Ok(ResponseEnvelope::failure(401, "Credenciales incorrectas"));
            }
            Ok(ResponseEnvelope::ok(LoginData {
                token: self.token.lock().unwrap().clone(),
                user: UserProfile {
                    email: request.email.clone(),
                    first_name: "Ana".into(),
                    role: Role::Owner,
                    ..UserProfile::default()
                },
            }))
        }

        async fn logout(&self, _credential: &str) -> Result<(), TransportError> {
            self.logouts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send(
            &self,
            request: ApiRequest,
        ) -> Result<ResponseEnvelope, TransportError> {
            self.sent.lock().unwrap().push(request);
            let swap = self.swap_in.lock().unwrap().take();
            if let Some((store, wrapped)) = swap {
                store.set(keys::WRAPPED_CREDENTIAL, wrapped).await.unwrap();
            }
            if self.send_status == status::OK {
                Ok(ResponseEnvelope::ok(self.reply.clone()))
            } else {
                Ok(ResponseEnvelope::failure(self.send_status, "nope"))
            }
        }
    }

    /// Keeps every redirect for inspection.
    #[derive(Clone, Default)]
    struct RecordingNavigator {
        redirects: Arc<StdMutex<Vec<Landing>>>,
    }

    impl RecordingNavigator {
        fn redirects(&self) -> Vec<Landing> {
            self.redirects.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn redirect(&self, to: Landing) {
            self.redirects.lock().unwrap().push(to);
        }
    }

    fn codec_for(user_agent: &str) -> TokenCodec {
        TokenCodec::with_params(
            &DeviceFingerprint {
                user_agent: user_agent.to_string(),
                locale: "es-MX".into(),
                screen_width: 1280,
                screen_height: 720,
            },
            &CodecParams {
                iterations: 1_000,
                ..CodecParams::default()
            },
        )
    }

    struct Harness {
        manager: SessionManager<MemoryStore, MockTransport>,
        store: MemoryStore,
        transport: MockTransport,
        navigator: RecordingNavigator,
        clock: ManualClock,
    }

    fn harness_with(transport: MockTransport) -> Harness {
        let store = MemoryStore::new();
        let navigator = RecordingNavigator::default();
        let clock = ManualClock::new(NOW);
        let manager = SessionManagerBuilder::new()
            .clock(clock.clone())
            .navigator(navigator.clone())
            .build(store.clone(), transport.clone(), codec_for("test-device"));
        Harness {
            manager,
            store,
            transport,
            navigator,
            clock,
        }
    }

    fn harness() -> Harness {
        harness_with(MockTransport::issuing("opaque-token"))
    }

    async fn logged_in() -> Harness {
        let h = harness();
        h.manager.login(EMAIL, PASSWORD).await.expect("login");
        h
    }

    fn jwt_expiring_at(exp_secs: u64) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":1,"exp":{exp_secs}}}"#))
        )
    }

    /// Lets spawned tasks (the logout notification) run.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    // =====================================================================
    // login()
    // =====================================================================

    #[tokio::test]
    async fn test_login_valid_credentials_creates_active_session() {
        let h = harness();

        let profile = h.manager.login(EMAIL, PASSWORD).await.expect("login");

        assert_eq!(profile.email, EMAIL);
        assert_eq!(h.manager.status().await, SessionStatus::Active);
        assert_eq!(h.store.len().await, 4);
        let stored = h.store.get(keys::WRAPPED_CREDENTIAL).await.unwrap().unwrap();
        assert_ne!(stored, "opaque-token", "credential must be stored wrapped");
        assert_eq!(
            h.store.get(keys::LOGIN_TIMESTAMP).await.unwrap().as_deref(),
            Some(NOW.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn test_login_trims_email() {
        let h = harness();

        let profile = h
            .manager
            .login("  ana@example.com ", PASSWORD)
            .await
            .expect("login");

        assert_eq!(profile.email, EMAIL);
    }

    #[tokio::test]
    async fn test_login_invalid_email_never_calls_server() {
        let h = harness();

        let result = h.manager.login("not-an-email", PASSWORD).await;

        assert!(matches!(result, Err(SessionError::InvalidEmail)));
        assert_eq!(h.transport.logins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_login_empty_password_returns_missing_credentials() {
        let h = harness();

        let result = h.manager.login(EMAIL, "").await;

        assert!(matches!(result, Err(SessionError::MissingCredentials)));
    }

    #[tokio::test]
    async fn test_login_rejected_stores_nothing() {
        let h = harness_with(MockTransport {
            reject_login: true,
            ..MockTransport::issuing("unused")
        });

        let result = h.manager.login(EMAIL, PASSWORD).await;

        assert!(matches!(
            result,
            Err(SessionError::LoginRejected(reason)) if reason == "Credenciales incorrectas"
        ));
        assert!(h.store.is_empty().await);
        assert_eq!(h.manager.status().await, SessionStatus::NoSession);
    }

    #[tokio::test]
    async fn test_login_empty_token_returns_incomplete_response() {
        let h = harness_with(MockTransport::issuing(""));

        let result = h.manager.login(EMAIL, PASSWORD).await;

        assert!(matches!(result, Err(SessionError::IncompleteResponse)));
        assert!(h.store.is_empty().await);
    }

    // =====================================================================
    // credential()
    // =====================================================================

    #[tokio::test]
    async fn test_credential_active_session_returns_token() {
        let h = logged_in().await;

        assert_eq!(h.manager.credential().await.as_deref(), Some("opaque-token"));
        assert!(h.navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_credential_after_lifetime_tears_down_and_redirects() {
        let h = logged_in().await;
        h.clock.advance(h.manager.config().session_lifetime);

        assert_eq!(h.manager.credential().await, None);

        settle().await;
        assert!(h.store.is_empty().await);
        assert_eq!(h.navigator.redirects(), vec![Landing::Anonymous]);
        assert_eq!(h.transport.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_credential_without_session_returns_none_without_redirect() {
        let h = harness();

        assert_eq!(h.manager.credential().await, None);
        assert!(h.navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_credential_missing_profile_tears_down() {
        let h = logged_in().await;
        h.store.remove(keys::USER_PROFILE).await.unwrap();

        assert_eq!(h.manager.credential().await, None);

        assert!(h.store.is_empty().await);
        assert_eq!(h.navigator.redirects(), vec![Landing::Anonymous]);
    }

    #[tokio::test]
    async fn test_credential_wrapped_on_other_device_tears_down() {
        let h = logged_in().await;
        let foreign = codec_for("another-device").wrap("stolen").unwrap();
        h.store
            .set(keys::WRAPPED_CREDENTIAL, foreign.into_string())
            .await
            .unwrap();

        assert_eq!(h.manager.credential().await, None);
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_credential_legacy_unwrapped_jwt_is_accepted() {
        let h = logged_in().await;
        let legacy = jwt_expiring_at(NOW / 1000 + 3600);
        h.store
            .set(keys::WRAPPED_CREDENTIAL, legacy.clone())
            .await
            .unwrap();

        assert_eq!(h.manager.credential().await, Some(legacy));
    }

    #[tokio::test]
    async fn test_credential_jwt_past_exp_is_expired() {
        let h = harness_with(MockTransport::issuing(&jwt_expiring_at(
            NOW / 1000 + 60,
        )));
        h.manager.login(EMAIL, PASSWORD).await.unwrap();
        h.clock.advance(Duration::from_secs(61));

        assert_eq!(h.manager.credential().await, None);
        assert_eq!(h.navigator.redirects(), vec![Landing::Anonymous]);
    }

    #[tokio::test]
    async fn test_credential_jwt_with_garbled_payload_is_expired() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let h = harness_with(MockTransport::issuing(&format!("{header}.%%%.sig")));
        h.manager.login(EMAIL, PASSWORD).await.unwrap();

        assert_eq!(h.manager.credential().await, None);
        assert!(h.store.is_empty().await);
        assert_eq!(h.navigator.redirects(), vec![Landing::Anonymous]);
    }

    #[tokio::test]
    async fn test_credential_jwt_without_exp_is_accepted() {
        let token = format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(r#"{"sub":1}"#)
        );
        let h = harness_with(MockTransport::issuing(&token));
        h.manager.login(EMAIL, PASSWORD).await.unwrap();

        assert_eq!(h.manager.credential().await, Some(token));
    }

    // =====================================================================
    // Inactivity / record_activity()
    // =====================================================================

    #[tokio::test]
    async fn test_check_expiry_after_inactivity_limit_returns_inactive() {
        let h = logged_in().await;
        h.clock.advance(h.manager.config().inactivity_limit);

        assert_eq!(h.manager.check_expiry().await, SessionStatus::Inactive);
        assert_eq!(h.manager.status().await, SessionStatus::NoSession);
        assert_eq!(h.navigator.redirects(), vec![Landing::Anonymous]);
    }

    #[tokio::test]
    async fn test_check_expiry_just_before_limit_stays_active() {
        let h = logged_in().await;
        h.clock
            .advance(h.manager.config().inactivity_limit - Duration::from_millis(1));

        assert_eq!(h.manager.check_expiry().await, SessionStatus::Active);
        assert!(h.navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_record_activity_postpones_inactivity() {
        let h = logged_in().await;
        let twenty_minutes = Duration::from_secs(20 * 60);

        h.clock.advance(twenty_minutes);
        assert!(h.manager.on_interaction(ActivityEvent::KeyPress).await);
        h.clock.advance(twenty_minutes);

        assert_eq!(h.manager.check_expiry().await, SessionStatus::Active);
    }

    #[tokio::test]
    async fn test_record_activity_does_not_extend_lifetime() {
        let h = logged_in().await;
        let step = Duration::from_secs(25 * 60);

        for _ in 0..4 {
            h.clock.advance(step);
            assert!(h.manager.record_activity().await);
        }
        // 100 minutes in, still active; 125 minutes is past the 2 h lifetime.
        h.clock.advance(step);

        assert_eq!(h.manager.check_expiry().await, SessionStatus::Expired);
    }

    #[tokio::test]
    async fn test_on_interaction_without_session_returns_false() {
        let h = harness();

        assert!(!h.manager.on_interaction(ActivityEvent::Scroll).await);
        assert!(h.store.is_empty().await);
        assert!(h.navigator.redirects().is_empty());
    }

    // =====================================================================
    // logout()
    // =====================================================================

    #[tokio::test]
    async fn test_logout_twice_is_idempotent() {
        let h = logged_in().await;

        h.manager.logout().await;
        assert_eq!(h.manager.status().await, SessionStatus::NoSession);
        h.manager.logout().await;
        assert_eq!(h.manager.status().await, SessionStatus::NoSession);

        settle().await;
        assert_eq!(h.navigator.redirects(), vec![Landing::Anonymous]);
        assert_eq!(h.transport.logouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_logout_without_session_is_noop() {
        let h = harness();

        h.manager.logout().await;

        assert!(h.navigator.redirects().is_empty());
    }

    // =====================================================================
    // require_auth() / require_role()
    // =====================================================================

    #[tokio::test]
    async fn test_require_auth_without_session_redirects_anonymous() {
        let h = harness();

        assert!(!h.manager.require_auth().await);
        assert_eq!(h.navigator.redirects(), vec![Landing::Anonymous]);
    }

    #[tokio::test]
    async fn test_require_auth_expired_redirects_once() {
        let h = logged_in().await;
        h.clock.advance(h.manager.config().session_lifetime);

        assert!(!h.manager.require_auth().await);
        assert_eq!(h.navigator.redirects(), vec![Landing::Anonymous]);
    }

    #[tokio::test]
    async fn test_require_auth_records_activity() {
        let h = logged_in().await;
        h.clock.advance(Duration::from_secs(60));

        assert!(h.manager.require_auth().await);

        assert_eq!(
            h.store
                .get(keys::LAST_ACTIVITY_TIMESTAMP)
                .await
                .unwrap()
                .as_deref(),
            Some((NOW + 60_000).to_string().as_str())
        );
    }

    #[tokio::test]
    async fn test_require_role_allowed_role_passes() {
        let h = logged_in().await;

        assert!(h.manager.require_role(&[Role::Owner, Role::Admin]).await);
        assert!(h.navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn test_require_role_other_role_redirects_to_own_dashboard() {
        let h = logged_in().await;

        assert!(!h.manager.require_role(&[Role::Admin]).await);
        assert_eq!(h.navigator.redirects(), vec![Landing::OwnerDashboard]);
        // The session itself survives.
        assert_eq!(h.manager.status().await, SessionStatus::Active);
    }

    // =====================================================================
    // send() / request()
    // =====================================================================

    #[tokio::test]
    async fn test_request_attaches_bearer() {
        let h = logged_in().await;

        let envelope = h
            .manager
            .request(Method::Get, "/favorites", None)
            .await
            .expect("send");

        assert!(envelope.success);
        let sent = h.transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bearer.as_deref(), Some("opaque-token"));
    }

    #[tokio::test]
    async fn test_request_expired_short_circuits_before_network() {
        let h = logged_in().await;
        h.clock
            .advance(h.manager.config().session_lifetime + Duration::from_millis(1));

        let result = h
            .manager
            .request(Method::Post, "/reviews", Some(Value::Null))
            .await;

        assert!(matches!(result, Err(SessionError::NotAuthenticated)));
        assert!(h.transport.sent().is_empty());
        assert_eq!(h.navigator.redirects(), vec![Landing::Anonymous]);
    }

    #[tokio::test]
    async fn test_request_server_401_tears_down() {
        let h = harness_with(MockTransport {
            send_status: status::UNAUTHORIZED,
            ..MockTransport::issuing("opaque-token")
        });
        h.manager.login(EMAIL, PASSWORD).await.unwrap();

        let envelope = h
            .manager
            .request(Method::Get, "/users/profile", None)
            .await
            .expect("a 401 is still a response");

        assert_eq!(envelope.status_code, status::UNAUTHORIZED);
        assert_eq!(h.manager.status().await, SessionStatus::NoSession);
    }

    #[tokio::test]
    async fn test_request_401_for_replaced_credential_keeps_new_session() {
        let h = harness_with(MockTransport {
            send_status: status::UNAUTHORIZED,
            ..MockTransport::issuing("old-token")
        });
        h.manager.login(EMAIL, PASSWORD).await.unwrap();
        let fresh = codec_for("test-device").wrap("fresh-token").unwrap();
        *h.transport.swap_in.lock().unwrap() =
            Some((h.store.clone(), fresh.into_string()));

        let envelope = h
            .manager
            .request(Method::Get, "/favorites", None)
            .await
            .expect("a 401 is still a response");

        settle().await;
        assert_eq!(envelope.status_code, status::UNAUTHORIZED);
        assert_eq!(h.transport.sent()[0].bearer.as_deref(), Some("old-token"));
        assert_eq!(h.manager.credential().await.as_deref(), Some("fresh-token"));
        assert!(h.navigator.redirects().is_empty());
        assert_eq!(h.transport.logouts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_without_session_omits_bearer() {
        let h = harness();

        h.manager
            .send(Method::Get, "/restaurants", None)
            .await
            .expect("send");

        assert_eq!(h.transport.sent()[0].bearer, None);
    }

    // =====================================================================
    // Profile and time remaining
    // =====================================================================

    #[tokio::test]
    async fn test_save_profile_replaces_stored_profile() {
        let h = logged_in().await;
        let mut profile = h.manager.user().await.unwrap();
        profile.photo = Some("/uploads/ana.png".into());

        h.manager.save_profile(&profile).await.unwrap();

        assert_eq!(h.manager.user().await, Some(profile));
    }

    #[tokio::test]
    async fn test_save_profile_without_session_returns_not_authenticated() {
        let h = harness();

        let result = h.manager.save_profile(&UserProfile::default()).await;

        assert!(matches!(result, Err(SessionError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_time_remaining_counts_down() {
        let h = logged_in().await;
        // Under the 30 minute inactivity limit, so the session is still live.
        h.clock.advance(Duration::from_secs(29 * 60));

        assert_eq!(h.manager.time_remaining().await, Duration::from_secs(91 * 60));
        assert_eq!(h.manager.role().await, Some(Role::Owner));
    }

    // =====================================================================
    // register()
    // =====================================================================

    fn registration(role: Role) -> RegisterRequest {
        RegisterRequest {
            first_name: "Ana".into(),
            last_name: "Ruiz".into(),
            email: "  Ana.Ruiz@Example.COM ".into(),
            password: PASSWORD.into(),
            role,
            restaurant: Some(RestaurantDetails {
                name: "La Lechuza".into(),
                address: "Calle 5 #12".into(),
            }),
        }
    }

    #[tokio::test]
    async fn test_register_owner_sends_restaurant_and_lowercased_email() {
        let h = harness();

        h.manager.register(registration(Role::Owner)).await.expect("register");

        let sent = h.transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::Post);
        assert_eq!(sent[0].path, "/auth/register");
        assert_eq!(sent[0].bearer, None);
        let body = sent[0].body.clone().unwrap();
        assert_eq!(body["email"], "ana.ruiz@example.com");
        assert_eq!(body["firstName"], "Ana");
        assert_eq!(body["role"], "owner");
        assert_eq!(body["password"], PASSWORD);
        assert_eq!(body["restaurant"]["name"], "La Lechuza");
        assert_eq!(body["restaurant"]["address"], "Calle 5 #12");
    }

    #[tokio::test]
    async fn test_register_regular_user_omits_restaurant() {
        let h = harness();

        h.manager.register(registration(Role::User)).await.expect("register");

        let body = h.transport.sent()[0].body.clone().unwrap();
        assert!(body.get("restaurant").is_none());
    }

    #[tokio::test]
    async fn test_register_owner_without_details_sends_empty_restaurant() {
        let h = harness();
        let request = RegisterRequest {
            restaurant: None,
            ..registration(Role::Owner)
        };

        h.manager.register(request).await.expect("register");

        let body = h.transport.sent()[0].body.clone().unwrap();
        assert_eq!(body["restaurant"]["name"], "");
    }

    #[tokio::test]
    async fn test_register_success_returns_response_data() {
        let h = harness_with(MockTransport {
            reply: serde_json::json!({ "id": 9 }),
            ..MockTransport::issuing("unused")
        });

        let data = h.manager.register(registration(Role::User)).await.unwrap();

        assert_eq!(data["id"], 9);
        // Registering does not start a session.
        assert_eq!(h.manager.status().await, SessionStatus::NoSession);
    }

    #[tokio::test]
    async fn test_register_invalid_email_never_calls_server() {
        let h = harness();
        let request = RegisterRequest {
            email: "ana@example".into(),
            ..registration(Role::User)
        };

        let result = h.manager.register(request).await;

        assert!(matches!(result, Err(SessionError::InvalidEmail)));
        assert!(h.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_register_weak_password_lists_every_problem() {
        let h = harness();
        let request = RegisterRequest {
            password: "abc".into(),
            ..registration(Role::User)
        };

        let result = h.manager.register(request).await;

        let Err(SessionError::WeakPassword(problems)) = result else {
            panic!("expected a weak password error, got {result:?}");
        };
        assert_eq!(
            problems,
            vec![
                "must be at least 8 characters long",
                "must contain an uppercase letter",
                "must contain a digit",
                "must contain a special character",
            ]
        );
        assert!(h.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_register_rejected_returns_server_message() {
        let h = harness_with(MockTransport {
            send_status: status::BAD_REQUEST,
            ..MockTransport::issuing("unused")
        });

        let result = h.manager.register(registration(Role::User)).await;

        assert!(matches!(
            result,
            Err(SessionError::RegistrationRejected(reason)) if reason == "nope"
        ));
    }

    #[test]
    fn test_password_problems_accepts_strong_passwords() {
        assert!(password_problems(PASSWORD).is_empty());
        assert!(password_problems("Abcdef1\\").is_empty());
        assert!(password_problems("Zz9'zzzzz").is_empty());
    }

    #[test]
    fn test_password_problems_rejects_unlisted_symbol_as_special() {
        assert_eq!(
            password_problems("Abcdefg1~"),
            vec!["must contain a special character"]
        );
    }

    // =====================================================================
    // is_valid_email()
    // =====================================================================

    #[test]
    fn test_is_valid_email_shapes() {
        assert!(is_valid_email("ana.ruiz@mail.example.com"));
        assert!(is_valid_email("a_b-c@x.io"));
        assert!(!is_valid_email("ana@example"));
        assert!(!is_valid_email("ana@example.c"));
        assert!(!is_valid_email("ana@example.c0m"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ana+tag@example.com"));
        assert!(!is_valid_email("ana example@example.com"));
    }
}
