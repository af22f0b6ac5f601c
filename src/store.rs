//! Session store: the single owner of the authentication triple.
//!
//! ARCHITECTURE
//! ============
//! The current session lives in a `tokio::sync::watch` channel. Every
//! transition is one `send_replace` of a whole [`Session`], so readers never
//! observe a torn triple, and route guards holding a receiver re-evaluate on
//! each change. `None` in the channel means "undetermined": nothing was
//! rehydrated and no reconciliation has finished yet.
//!
//! CONCURRENCY
//! ===========
//! Operations are not serialized against each other. Two racing calls both
//! apply their result and whichever finishes last wins. Callers re-read the
//! store after awaiting instead of trusting a snapshot taken before the call.
//!
//! ERROR HANDLING
//! ==============
//! `login` and `register` surface provider errors and leave the session
//! untouched. `logout` and `check_auth` never fail: a failed remote sign-out
//! still clears local state, and a failed or timed-out check fails closed.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{AuthConfig, DEFAULT_AUTH_REQUEST_TIMEOUT_SECS, DEFAULT_SESSION_KEY};
use crate::provider::{IdentityProvider, ProviderSession, SignUpMetadata};
use crate::storage::{SessionStorage, load_session, save_session};
use crate::types::{AuthError, Session, User};

// =============================================================================
// OPTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Storage key holding the persisted snapshot.
    pub storage_key: String,
    /// Upper bound on each provider call.
    pub operation_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_SESSION_KEY.to_owned(),
            operation_timeout: Duration::from_secs(DEFAULT_AUTH_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl From<&AuthConfig> for StoreOptions {
    fn from(config: &AuthConfig) -> Self {
        Self { storage_key: config.session_key.clone(), operation_timeout: config.timeouts.operation() }
    }
}

// =============================================================================
// LIVENESS
// =============================================================================

/// Shared flag marking whether the consumer that started an operation still
/// exists. Results arriving after [`Liveness::end`] are dropped.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn end(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// STORE
// =============================================================================

pub struct SessionStore {
    provider: Arc<dyn IdentityProvider>,
    storage: Arc<dyn SessionStorage>,
    state: watch::Sender<Option<Session>>,
    options: StoreOptions,
}

impl SessionStore {
    /// Build a store, rehydrating from the persisted snapshot when one exists.
    ///
    /// A rehydrated token is handed to the provider so the first
    /// [`check_auth`](Self::check_auth) can validate it.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, storage: Arc<dyn SessionStorage>, options: StoreOptions) -> Self {
        let restored = load_session(storage.as_ref(), &options.storage_key);
        if let Some(session) = &restored {
            if let Some(token) = session.token() {
                provider.restore_session(token);
            }
            debug!(authenticated = session.is_authenticated(), "session rehydrated from storage");
        }
        let (state, _) = watch::channel(restored);
        Self { provider, storage, state, options }
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    /// Current state, `None` while undetermined.
    #[must_use]
    pub fn snapshot(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    /// Current session; undetermined reads as signed out.
    #[must_use]
    pub fn session(&self) -> Session {
        self.snapshot().unwrap_or_default()
    }

    #[must_use]
    pub fn is_determined(&self) -> bool {
        self.state.borrow().is_some()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.state.borrow().as_ref().and_then(|s| s.user().cloned())
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.state.borrow().as_ref().and_then(|s| s.token().map(str::to_owned))
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().as_ref().is_some_and(Session::is_authenticated)
    }

    /// Receiver that observes every session replacement.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns the provider's error (credential rejection, outage, timeout).
    /// The current session is left unchanged.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let email = email.trim();
        let result = self.call(self.provider.sign_in(email, password)).await;
        let session = result.and_then(|ps| {
            let user = User::from_provider(&ps.user);
            authenticated(user, ps)
        });
        match session {
            Ok(session) => {
                self.apply(session.clone());
                info!(user_id = session.user().map(|u| u.id.as_str()), "login succeeded");
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "login failed");
                Err(e)
            }
        }
    }

    /// Create an account and sign in.
    ///
    /// The resulting user always has role `user`; `name` and `department`
    /// come from the arguments, not from the provider's echo.
    ///
    /// # Errors
    ///
    /// Returns the provider's error; the current session is left unchanged.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        department: Option<&str>,
    ) -> Result<Session, AuthError> {
        let email = email.trim();
        let metadata = SignUpMetadata::new(name, department);
        let result = self
            .call(self.provider.sign_up(email, password, &metadata))
            .await;
        let session = result.and_then(|ps| {
            let user = User::from_registration(&ps.user, name, department);
            authenticated(user, ps)
        });
        match session {
            Ok(session) => {
                self.apply(session.clone());
                info!(user_id = session.user().map(|u| u.id.as_str()), "registration succeeded");
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "registration failed");
                Err(e)
            }
        }
    }

    /// Sign out. The remote request is best-effort; local state is always
    /// cleared.
    pub async fn logout(&self) {
        if let Err(e) = self.call(self.provider.sign_out()).await {
            warn!(error = %e, "provider sign-out failed, clearing local session anyway");
        }
        self.clear();
        info!("logged out");
    }

    /// Local half of logout: drop the session and its persisted snapshot
    /// without contacting the provider.
    pub fn clear(&self) {
        self.apply(Session::signed_out());
    }

    /// Reconcile local state with the provider. Never fails: anything other
    /// than a confirmed live session leaves the store signed out.
    pub async fn check_auth(&self) -> Session {
        self.reconcile(None).await
    }

    /// [`check_auth`](Self::check_auth) on behalf of a consumer; the result
    /// is discarded if `liveness` has ended by the time it arrives.
    pub async fn check_auth_for(&self, liveness: &Liveness) -> Session {
        self.reconcile(Some(liveness)).await
    }

    async fn reconcile(&self, liveness: Option<&Liveness>) -> Session {
        let next = match self.call(self.provider.get_session()).await {
            Ok(Some(ps)) => {
                let user = User::from_provider(&ps.user);
                authenticated(user, ps).unwrap_or_else(|e| {
                    warn!(error = %e, "provider session unusable, treating as signed out");
                    Session::signed_out()
                })
            }
            Ok(None) => {
                debug!("no live provider session");
                Session::signed_out()
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "session check failed, treating as signed out");
                Session::signed_out()
            }
        };

        if liveness.is_some_and(|l| !l.is_live()) {
            debug!("discarding session check result for unmounted consumer");
            return self.session();
        }
        self.apply(next.clone());
        next
    }

    async fn call<T>(&self, fut: impl Future<Output = Result<T, AuthError>>) -> Result<T, AuthError> {
        tokio::time::timeout(self.options.operation_timeout, fut)
            .await
            .map_err(|_| AuthError::Timeout)?
    }

    fn apply(&self, session: Session) {
        save_session(self.storage.as_ref(), &self.options.storage_key, &session);
        self.state.send_replace(Some(session));
    }
}

fn authenticated(user: User, ps: ProviderSession) -> Result<Session, AuthError> {
    if ps.access_token.trim().is_empty() {
        return Err(AuthError::Parse("provider issued an empty access token".to_owned()));
    }
    if user.id.is_empty() {
        return Err(AuthError::Parse("provider user has no id".to_owned()));
    }
    Ok(Session::authenticated(user, ps.access_token))
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
