//! Shared fixtures and collaborator mocks for unit tests.

use std::cell::RefCell;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use crate::guard::Navigator;
use crate::provider::{
    AuthChange, AuthEvents, AuthSubscription, IdentityProvider, ProviderSession, ProviderUser, SignUpMetadata,
};
use crate::storage::{MemoryStorage, SessionStorage};
use crate::store::{SessionStore, StoreOptions};
use crate::types::{AuthError, Session, User, UserRole};

// =============================================================================
// FIXTURES
// =============================================================================

#[must_use]
pub fn provider_user(id: &str, email: &str) -> ProviderUser {
    ProviderUser { id: id.into(), email: Some(email.into()), ..ProviderUser::default() }
}

#[must_use]
pub fn provider_session(id: &str, email: &str, token: &str) -> ProviderSession {
    ProviderSession { access_token: token.into(), refresh_token: None, expires_in: None, user: provider_user(id, email) }
}

#[must_use]
pub fn user_with_role(role: UserRole) -> User {
    User {
        id: "u1".into(),
        email: "alice@example.com".into(),
        name: "Alice".into(),
        role,
        department: None,
        created_at: None,
        updated_at: None,
    }
}

#[must_use]
pub fn signed_in_session(role: UserRole) -> Session {
    Session::authenticated(user_with_role(role), "T-persisted".into())
}

// =============================================================================
// MOCK PROVIDER
// =============================================================================

/// Scriptable identity provider. Each operation returns whatever was last
/// configured for it and records that it was called.
pub struct MockProvider {
    sign_in: Mutex<Result<ProviderSession, AuthError>>,
    sign_up: Mutex<Result<ProviderSession, AuthError>>,
    sign_out: Mutex<Result<(), AuthError>>,
    session: Mutex<Result<Option<ProviderSession>, AuthError>>,
    session_gate: Mutex<Option<Arc<Notify>>>,
    delay: Mutex<Option<Duration>>,
    restored: Mutex<Option<String>>,
    metadata: Mutex<Option<SignUpMetadata>>,
    calls: Mutex<Vec<&'static str>>,
    pub events: AuthEvents,
}

impl MockProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sign_in: Mutex::new(Err(AuthError::Rejected("sign-in not scripted".into()))),
            sign_up: Mutex::new(Err(AuthError::Rejected("sign-up not scripted".into()))),
            sign_out: Mutex::new(Ok(())),
            session: Mutex::new(Ok(None)),
            session_gate: Mutex::new(None),
            delay: Mutex::new(None),
            restored: Mutex::new(None),
            metadata: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
            events: AuthEvents::new(),
        }
    }

    pub fn set_sign_in(&self, result: Result<ProviderSession, AuthError>) {
        *self.sign_in.lock().unwrap() = result;
    }

    pub fn set_sign_up(&self, result: Result<ProviderSession, AuthError>) {
        *self.sign_up.lock().unwrap() = result;
    }

    pub fn set_sign_out(&self, result: Result<(), AuthError>) {
        *self.sign_out.lock().unwrap() = result;
    }

    pub fn set_session(&self, result: Result<Option<ProviderSession>, AuthError>) {
        *self.session.lock().unwrap() = result;
    }

    /// Make `get_session` wait until the returned `Notify` fires.
    pub fn gate_session(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.session_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Delay every provider call by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    #[must_use]
    pub fn restored_token(&self) -> Option<String> {
        self.restored.lock().unwrap().clone()
    }

    #[must_use]
    pub fn last_metadata(&self) -> Option<SignUpMetadata> {
        self.metadata.lock().unwrap().clone()
    }

    #[must_use]
    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    pub fn publish(&self, change: AuthChange) {
        self.events.publish(change);
    }

    fn record(&self, op: &'static str) {
        self.calls.lock().unwrap().push(op);
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MockProvider {
    async fn sign_in(&self, _email: &str, _password: &str) -> Result<ProviderSession, AuthError> {
        self.record("sign_in");
        self.pause().await;
        self.sign_in.lock().unwrap().clone()
    }

    async fn sign_up(
        &self,
        _email: &str,
        _password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<ProviderSession, AuthError> {
        self.record("sign_up");
        *self.metadata.lock().unwrap() = Some(metadata.clone());
        self.pause().await;
        self.sign_up.lock().unwrap().clone()
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.record("sign_out");
        self.pause().await;
        self.sign_out.lock().unwrap().clone()
    }

    async fn get_session(&self) -> Result<Option<ProviderSession>, AuthError> {
        self.record("get_session");
        let gate = self.session_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.pause().await;
        self.session.lock().unwrap().clone()
    }

    fn restore_session(&self, access_token: &str) {
        *self.restored.lock().unwrap() = Some(access_token.to_owned());
    }

    fn subscribe(&self) -> AuthSubscription {
        self.events.subscribe()
    }
}

// =============================================================================
// STORES
// =============================================================================

pub const TEST_KEY: &str = "auth-storage";

/// Store over a fresh mock provider and empty memory storage.
#[must_use]
pub fn test_store() -> (Arc<SessionStore>, Arc<MockProvider>, Arc<MemoryStorage>) {
    let provider = Arc::new(MockProvider::new());
    let storage = Arc::new(MemoryStorage::new());
    let store = store_over(&provider, &storage);
    (store, provider, storage)
}

#[must_use]
pub fn store_over(provider: &Arc<MockProvider>, storage: &Arc<MemoryStorage>) -> Arc<SessionStore> {
    let options = StoreOptions { storage_key: TEST_KEY.into(), operation_timeout: Duration::from_secs(5) };
    Arc::new(SessionStore::new(
        Arc::clone(provider) as Arc<dyn IdentityProvider>,
        Arc::clone(storage) as Arc<dyn SessionStorage>,
        options,
    ))
}

/// Storage whose every operation fails.
pub struct FailingStorage;

impl SessionStorage for FailingStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, AuthError> {
        Err(AuthError::Storage("disk on fire".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), AuthError> {
        Err(AuthError::Storage("disk on fire".into()))
    }

    fn remove(&self, _key: &str) -> Result<(), AuthError> {
        Err(AuthError::Storage("disk on fire".into()))
    }
}

// =============================================================================
// NAVIGATOR
// =============================================================================

/// Navigator that records redirects instead of performing them.
pub struct RecordingNavigator {
    pub location: RefCell<String>,
    pub redirects: RefCell<Vec<(String, Option<String>)>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn at(location: &str) -> Self {
        Self { location: RefCell::new(location.to_owned()), redirects: RefCell::new(Vec::new()) }
    }
}

impl Navigator for RecordingNavigator {
    fn current_location(&self) -> String {
        self.location.borrow().clone()
    }

    fn redirect(&self, path: &str, origin: Option<&str>) {
        self.redirects
            .borrow_mut()
            .push((path.to_owned(), origin.map(str::to_owned)));
    }
}
