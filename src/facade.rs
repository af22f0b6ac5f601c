//! Per-view auth lifecycle around the shared session store.
//!
//! SYSTEM CONTEXT
//! ==============
//! Screens hold an [`AuthFacade`] (cheap to clone) and call
//! [`AuthFacade::mount`] when they appear. The returned [`MountedAuth`]
//! runs one session check and listens for provider notifications until it is
//! dropped or [`MountedAuth::unmount`] is called.
//!
//! Every mutation driven by the mount (the initial check and notification
//! handling) is gated on its [`Liveness`], so nothing changes the store on
//! behalf of a view that is already gone.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::guard::GuardInput;
use crate::provider::{AuthChange, AuthEventKind, AuthSubscription};
use crate::store::{Liveness, SessionStore};
use crate::types::{AuthError, Session, User};

#[derive(Clone)]
pub struct AuthFacade {
    store: Arc<SessionStore>,
}

impl AuthFacade {
    #[must_use]
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.store.user()
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.store.token()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    /// Current state as the route guard consumes it.
    #[must_use]
    pub fn guard_input(&self) -> GuardInput {
        GuardInput::from_snapshot(self.store.snapshot().as_ref())
    }

    /// # Errors
    ///
    /// See [`SessionStore::login`].
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.store.login(email, password).await
    }

    /// # Errors
    ///
    /// See [`SessionStore::register`].
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        department: Option<&str>,
    ) -> Result<Session, AuthError> {
        self.store.register(email, password, name, department).await
    }

    pub async fn logout(&self) {
        self.store.logout().await;
    }

    pub async fn check_auth(&self) -> Session {
        self.store.check_auth().await
    }

    /// Attach a view: start one session check and subscribe to provider
    /// notifications. Must be called inside a Tokio runtime.
    #[must_use]
    pub fn mount(&self) -> MountedAuth {
        let liveness = Liveness::new();
        let subscription = self.store.provider().subscribe();

        let initial_check = {
            let store = Arc::clone(&self.store);
            let liveness = liveness.clone();
            tokio::spawn(async move { store.check_auth_for(&liveness).await })
        };
        let listener = tokio::spawn(listen(Arc::clone(&self.store), subscription, liveness.clone()));

        debug!("auth consumer mounted");
        MountedAuth { facade: self.clone(), liveness, initial_check: Some(initial_check), listener }
    }
}

/// Apply one provider notification to the store.
async fn handle_change(store: &SessionStore, change: AuthChange, liveness: &Liveness) {
    if !liveness.is_live() {
        return;
    }
    match change.event {
        AuthEventKind::SignedOut => {
            debug!("provider reported sign-out");
            // Local half of logout only; `logout()` would publish SignedOut again.
            store.clear();
        }
        _ if change.session.is_some() => {
            debug!(event = ?change.event, "provider reported live session, resyncing");
            store.check_auth_for(liveness).await;
        }
        _ => {}
    }
}

async fn listen(store: Arc<SessionStore>, mut subscription: AuthSubscription, liveness: Liveness) {
    while let Some(change) = subscription.recv().await {
        if !liveness.is_live() {
            break;
        }
        handle_change(&store, change, &liveness).await;
    }
    subscription.unsubscribe();
}

/// A mounted view's auth handle. Dropping it unsubscribes.
pub struct MountedAuth {
    facade: AuthFacade,
    liveness: Liveness,
    initial_check: Option<JoinHandle<Session>>,
    listener: JoinHandle<()>,
}

impl MountedAuth {
    #[must_use]
    pub fn facade(&self) -> &AuthFacade {
        &self.facade
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.liveness.is_live()
    }

    /// Receiver that fires on every session replacement, for guard re-evaluation.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<Option<Session>> {
        self.facade.store.subscribe()
    }

    /// Wait for the mount-time session check and return the resulting state.
    /// Later calls return the current state immediately.
    pub async fn ready(&mut self) -> Session {
        if let Some(handle) = self.initial_check.take() {
            if let Err(e) = handle.await {
                debug!(error = %e, "initial session check task ended abnormally");
            }
        }
        self.facade.store.session()
    }

    /// Detach the view. An in-flight session check keeps running but its
    /// result is discarded.
    pub fn unmount(self) {
        drop(self);
    }
}

impl Drop for MountedAuth {
    fn drop(&mut self) {
        self.liveness.end();
        self.listener.abort();
        debug!("auth consumer unmounted");
    }
}

#[cfg(test)]
#[path = "facade_test.rs"]
mod tests;
