//! Authentication and session core for the helpdesk client.
//!
//! ARCHITECTURE
//! ============
//! Route guard → auth facade → session store → identity provider.
//! Notifications flow back the other way: the provider publishes auth events,
//! mounted facades apply them to the store, and guards re-evaluate from the
//! store's change feed.
//!
//! The store is an explicitly owned `Arc<SessionStore>` handed to each
//! facade; there is no process-global session.

pub mod config;
pub mod facade;
pub mod guard;
pub mod provider;
pub mod routes;
pub mod storage;
pub mod store;
pub mod types;

#[cfg(test)]
pub mod test_helpers;

pub use config::AuthConfig;
pub use facade::{AuthFacade, MountedAuth};
pub use guard::{GuardDecision, GuardInput, Navigator, Redirect, RouteGate};
pub use provider::{AuthChange, AuthEventKind, AuthEvents, AuthSubscription, IdentityProvider};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
pub use store::{SessionStore, StoreOptions};
pub use types::{AuthError, Session, User, UserRole};
