//! Route guard: authorize-or-redirect decisions for protected views.
//!
//! SYSTEM CONTEXT
//! ==============
//! [`evaluate`] is a pure function of the auth state, the role a route
//! requires, and the requested location. [`RouteGate`] wraps it for a single
//! route and only calls the [`Navigator`] when the decision actually changes,
//! so re-evaluating on every state change never issues duplicate redirects.
//!
//! A failed `admin` check sends the user to login rather than home. That
//! asymmetry is kept as-is and is pending product review.

use tracing::debug;

use crate::types::{Session, User, UserRole};

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

/// The slice of auth state the guard looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardInput {
    /// `None` while the store has not determined the session yet.
    pub is_authenticated: Option<bool>,
    pub user: Option<User>,
}

impl GuardInput {
    /// Build guard input from a store snapshot (`None` = undetermined).
    #[must_use]
    pub fn from_snapshot(snapshot: Option<&Session>) -> Self {
        match snapshot {
            Some(session) => Self { is_authenticated: Some(session.is_authenticated()), user: session.user().cloned() },
            None => Self { is_authenticated: None, user: None },
        }
    }
}

/// Where to send the user instead of rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub to: String,
    /// Originally requested location, for returning after sign-in.
    pub from: Option<String>,
}

/// Outcome of one guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Auth state not settled yet: show a loading placeholder.
    Loading,
    /// Show the protected content.
    Render,
    Redirect(Redirect),
}

impl GuardDecision {
    #[must_use]
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            Self::Redirect(r) => Some(&r.to),
            _ => None,
        }
    }
}

/// Decide what a protected route should do for the given state.
#[must_use]
pub fn evaluate(input: &GuardInput, required_role: Option<UserRole>, location: &str) -> GuardDecision {
    let Some(is_authenticated) = input.is_authenticated else {
        return GuardDecision::Loading;
    };
    if !is_authenticated {
        return GuardDecision::Redirect(Redirect { to: LOGIN_PATH.to_owned(), from: Some(location.to_owned()) });
    }
    let Some(user) = &input.user else {
        // Flag arrived before the user record (rehydration in progress).
        return GuardDecision::Loading;
    };
    match required_role {
        Some(role) if user.role != role => {
            let to = if role == UserRole::Admin { LOGIN_PATH } else { HOME_PATH };
            GuardDecision::Redirect(Redirect { to: to.to_owned(), from: None })
        }
        _ => GuardDecision::Render,
    }
}

/// Router collaborator.
pub trait Navigator {
    /// Path of the location currently being requested.
    fn current_location(&self) -> String;

    /// Replace the current location with `path`, recording `origin` when set.
    fn redirect(&self, path: &str, origin: Option<&str>);
}

/// Guard state for one protected route.
#[derive(Debug, Clone, Default)]
pub struct RouteGate {
    required_role: Option<UserRole>,
    last: Option<GuardDecision>,
}

impl RouteGate {
    #[must_use]
    pub fn new(required_role: Option<UserRole>) -> Self {
        Self { required_role, last: None }
    }

    #[must_use]
    pub fn required_role(&self) -> Option<UserRole> {
        self.required_role
    }

    #[must_use]
    pub fn last_decision(&self) -> Option<&GuardDecision> {
        self.last.as_ref()
    }

    /// Evaluate against `input` and navigate if the outcome is a redirect that
    /// was not already issued.
    pub fn check(&mut self, input: &GuardInput, navigator: &dyn Navigator) -> GuardDecision {
        let location = navigator.current_location();
        let decision = evaluate(input, self.required_role, &location);
        if self.last.as_ref() != Some(&decision) {
            if let GuardDecision::Redirect(redirect) = &decision {
                debug!(to = %redirect.to, from = ?redirect.from, "route guard redirect");
                navigator.redirect(&redirect.to, redirect.from.as_deref());
            }
            self.last = Some(decision.clone());
        }
        decision
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
