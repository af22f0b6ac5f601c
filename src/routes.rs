//! Helpdesk route table: which pages need a session, and which need a role.

use crate::guard::{GuardDecision, GuardInput, RouteGate, evaluate};
use crate::types::UserRole;

/// Access requirement attached to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Role(UserRole),
}

impl Access {
    /// Role the guard must enforce, if the route is protected at all.
    #[must_use]
    pub fn required_role(self) -> Option<UserRole> {
        match self {
            Self::Role(role) => Some(role),
            Self::Public | Self::Authenticated => None,
        }
    }
}

const PUBLIC_PATHS: &[&str] = &["/", "/login", "/register"];

/// Look up the requirement for `path`. Unknown paths require a session.
#[must_use]
pub fn access_for(path: &str) -> Access {
    let path = normalize(path);
    if PUBLIC_PATHS.contains(&path.as_str()) {
        return Access::Public;
    }
    if matches_prefix(&path, "/admin") {
        return Access::Role(UserRole::Admin);
    }
    if matches_prefix(&path, "/agent") {
        return Access::Role(UserRole::Agent);
    }
    // `/tickets`, `/chat`, `/profile` and anything unlisted.
    Access::Authenticated
}

/// Decide what to show for `path`; public routes always render.
#[must_use]
pub fn decide(path: &str, input: &GuardInput) -> GuardDecision {
    match access_for(path) {
        Access::Public => GuardDecision::Render,
        access => evaluate(input, access.required_role(), path),
    }
}

/// Gate for `path`, or `None` when the route is public.
#[must_use]
pub fn gate_for(path: &str) -> Option<RouteGate> {
    match access_for(path) {
        Access::Public => None,
        access => Some(RouteGate::new(access.required_role())),
    }
}

fn normalize(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default().trim();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
