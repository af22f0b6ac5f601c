//! Session data model shared by the store, facade, and route guard.
//!
//! DESIGN
//! ======
//! `Session` keeps its three fields private so the only way to build one is
//! through [`Session::authenticated`] or [`Session::signed_out`]. Every state
//! transition therefore replaces the whole triple and the
//! "authenticated iff user and token present" invariant cannot be torn.
//!
//! Provider payloads are loose (optional email, free-form metadata); they are
//! normalized into the canonical [`User`] record here so nothing downstream
//! has to guess at defaults.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::provider::ProviderUser;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by identity-provider, storage, and config operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The provider refused the credentials or signup; carries its message.
    #[error("{0}")]
    Rejected(String),

    /// Signup succeeded but the provider did not issue a session.
    #[error("account created; confirm your email address before signing in")]
    ConfirmationRequired,

    /// Transport failure or provider-side outage. Detail is for logs only.
    #[error("authentication service unavailable, please try again")]
    Unavailable { detail: String },

    /// The provider call exceeded the configured timeout.
    #[error("authentication service timed out")]
    Timeout,

    /// The provider response body could not be understood.
    #[error("unexpected provider response: {0}")]
    Parse(String),

    /// Durable session storage failed.
    #[error("session storage failed: {0}")]
    Storage(String),

    /// A configuration value is missing or invalid.
    #[error("config error: {0}")]
    Config(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl AuthError {
    /// Stable machine-readable code for the error.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "E_REJECTED",
            Self::ConfirmationRequired => "E_CONFIRMATION_REQUIRED",
            Self::Unavailable { .. } => "E_UNAVAILABLE",
            Self::Timeout => "E_TIMEOUT",
            Self::Parse(_) => "E_PARSE",
            Self::Storage(_) => "E_STORAGE",
            Self::Config(_) => "E_CONFIG",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    /// Whether retrying the same call later could plausibly succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout)
    }

    pub(crate) fn unavailable(detail: impl Into<String>) -> Self {
        Self::Unavailable { detail: detail.into() }
    }
}

// =============================================================================
// USER
// =============================================================================

/// Helpdesk role attached to every user record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Agent,
    Admin,
}

impl UserRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AuthError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "agent" => Ok(Self::Agent),
            "admin" => Ok(Self::Admin),
            other => Err(AuthError::Parse(format!("unknown role: {other}"))),
        }
    }
}

/// Canonical identity record for the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Provider-assigned user identifier.
    pub id: String,
    /// Sign-in email address.
    pub email: String,
    /// Display name; falls back to the email address.
    pub name: String,
    /// Helpdesk role; defaults to [`UserRole::User`].
    #[serde(default)]
    pub role: UserRole,
    /// Optional department the user belongs to.
    #[serde(default)]
    pub department: Option<String>,
    /// Account creation timestamp as reported by the provider (RFC 3339).
    #[serde(default)]
    pub created_at: Option<String>,
    /// Last profile update timestamp as reported by the provider (RFC 3339).
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl User {
    /// Normalize a provider user payload into the canonical record.
    ///
    /// Role comes only from `app_metadata`, which users cannot edit; a
    /// missing or unrecognized role becomes `user`. Name and department come
    /// from `user_metadata`, and a missing or blank name becomes the email.
    #[must_use]
    pub fn from_provider(raw: &ProviderUser) -> Self {
        let email = raw.email.clone().unwrap_or_default();
        let name = metadata_str(&raw.user_metadata, "name")
            .or_else(|| metadata_str(&raw.user_metadata, "full_name"))
            .unwrap_or_else(|| email.clone());
        let role = metadata_str(&raw.app_metadata, "role")
            .and_then(|r| r.parse().ok())
            .unwrap_or_default();
        let department = metadata_str(&raw.user_metadata, "department");

        Self {
            id: raw.id.clone(),
            email,
            name,
            role,
            department,
            created_at: raw.created_at.clone(),
            updated_at: raw.updated_at.clone(),
        }
    }

    /// Normalize a payload returned from signup.
    ///
    /// Role is always `user` and name/department come from what the caller
    /// submitted, whatever the provider echoed back.
    #[must_use]
    pub fn from_registration(raw: &ProviderUser, name: &str, department: Option<&str>) -> Self {
        let mut user = Self::from_provider(raw);
        user.role = UserRole::User;
        user.name = if name.trim().is_empty() { user.email.clone() } else { name.trim().to_owned() };
        user.department = department
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_owned);
        user
    }
}

fn metadata_str(metadata: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    metadata
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

// =============================================================================
// SESSION
// =============================================================================

/// The authentication triple: user, bearer token, authenticated flag.
///
/// Serialized as `{"user": .., "token": .., "isAuthenticated": ..}`, which is
/// also the persisted snapshot format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    user: Option<User>,
    token: Option<String>,
    is_authenticated: bool,
}

impl Session {
    /// A validated session for `user` holding `token`.
    #[must_use]
    pub fn authenticated(user: User, token: String) -> Self {
        Self { user: Some(user), token: Some(token), is_authenticated: true }
    }

    /// The empty, unauthenticated triple.
    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    #[must_use]
    pub fn role(&self) -> Option<UserRole> {
        self.user.as_ref().map(|u| u.role)
    }

    /// True when the flag agrees with the presence of both user and token.
    ///
    /// Always true for values built through the constructors; used to reject
    /// hand-edited or truncated persisted snapshots.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let present = self.user.is_some() && self.token.as_deref().is_some_and(|t| !t.is_empty());
        let absent = self.user.is_none() && self.token.is_none();
        if self.is_authenticated { present } else { absent }
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
