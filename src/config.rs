//! Auth configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::types::AuthError;

pub const DEFAULT_AUTH_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_AUTH_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_SESSION_DIR: &str = ".helpdesk";
pub const DEFAULT_SESSION_KEY: &str = "auth-storage";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl AuthTimeouts {
    /// Upper bound for one store-level provider call.
    #[must_use]
    pub fn operation(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

impl Default for AuthTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_AUTH_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_AUTH_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub auth_url: String,
    pub api_key: String,
    pub timeouts: AuthTimeouts,
    pub session_dir: PathBuf,
    pub session_key: String,
}

impl AuthConfig {
    /// Build typed auth config from environment variables.
    ///
    /// Required:
    /// - `HELPDESK_AUTH_URL`: identity service base URL
    /// - `HELPDESK_AUTH_API_KEY`: public API key
    ///
    /// Optional:
    /// - `HELPDESK_AUTH_TIMEOUT_SECS`: default 15
    /// - `HELPDESK_AUTH_CONNECT_TIMEOUT_SECS`: default 5
    /// - `HELPDESK_SESSION_DIR`: default `.helpdesk`
    /// - `HELPDESK_SESSION_KEY`: default `auth-storage`
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or blank.
    pub fn from_env() -> Result<Self, AuthError> {
        let auth_url = required("HELPDESK_AUTH_URL")?;
        let api_key = required("HELPDESK_AUTH_API_KEY")?;
        Ok(Self::from_parts(auth_url, api_key))
    }

    /// Build config from explicit URL and key, reading the optional knobs
    /// from the environment.
    #[must_use]
    pub fn from_parts(auth_url: String, api_key: String) -> Self {
        let timeouts = AuthTimeouts {
            request_secs: env_parse_u64("HELPDESK_AUTH_TIMEOUT_SECS", DEFAULT_AUTH_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("HELPDESK_AUTH_CONNECT_TIMEOUT_SECS", DEFAULT_AUTH_CONNECT_TIMEOUT_SECS),
        };
        let session_dir = std::env::var("HELPDESK_SESSION_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_SESSION_DIR), PathBuf::from);
        let session_key = std::env::var("HELPDESK_SESSION_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SESSION_KEY.to_owned());

        Self {
            auth_url: auth_url.trim().trim_end_matches('/').to_owned(),
            api_key: api_key.trim().to_owned(),
            timeouts,
            session_dir,
            session_key,
        }
    }
}

fn required(key: &str) -> Result<String, AuthError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AuthError::Config(format!("{key} not set")))
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
