//! REST identity provider speaking the hosted-auth (GoTrue) HTTP API.
//!
//! Thin HTTP wrapper: request building and status handling live in
//! [`HttpIdentityProvider`], while body parsing is pure (`parse_session`,
//! `parse_user`, `error_message`) for testability.
//!
//! The client keeps the current session in memory, the way hosted-auth SDKs
//! do, so `get_session` can validate it without the caller passing a token.

use std::sync::RwLock;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, warn};

use super::{AuthChange, AuthEvents, AuthSubscription, IdentityProvider, ProviderSession, ProviderUser, SignUpMetadata};
use crate::config::AuthConfig;
use crate::types::AuthError;

const AUTH_PREFIX: &str = "/auth/v1";

// =============================================================================
// ENDPOINTS
// =============================================================================

fn token_endpoint(base_url: &str) -> String {
    format!("{base_url}{AUTH_PREFIX}/token?grant_type=password")
}

fn signup_endpoint(base_url: &str) -> String {
    format!("{base_url}{AUTH_PREFIX}/signup")
}

fn logout_endpoint(base_url: &str) -> String {
    format!("{base_url}{AUTH_PREFIX}/logout")
}

fn user_endpoint(base_url: &str) -> String {
    format!("{base_url}{AUTH_PREFIX}/user")
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpIdentityProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    current: RwLock<Option<ProviderSession>>,
    restored_token: RwLock<Option<String>>,
    events: AuthEvents,
}

impl HttpIdentityProvider {
    /// Build a provider client from typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| AuthError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.auth_url.clone(),
            api_key: config.api_key.clone(),
            current: RwLock::new(None),
            restored_token: RwLock::new(None),
            events: AuthEvents::new(),
        })
    }

    fn set_current(&self, session: Option<ProviderSession>) {
        if let Ok(mut current) = self.current.write() {
            *current = session;
        }
        if let Ok(mut restored) = self.restored_token.write() {
            *restored = None;
        }
    }

    /// Token to validate: the live session's, else one restored from storage.
    fn bearer(&self) -> Option<String> {
        let live = self
            .current
            .read()
            .ok()
            .and_then(|c| c.as_ref().map(|s| s.access_token.clone()));
        live.or_else(|| self.restored_token.read().ok().and_then(|t| t.clone()))
    }

    async fn post_credentials(&self, url: &str, body: &serde_json::Value) -> Result<String, AuthError> {
        let response = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(status_error(status, &text));
        }
        Ok(text)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<ProviderSession, AuthError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let text = self
            .post_credentials(&token_endpoint(&self.base_url), &body)
            .await?;
        let session = parse_session(&text)?;
        self.set_current(Some(session.clone()));
        self.events.publish(AuthChange::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<ProviderSession, AuthError> {
        let body = serde_json::json!({ "email": email, "password": password, "data": metadata });
        let text = self
            .post_credentials(&signup_endpoint(&self.base_url), &body)
            .await?;
        let session = parse_signup(&text)?;
        self.set_current(Some(session.clone()));
        self.events.publish(AuthChange::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self.bearer();
        // Local provider state is dropped whatever the server says.
        self.set_current(None);
        self.events.publish(AuthChange::signed_out());

        let Some(token) = token else {
            return Ok(());
        };
        let response = self
            .http
            .post(logout_endpoint(&self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(status_error(status, &text))
    }

    async fn get_session(&self) -> Result<Option<ProviderSession>, AuthError> {
        let Some(token) = self.bearer() else {
            return Ok(None);
        };
        let response = self
            .http
            .get(user_endpoint(&self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            debug!(status = status.as_u16(), "provider rejected held token");
            self.set_current(None);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(status, &text));
        }

        let user = parse_user(&text)?;
        let refresh_token = self
            .current
            .read()
            .ok()
            .and_then(|c| c.as_ref().and_then(|s| s.refresh_token.clone()));
        let session = ProviderSession { access_token: token, refresh_token, expires_in: None, user };
        self.set_current(Some(session.clone()));
        Ok(Some(session))
    }

    fn restore_session(&self, access_token: &str) {
        if let Ok(mut restored) = self.restored_token.write() {
            *restored = Some(access_token.to_owned());
        }
    }

    fn subscribe(&self) -> AuthSubscription {
        self.events.subscribe()
    }
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

fn transport_error(e: reqwest::Error) -> AuthError {
    if e.is_timeout() {
        AuthError::Timeout
    } else {
        AuthError::unavailable(e.to_string())
    }
}

/// Map a non-success status to the error taxonomy.
///
/// 4xx means the provider understood and refused the request, so its message
/// goes to the user. Anything else is an outage.
fn status_error(status: StatusCode, body: &str) -> AuthError {
    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        let message = error_message(body).unwrap_or_else(|| format!("request rejected ({})", status.as_u16()));
        return AuthError::Rejected(message);
    }
    warn!(status = status.as_u16(), "identity provider error response");
    AuthError::unavailable(format!("status {}: {body}", status.as_u16()))
}

/// Pull a human-readable message out of a provider error body.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str))
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_owned)
}

pub(crate) fn parse_session(body: &str) -> Result<ProviderSession, AuthError> {
    serde_json::from_str(body).map_err(|e| AuthError::Parse(e.to_string()))
}

pub(crate) fn parse_user(body: &str) -> Result<ProviderUser, AuthError> {
    serde_json::from_str(body).map_err(|e| AuthError::Parse(e.to_string()))
}

/// Signup answers with a session, or with a bare user when the account still
/// needs email confirmation.
pub(crate) fn parse_signup(body: &str) -> Result<ProviderSession, AuthError> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|e| AuthError::Parse(e.to_string()))?;
    if value.get("access_token").is_some_and(|t| !t.is_null()) {
        return serde_json::from_value(value).map_err(|e| AuthError::Parse(e.to_string()));
    }
    if value.get("id").is_some() || value.get("user").is_some() {
        return Err(AuthError::ConfirmationRequired);
    }
    Err(AuthError::Parse("signup response carried neither session nor user".to_owned()))
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
