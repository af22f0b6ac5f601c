use std::sync::Mutex;

use super::*;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// # Safety
/// Callers hold `ENV_LOCK` so no other test in this module touches the env concurrently.
unsafe fn clear_auth_env() {
    unsafe {
        std::env::remove_var("HELPDESK_AUTH_URL");
        std::env::remove_var("HELPDESK_AUTH_API_KEY");
        std::env::remove_var("HELPDESK_AUTH_TIMEOUT_SECS");
        std::env::remove_var("HELPDESK_AUTH_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("HELPDESK_SESSION_DIR");
        std::env::remove_var("HELPDESK_SESSION_KEY");
    }
}

#[test]
fn from_env_applies_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_auth_env();
        std::env::set_var("HELPDESK_AUTH_URL", "https://auth.example.test/");
        std::env::set_var("HELPDESK_AUTH_API_KEY", "anon-key");
    }

    let cfg = AuthConfig::from_env().unwrap();
    assert_eq!(cfg.auth_url, "https://auth.example.test");
    assert_eq!(cfg.api_key, "anon-key");
    assert_eq!(
        cfg.timeouts,
        AuthTimeouts { request_secs: DEFAULT_AUTH_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_AUTH_CONNECT_TIMEOUT_SECS }
    );
    assert_eq!(cfg.session_dir, PathBuf::from(DEFAULT_SESSION_DIR));
    assert_eq!(cfg.session_key, DEFAULT_SESSION_KEY);

    unsafe { clear_auth_env() };
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_auth_env();
        std::env::set_var("HELPDESK_AUTH_URL", "http://localhost:54321");
        std::env::set_var("HELPDESK_AUTH_API_KEY", "k");
        std::env::set_var("HELPDESK_AUTH_TIMEOUT_SECS", "42");
        std::env::set_var("HELPDESK_AUTH_CONNECT_TIMEOUT_SECS", "7");
        std::env::set_var("HELPDESK_SESSION_DIR", "/tmp/helpdesk");
        std::env::set_var("HELPDESK_SESSION_KEY", "desk-session");
    }

    let cfg = AuthConfig::from_env().unwrap();
    assert_eq!(cfg.timeouts, AuthTimeouts { request_secs: 42, connect_secs: 7 });
    assert_eq!(cfg.timeouts.operation(), Duration::from_secs(42));
    assert_eq!(cfg.session_dir, PathBuf::from("/tmp/helpdesk"));
    assert_eq!(cfg.session_key, "desk-session");

    unsafe { clear_auth_env() };
}

#[test]
fn from_env_missing_url_errors() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_auth_env();
        std::env::set_var("HELPDESK_AUTH_API_KEY", "k");
    }

    let err = AuthConfig::from_env().unwrap_err();
    assert_eq!(err, AuthError::Config("HELPDESK_AUTH_URL not set".into()));

    unsafe { clear_auth_env() };
}

#[test]
fn from_env_blank_key_errors() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_auth_env();
        std::env::set_var("HELPDESK_AUTH_URL", "http://localhost:54321");
        std::env::set_var("HELPDESK_AUTH_API_KEY", "   ");
    }

    let err = AuthConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("HELPDESK_AUTH_API_KEY"));

    unsafe { clear_auth_env() };
}

#[test]
fn invalid_or_zero_timeouts_fall_back_to_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_auth_env();
        std::env::set_var("HELPDESK_AUTH_TIMEOUT_SECS", "soon");
        std::env::set_var("HELPDESK_AUTH_CONNECT_TIMEOUT_SECS", "0");
    }

    let cfg = AuthConfig::from_parts("http://x".into(), "k".into());
    assert_eq!(cfg.timeouts, AuthTimeouts::default());

    unsafe { clear_auth_env() };
}
