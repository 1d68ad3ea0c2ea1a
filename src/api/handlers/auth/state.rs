//! Auth configuration and shared state.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use crate::api::email::EmailSender;
use crate::token::{ACCESS_TOKEN_TTL_SECONDS, REFRESH_TOKEN_TTL_SECONDS};

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            access_token_ttl_seconds: ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: REFRESH_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(super) fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    pub(super) fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    token_secret: SecretString,
    email_sender: Arc<dyn EmailSender>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        token_secret: SecretString,
        email_sender: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            config,
            token_secret,
            email_sender,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Raw signing secret bytes for the token codec.
    pub(crate) fn token_secret(&self) -> &[u8] {
        self.token_secret.expose_secret().as_bytes()
    }

    pub(super) fn email_sender(&self) -> &dyn EmailSender {
        self.email_sender.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::email::LogEmailSender;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://portal.sertika.dev".to_string());
        assert_eq!(config.frontend_base_url(), "https://portal.sertika.dev");
        assert_eq!(config.access_token_ttl_seconds(), 3600);
        assert_eq!(config.refresh_token_ttl_seconds(), 7 * 24 * 3600);
        assert!(config.session_cookie_secure());

        let config = config
            .with_access_token_ttl_seconds(120)
            .with_refresh_token_ttl_seconds(240);
        assert_eq!(config.access_token_ttl_seconds(), 120);
        assert_eq!(config.refresh_token_ttl_seconds(), 240);
    }

    #[test]
    fn plain_http_frontend_disables_secure_cookie() {
        let config = AuthConfig::new("http://localhost:5173".to_string());
        assert!(!config.session_cookie_secure());
    }

    #[test]
    fn auth_state_exposes_secret_bytes() {
        let state = AuthState::new(
            AuthConfig::new("https://portal.sertika.dev".to_string()),
            SecretString::from("super-secret".to_string()),
            Arc::new(LogEmailSender),
        );
        assert_eq!(state.token_secret(), b"super-secret");
    }
}
