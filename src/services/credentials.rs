//! Authentication token handling for the remote API.

use crate::types::settings::ApiSettings;

/// Environment variable that overrides the configured token.
pub const AUTH_TOKEN_ENV: &str = "PINMARK_AUTH_TOKEN";

/// Supplies the authentication fragment appended to every request.
pub trait CredentialProvider: Send + Sync {
    fn has_credential(&self) -> bool;
    /// `auth_token=<encoded token>`, or `None` without a credential.
    fn credential_param(&self) -> Option<String>;
}

/// A fixed `user:TOKEN` credential.
#[derive(Debug, Clone, Default)]
pub struct TokenCredentials {
    token: Option<String>,
}

impl TokenCredentials {
    /// Blank tokens count as no credential.
    pub fn new(token: Option<String>) -> Self {
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self { token }
    }

    /// The environment override when set, else the configured token.
    pub fn from_settings(settings: &ApiSettings) -> Self {
        let from_env = std::env::var(AUTH_TOKEN_ENV).ok().filter(|t| !t.trim().is_empty());
        if from_env.is_some() {
            tracing::debug!(source = AUTH_TOKEN_ENV, "auth_token_loaded");
        }
        Self::new(from_env.or_else(|| settings.auth_token.clone()))
    }
}

impl CredentialProvider for TokenCredentials {
    fn has_credential(&self) -> bool {
        self.token.is_some()
    }

    fn credential_param(&self) -> Option<String> {
        self.token
            .as_ref()
            .map(|t| format!("auth_token={}", urlencoding::encode(t)))
    }
}
