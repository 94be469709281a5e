//! Auth configuration and shared handler state.

use std::sync::Arc;

use super::identity::IdentityVerifier;

const DEFAULT_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_SESSION_TTL_SECONDS: i64 = 5 * 24 * 60 * 60;

/// Redirect outcomes the token redeemer can land on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedeemError {
    InvalidLink,
    LinkExpired,
    ServerError,
}

impl RedeemError {
    /// Coarse error code carried to the login page as a query parameter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidLink => "invalid_link",
            Self::LinkExpired => "link_expired",
            Self::ServerError => "server_error",
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    base_url: String,
    token_ttl_seconds: i64,
    session_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    pub(crate) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    /// Only mark cookies secure when the site is served over HTTPS.
    pub(crate) fn cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Login page URL carrying a coarse redemption error code.
    pub(crate) fn login_error_url(&self, error: RedeemError) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/login?error={}", error.as_str())
    }

    /// Confirmation page shown after a successful redemption.
    pub(crate) fn account_secured_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/account-secured")
    }
}

pub struct AuthState {
    config: AuthConfig,
    identity: Arc<dyn IdentityVerifier>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, identity: Arc<dyn IdentityVerifier>) -> Self {
        Self { config, identity }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(crate) fn identity(&self) -> &dyn IdentityVerifier {
        self.identity.as_ref()
    }
}
