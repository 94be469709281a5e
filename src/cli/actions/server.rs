use crate::api::{
    self, email,
    guard::GuardConfig,
    handlers::auth::{AuthConfig, AuthState, HttpIdentityVerifier},
};
use anyhow::{Context, Result};
use std::sync::Arc;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub base_url: String,
    pub identity_verify_url: String,
    pub token_ttl_seconds: i64,
    pub session_ttl_seconds: i64,
    pub outbox_poll_seconds: u64,
    pub outbox_batch_size: usize,
    pub outbox_max_attempts: u32,
    pub outbox_backoff_base_seconds: u64,
    pub outbox_backoff_max_seconds: u64,
}

/// Execute the server action.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the server fails to start
pub async fn execute(args: Args) -> Result<()> {
    Url::parse(&args.base_url).with_context(|| format!("Invalid base URL: {}", args.base_url))?;
    Url::parse(&args.identity_verify_url)
        .with_context(|| format!("Invalid identity verify URL: {}", args.identity_verify_url))?;

    let identity = HttpIdentityVerifier::new(args.identity_verify_url)
        .context("Failed to build identity verifier")?;

    let auth_config = AuthConfig::new(args.base_url)
        .with_token_ttl_seconds(args.token_ttl_seconds)
        .with_session_ttl_seconds(args.session_ttl_seconds);
    let auth_state = Arc::new(AuthState::new(auth_config, Arc::new(identity)));

    let guard = Arc::new(GuardConfig::new());

    let email_config = email::EmailWorkerConfig::new()
        .with_poll_interval_seconds(args.outbox_poll_seconds)
        .with_batch_size(args.outbox_batch_size)
        .with_max_attempts(args.outbox_max_attempts)
        .with_backoff_base_seconds(args.outbox_backoff_base_seconds)
        .with_backoff_max_seconds(args.outbox_backoff_max_seconds);

    api::new(args.port, args.dsn, auth_state, guard, email_config).await
}
