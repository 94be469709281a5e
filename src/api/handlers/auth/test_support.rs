//! Shared fixtures for auth handler tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

use super::identity::{IdentityVerifier, VerifiedIdentity};
use super::state::{AuthConfig, AuthState};

/// Pool that never connects; handler tests only exercise paths that either
/// skip the database or must absorb its failure.
pub(crate) fn lazy_pool() -> Result<PgPool> {
    Ok(PgPoolOptions::new().connect_lazy("postgres://postgres@localhost:1/postgres")?)
}

/// Connect to the Postgres instance named by `GRAMMATICA_TEST_DSN` and apply
/// migrations. Tests using this are `#[ignore]`d by default; run them with
/// `cargo test -- --ignored` against a disposable database.
pub(crate) async fn live_pool() -> Result<PgPool> {
    let dsn = std::env::var("GRAMMATICA_TEST_DSN")
        .map_err(|_| anyhow!("GRAMMATICA_TEST_DSN is not set"))?;
    let pool = PgPoolOptions::new().max_connections(2).connect(&dsn).await?;
    sqlx::migrate!().run(&pool).await?;
    Ok(pool)
}

/// Verifier stub: "valid-token" maps to `uid-1`, "unavailable" simulates a
/// provider outage, everything else is rejected.
pub(crate) struct StubIdentityVerifier;

#[async_trait]
impl IdentityVerifier for StubIdentityVerifier {
    async fn verify(&self, id_token: &str) -> Result<Option<VerifiedIdentity>> {
        match id_token {
            "valid-token" => Ok(Some(VerifiedIdentity {
                user_id: "uid-1".to_string(),
            })),
            "unavailable" => Err(anyhow!("identity provider unreachable")),
            _ => Ok(None),
        }
    }
}

pub(crate) fn auth_state() -> Arc<AuthState> {
    let config = AuthConfig::new("https://grammatica.test".to_string());
    Arc::new(AuthState::new(config, Arc::new(StubIdentityVerifier)))
}
