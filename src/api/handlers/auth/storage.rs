//! Database helpers for security tokens and sessions.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::{error, Instrument};
use uuid::Uuid;

use super::state::AuthConfig;
use super::utils::{
    build_redeem_url, generate_security_token, generate_session_token, hash_token,
    is_unique_violation,
};

/// Minimal data returned for a valid session cookie.
pub(crate) struct SessionRecord {
    pub(crate) user_id: String,
}

/// Result of a successful redemption.
pub(super) struct RedeemedToken {
    pub(super) user_id: String,
    pub(super) revoked_sessions: u64,
}

/// Record a security token for a sign-in event and queue the notification.
///
/// Token row and outbox row are written in one transaction so a link is never
/// mailed without a matching token, and vice versa.
pub(super) async fn record_security_token(
    pool: &PgPool,
    user_id: &str,
    email: &str,
    config: &AuthConfig,
) -> Result<()> {
    let token = generate_security_token()?;
    let token_hash = hash_token(&token);

    let mut tx = pool
        .begin()
        .await
        .context("begin login notification transaction")?;

    let query = r"
        INSERT INTO security_tokens (user_id, token_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(&token_hash)
        .bind(config.token_ttl_seconds())
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert security token")?;

    let secure_url = build_redeem_url(config.base_url(), &token);
    let payload = notification_payload(email, &secure_url);
    let payload_text = serde_json::to_string(&payload).context("failed to serialize payload")?;

    let query = r"
        INSERT INTO email_outbox (to_email, template, payload_json)
        VALUES ($1, $2, $3::jsonb)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind("account_security")
        .bind(payload_text)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert email outbox row")?;

    tx.commit()
        .await
        .context("commit login notification transaction")?;

    Ok(())
}

/// Template payload for the account security email. `issued_at` is RFC 3339.
fn notification_payload(email: &str, secure_url: &str) -> serde_json::Value {
    json!({
        "email": email,
        "secure_url": secure_url,
        "issued_at": Utc::now().to_rfc3339(),
    })
}

/// Redeem a security token: revoke the owner's sessions, then consume it.
///
/// The token row is locked for the whole transaction, so concurrent
/// redemptions of the same token serialize; the loser re-evaluates the
/// `used`/`expires_at` predicate and gets `None`. Revocation happens before
/// the `used` flag flips, and both roll back together on failure, so a token
/// is never consumed without its sessions actually revoked.
pub(super) async fn redeem_security_token(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<RedeemedToken>> {
    let mut tx = pool.begin().await.context("begin redemption transaction")?;

    let query = r"
        SELECT id, user_id
        FROM security_tokens
        WHERE token_hash = $1
          AND used = FALSE
          AND expires_at > NOW()
        FOR UPDATE
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to lookup security token")?;

    let Some(row) = row else {
        let _ = tx.rollback().await;
        return Ok(None);
    };

    let token_id: Uuid = row.get("id");
    let user_id: String = row.get("user_id");

    let query = "DELETE FROM user_sessions WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let revoked = sqlx::query(query)
        .bind(&user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to revoke user sessions")?
        .rows_affected();

    let query = r"
        UPDATE security_tokens
        SET used = TRUE, used_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to consume security token")?;

    tx.commit().await.context("commit redemption transaction")?;

    Ok(Some(RedeemedToken {
        user_id,
        revoked_sessions: revoked,
    }))
}

/// Create a session row and return the raw token for the cookie.
pub(super) async fn insert_session(
    pool: &PgPool,
    user_id: &str,
    ttl_seconds: i64,
) -> Result<String> {
    let query = r"
        INSERT INTO user_sessions (user_id, session_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_session_token()?;
        let token_hash = hash_token(&token);
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(&token_hash)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique session token"))
}

/// Resolve a session hash to its owner, if still valid.
pub(crate) async fn lookup_session(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<SessionRecord>> {
    let query = r"
        SELECT user_id
        FROM user_sessions
        WHERE session_hash = $1
          AND expires_at > NOW()
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    if row.is_none() {
        return Ok(None);
    }

    // Record activity for audit/visibility without extending the session TTL.
    // The bump is a side channel; a valid session resolves even if it fails.
    let query = r"
        UPDATE user_sessions
        SET last_seen_at = NOW()
        WHERE session_hash = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    if let Err(err) = sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
    {
        error!("Failed to update session last_seen_at: {err}");
    }

    Ok(row.map(|row| SessionRecord {
        user_id: row.get("user_id"),
    }))
}

/// Delete one session by hash. Idempotent; missing rows are fine.
pub(super) async fn delete_session(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    let query = "DELETE FROM user_sessions WHERE session_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;
    Ok(())
}
