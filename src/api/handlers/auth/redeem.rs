//! Security token redemption endpoint (token redeemer).

use axum::{
    extract::{Extension, Query},
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::IntoParams;

use super::session::{clear_marker_cookie, clear_session_cookie};
use super::state::{AuthState, RedeemError};
use super::storage::redeem_security_token;
use super::utils::hash_token;

#[derive(Debug, Deserialize, IntoParams)]
pub struct RedeemParams {
    pub token: Option<String>,
}

/// Redeem a security link: revoke every session of the owning user, consume
/// the token, and redirect.
///
/// Every outcome is a terminal redirect. Unknown, expired, and already-used
/// tokens all land on the same `link_expired` outcome so callers cannot
/// distinguish the failure mode.
#[utoipa::path(
    get,
    path = "/v1/auth/secure-account",
    params(RedeemParams),
    responses(
        (status = 303, description = "Redirect to the confirmation page, or to the login page with a coarse error code")
    ),
    tag = "auth"
)]
pub async fn secure_account(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    params: Option<Query<RedeemParams>>,
) -> impl IntoResponse {
    let config = auth_state.config();

    let token = params
        .and_then(|Query(params)| params.token)
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    // No token: bounce without touching the store.
    let Some(token) = token else {
        return Redirect::to(&config.login_error_url(RedeemError::InvalidLink)).into_response();
    };

    let token_hash = hash_token(&token);
    match redeem_security_token(&pool, &token_hash).await {
        Ok(Some(redeemed)) => {
            info!(
                user_id = %redeemed.user_id,
                revoked_sessions = redeemed.revoked_sessions,
                "account secured via token redemption"
            );
            // Clear cookies on the redeeming browser; other browsers are
            // covered by the revocation itself.
            let mut headers = HeaderMap::new();
            if let Ok(cookie) = clear_session_cookie(config) {
                headers.append(SET_COOKIE, cookie);
            }
            if let Ok(cookie) = clear_marker_cookie(config) {
                headers.append(SET_COOKIE, cookie);
            }
            (headers, Redirect::to(&config.account_secured_url())).into_response()
        }
        Ok(None) => {
            Redirect::to(&config.login_error_url(RedeemError::LinkExpired)).into_response()
        }
        Err(err) => {
            error!("Failed to redeem security token: {err}");
            Redirect::to(&config.login_error_url(RedeemError::ServerError)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{auth_state, lazy_pool, live_pool};
    use super::super::utils::generate_security_token;
    use super::{secure_account, RedeemParams};
    use anyhow::Result;
    use axum::extract::{Extension, Query};
    use axum::http::{header::LOCATION, StatusCode};
    use axum::response::IntoResponse;

    fn location(response: &axum::response::Response) -> Option<&str> {
        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    #[tokio::test]
    async fn missing_token_redirects_invalid_link() -> Result<()> {
        let response = secure_account(Extension(lazy_pool()?), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            Some("https://grammatica.test/login?error=invalid_link")
        );
        Ok(())
    }

    #[tokio::test]
    async fn blank_token_redirects_invalid_link() -> Result<()> {
        let response = secure_account(
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Query(RedeemParams {
                token: Some("   ".to_string()),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            Some("https://grammatica.test/login?error=invalid_link")
        );
        Ok(())
    }

    #[tokio::test]
    async fn store_failure_redirects_server_error() -> Result<()> {
        // The lazy pool cannot connect, so the lookup errors out; the caller
        // must only ever see the generic server_error outcome.
        let response = secure_account(
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Query(RedeemParams {
                token: Some("deadbeef".to_string()),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            Some("https://grammatica.test/login?error=server_error")
        );
        Ok(())
    }

    #[tokio::test]
    #[ignore]
    async fn unknown_token_redirects_link_expired() -> Result<()> {
        // A well-formed token that was never issued must land on the same
        // outcome as an expired or already-used one.
        let pool = live_pool().await?;
        let response = secure_account(
            Extension(pool),
            Extension(auth_state()),
            Some(Query(RedeemParams {
                token: Some(generate_security_token()?),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            Some("https://grammatica.test/login?error=link_expired")
        );
        Ok(())
    }
}
