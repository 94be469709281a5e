//! Session endpoints: mint, inspect, and clear session cookies.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::state::{AuthConfig, AuthState};
use super::storage::{delete_session, insert_session, lookup_session, SessionRecord};
use super::types::{SessionRequest, SessionResponse, SessionStatusResponse};
use super::utils::hash_token;

/// Server-side session cookie; opaque value, never readable by page scripts.
pub(crate) const SESSION_COOKIE_NAME: &str = "grammatica_session";
/// Client-readable marker consumed by the route guard only. Never an
/// authorization input.
pub(crate) const MARKER_COOKIE_NAME: &str = "grammatica_auth";

/// Exchange a short-lived identity credential for a session cookie.
///
/// Session establishment is on the critical path of login, so unlike the
/// notification endpoint, failures are reported to the caller.
#[utoipa::path(
    post,
    path = "/v1/auth/session",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Session established", body = SessionStatusResponse),
        (status = 400, description = "Missing credential", body = SessionStatusResponse),
        (status = 401, description = "Credential rejected", body = SessionStatusResponse)
    ),
    tag = "auth"
)]
pub async fn create_session(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<SessionRequest>>,
) -> impl IntoResponse {
    let request: SessionRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(SessionStatusResponse::error("Missing id_token")),
            )
                .into_response()
        }
    };

    let id_token = request.id_token.trim();
    if id_token.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(SessionStatusResponse::error("Missing id_token")),
        )
            .into_response();
    }

    let identity = match auth_state.identity().verify(id_token).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(SessionStatusResponse::error("Invalid credential")),
            )
                .into_response()
        }
        Err(err) => {
            // Provider errors stay server-side; the caller only learns the
            // credential could not be accepted.
            error!("Failed to verify identity credential: {err}");
            return (
                StatusCode::UNAUTHORIZED,
                Json(SessionStatusResponse::error("Invalid credential")),
            )
                .into_response();
        }
    };

    let config = auth_state.config();
    let token = match insert_session(&pool, &identity.user_id, config.session_ttl_seconds()).await {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to insert session: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SessionStatusResponse::error("Session unavailable")),
            )
                .into_response();
        }
    };

    let mut headers = HeaderMap::new();
    match (session_cookie(config, &token), marker_cookie(config)) {
        (Ok(session), Ok(marker)) => {
            headers.append(SET_COOKIE, session);
            headers.append(SET_COOKIE, marker);
        }
        _ => {
            error!("Failed to build session cookies");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SessionStatusResponse::error("Session unavailable")),
            )
                .into_response();
        }
    }

    (StatusCode::OK, headers, Json(SessionStatusResponse::success())).into_response()
}

/// Resolve the presented session cookie.
#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(headers: HeaderMap, pool: Extension<PgPool>) -> impl IntoResponse {
    // Missing cookies are treated as "no session" to avoid leaking auth state.
    let Some(token) = extract_session_token(&headers) else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let token_hash = hash_token(&token);
    match lookup_session(&pool, &token_hash).await {
        Ok(Some(SessionRecord { user_id })) => {
            (StatusCode::OK, Json(SessionResponse { user_id })).into_response()
        }
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Clear the presented session and both cookies.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        let token_hash = hash_token(&token);
        if let Err(err) = delete_session(&pool, &token_hash).await {
            error!("Failed to delete session: {err}");
        }
    }

    // Always clear the cookies, even if the session record was missing.
    let config = auth_state.config();
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_session_cookie(config) {
        response_headers.append(SET_COOKIE, cookie);
    }
    if let Ok(cookie) = clear_marker_cookie(config) {
        response_headers.append(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// Build the `HttpOnly` cookie carrying the session token.
pub(super) fn session_cookie(
    config: &AuthConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Build the client-readable marker cookie used by the route guard.
pub(super) fn marker_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let mut cookie = format!("{MARKER_COOKIE_NAME}=1; Path=/; SameSite=Lax; Max-Age={ttl_seconds}");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_session_cookie(
    config: &AuthConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_marker_cookie(config: &AuthConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{MARKER_COOKIE_NAME}=; Path=/; SameSite=Lax; Max-Age=0");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::super::state::AuthConfig;
    use super::super::test_support::{auth_state, lazy_pool};
    use super::{
        clear_marker_cookie, clear_session_cookie, create_session, logout, marker_cookie, session,
        session_cookie,
    };
    use super::{SessionRequest, StatusCode};
    use anyhow::{Context, Result};
    use axum::extract::Extension;
    use axum::http::header::SET_COOKIE;
    use axum::http::HeaderMap;
    use axum::response::IntoResponse;
    use axum::Json;

    fn https_config() -> AuthConfig {
        AuthConfig::new("https://grammatica.test".to_string())
    }

    #[test]
    fn session_cookie_flags() -> Result<()> {
        let cookie = session_cookie(&https_config(), "tok")?;
        let cookie = cookie.to_str().context("invalid header")?;
        assert!(cookie.starts_with("grammatica_session=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=432000"));
        assert!(cookie.contains("Secure"));
        Ok(())
    }

    #[test]
    fn marker_cookie_is_client_readable() -> Result<()> {
        let cookie = marker_cookie(&https_config())?;
        let cookie = cookie.to_str().context("invalid header")?;
        assert!(cookie.starts_with("grammatica_auth=1;"));
        assert!(!cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        Ok(())
    }

    #[test]
    fn cookies_not_secure_over_http() -> Result<()> {
        let config = AuthConfig::new("http://localhost:3000".to_string());
        let cookie = session_cookie(&config, "tok")?;
        assert!(!cookie.to_str().context("invalid header")?.contains("Secure"));
        Ok(())
    }

    #[test]
    fn clearing_cookies_expire_immediately() -> Result<()> {
        let session = clear_session_cookie(&https_config())?;
        let marker = clear_marker_cookie(&https_config())?;
        assert!(session.to_str().context("invalid")?.contains("Max-Age=0"));
        assert!(marker.to_str().context("invalid")?.contains("Max-Age=0"));
        Ok(())
    }

    #[tokio::test]
    async fn create_session_missing_payload() -> Result<()> {
        let response = create_session(Extension(lazy_pool()?), Extension(auth_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn create_session_rejects_invalid_credential() -> Result<()> {
        let response = create_session(
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(SessionRequest {
                id_token: "wrong".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn create_session_provider_outage_stays_generic() -> Result<()> {
        let response = create_session(
            Extension(lazy_pool()?),
            Extension(auth_state()),
            Some(Json(SessionRequest {
                id_token: "unavailable".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn session_without_cookie_is_no_content() -> Result<()> {
        let response = session(HeaderMap::new(), Extension(lazy_pool()?))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        Ok(())
    }

    #[tokio::test]
    async fn logout_always_clears_cookies() -> Result<()> {
        let response = logout(HeaderMap::new(), Extension(lazy_pool()?), Extension(auth_state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let cookies: Vec<_> = response.headers().get_all(SET_COOKIE).iter().collect();
        assert_eq!(cookies.len(), 2);
        Ok(())
    }
}
