//! Login notification endpoint (token issuer).

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::state::AuthState;
use super::storage::record_security_token;
use super::types::{LoginNotificationRequest, LoginNotificationResponse};
use super::utils::{normalize_email, valid_email};

/// Record a security token for a fresh sign-in and queue the notification
/// email carrying the redemption link.
///
/// The notification is a side channel of a login that already succeeded, so
/// internal failures are logged and absorbed: well-formed requests always get
/// `{"success": true}`. Only malformed input is rejected.
#[utoipa::path(
    post,
    path = "/v1/auth/login-notification",
    request_body = LoginNotificationRequest,
    responses(
        (status = 200, description = "Notification accepted", body = LoginNotificationResponse),
        (status = 400, description = "Missing or invalid field", body = String)
    ),
    tag = "auth"
)]
pub async fn login_notification(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginNotificationRequest>>,
) -> impl IntoResponse {
    let request: LoginNotificationRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    if request.user_id.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing user_id".to_string()).into_response();
    }

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    if let Err(err) =
        record_security_token(&pool, request.user_id.trim(), &email, auth_state.config()).await
    {
        // Never fail the login flow for a notification problem.
        error!("Failed to record login notification: {err}");
    }

    Json(LoginNotificationResponse { success: true }).into_response()
}
