//! Request/response types for auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginNotificationRequest {
    pub user_id: String,
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginNotificationResponse {
    pub success: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionRequest {
    pub id_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionStatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SessionStatusResponse {
    pub(super) fn success() -> Self {
        Self {
            status: "success".to_string(),
            message: None,
        }
    }

    pub(super) fn error(message: &str) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message.to_string()),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn login_notification_request_round_trips() -> Result<()> {
        let request = LoginNotificationRequest {
            user_id: "uid-1".to_string(),
            email: "alice@example.com".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("email")
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "alice@example.com");
        let decoded: LoginNotificationRequest = serde_json::from_value(value)?;
        assert_eq!(decoded.user_id, "uid-1");
        Ok(())
    }

    #[test]
    fn session_status_success_omits_message() -> Result<()> {
        let value = serde_json::to_value(SessionStatusResponse::success())?;
        assert_eq!(
            value.get("status").and_then(serde_json::Value::as_str),
            Some("success")
        );
        assert!(value.get("message").is_none());
        Ok(())
    }

    #[test]
    fn session_status_error_carries_message() -> Result<()> {
        let value = serde_json::to_value(SessionStatusResponse::error("Invalid credential"))?;
        assert_eq!(
            value.get("status").and_then(serde_json::Value::as_str),
            Some("error")
        );
        assert_eq!(
            value.get("message").and_then(serde_json::Value::as_str),
            Some("Invalid credential")
        );
        Ok(())
    }
}
