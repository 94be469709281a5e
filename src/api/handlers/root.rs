use axum::response::{IntoResponse, Json};
use serde_json::json;

// Service identity at the root; everything interesting lives under /v1.
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
