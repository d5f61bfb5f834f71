use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use trove_store::{StoreError, User};

use crate::app::services::AppServices;

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Storage(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Resolve the calling user from an access token, or produce the 401 all
/// token-guarded endpoints share.
pub async fn require_user(
    services: &AppServices,
    token: &str,
) -> Result<User, axum::response::Response> {
    match services.auth().get_authorized(token).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Provided token is unauthorized",
        )),
        Err(err) => Err(store_error_to_response(err)),
    }
}
