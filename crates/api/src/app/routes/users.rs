use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use trove_store::StoreError;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn register_user(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::RegisterUserRequest>,
) -> axum::response::Response {
    let taken = match services.users().is_registered(&body.login).await {
        Ok(taken) => taken,
        Err(e) => return errors::store_error_to_response(e),
    };
    if taken {
        return errors::json_error(StatusCode::CONFLICT, "conflict", "User already exists");
    }

    match services.users().create_user(&body.login, &body.password).await {
        Ok(_) => (
            StatusCode::CREATED,
            Json(json!({ "message": "User successfully registered" })),
        )
            .into_response(),
        // A concurrent registration can slip past the pre-check; the store's
        // login uniqueness still holds.
        Err(StoreError::Conflict(_)) => {
            errors::json_error(StatusCode::CONFLICT, "conflict", "User already exists")
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn login_user(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::AuthorizeUserRequest>,
) -> axum::response::Response {
    match services.auth().authorize(&body.login, &body.password).await {
        Ok(Some(token)) => (StatusCode::CREATED, Json(json!({ "token": token }))).into_response(),
        Ok(None) => errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "No such user"),
        Err(e) => errors::store_error_to_response(e),
    }
}
