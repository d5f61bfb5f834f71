use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use trove_store::SendingStatus;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateItemRequest>,
) -> axum::response::Response {
    let user = match errors::require_user(&services, &body.token).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match services.items().find_named(user.id, &body.name).await {
        Ok(Some(_)) => {
            return errors::json_error(StatusCode::CONFLICT, "conflict", "Item already exists")
        }
        Ok(None) => {}
        Err(e) => return errors::store_error_to_response(e),
    }

    match services.items().create_item(user.id, &body.name).await {
        Ok(item) => (
            StatusCode::CREATED,
            Json(json!({
                "id": item.id,
                "name": item.name,
                "message": "Item created",
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

// The route carries the id as a path segment, but the body id is the one the
// delete acts on.
pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::DeleteItemRequest>,
) -> axum::response::Response {
    if let Err(resp) = errors::require_user(&services, &body.token).await {
        return resp;
    }

    match services.items().delete_item(body.id).await {
        Ok(Some(_)) => (
            StatusCode::OK,
            Json(json!({ "message": "Item successfully deleted" })),
        )
            .into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::TokenQuery>,
) -> axum::response::Response {
    let user = match errors::require_user(&services, &query.token).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match services.items().list_items(user.id).await {
        Ok(items) => {
            Json(items.into_iter().map(dto::item_to_json).collect::<Vec<_>>()).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn send_item(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::SendItemRequest>,
) -> axum::response::Response {
    let sender = match errors::require_user(&services, &body.token).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    if sender.login == body.recipient {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "Can't send item to yourself",
        );
    }

    // Existence only; whether the sender still owns the item is settled at
    // confirmation time.
    let item = match services.items().find_by_id(body.id).await {
        Ok(Some(item)) => item,
        Ok(None) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "No such item"),
        Err(e) => return errors::store_error_to_response(e),
    };

    let recipient = match services.users().find_by_login(&body.recipient).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "No such recipient")
        }
        Err(e) => return errors::store_error_to_response(e),
    };

    match services
        .transfer()
        .initiate(sender.id, recipient.id, item.id)
        .await
    {
        Ok(confirmation_url) => (
            StatusCode::CREATED,
            Json(json!({ "confirmation_url": confirmation_url })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn receive_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(confirmation_url): Path<String>,
    Query(query): Query<dto::ReceiveItemQuery>,
) -> axum::response::Response {
    let user = match errors::require_user(&services, &query.token).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let item = match services.items().find_by_id(query.id).await {
        Ok(Some(item)) => item,
        Ok(None) => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "No such item"),
        Err(e) => return errors::store_error_to_response(e),
    };

    match services
        .transfer()
        .complete(user.id, item.id, &confirmation_url)
        .await
    {
        Ok(SendingStatus::Completed) => {
            Json(json!({ "message": "Item successfully received" })).into_response()
        }
        Ok(SendingStatus::NoSending) => {
            errors::json_error(StatusCode::NOT_FOUND, "not_found", "No such sending")
        }
        Ok(SendingStatus::Failed) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "transfer_failed",
            "Something went wrong while receiving an item",
        ),
        Err(e) => errors::store_error_to_response(e),
    }
}
