use serde::Deserialize;

use trove_core::ItemId;
use trove_store::Item;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeUserRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteItemRequest {
    pub id: ItemId,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SendItemRequest {
    pub id: ItemId,
    pub token: String,
    pub recipient: String,
}

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveItemQuery {
    pub id: ItemId,
    pub token: String,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn item_to_json(item: Item) -> serde_json::Value {
    serde_json::json!({
        "id": item.id,
        "name": item.name,
    })
}
