use axum::{
    routing::{delete, get, post},
    Router,
};

pub mod items;
pub mod system;
pub mod users;

/// Router for the account and item endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/registration", post(users::register_user))
        .route("/login", post(users::login_user))
        .route("/items/new", post(items::create_item))
        .route("/items/:id", delete(items::delete_item))
        .route("/items", get(items::list_items))
        .route("/send", post(items::send_item))
        .route("/get/:confirmation_url", get(items::receive_item))
}
