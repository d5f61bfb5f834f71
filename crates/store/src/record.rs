//! Persisted record types.

use chrono::{DateTime, Utc};

use trove_core::{ItemId, SendingId, UserId};

/// A registered user.
///
/// `token` and `token_expires_at` hold the single active access token;
/// issuing a new token replaces both unconditionally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub login: String,
    pub password: String,
    pub token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

/// An item owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub owner_id: UserId,
    pub name: String,
}

/// An in-flight transfer offer.
///
/// Created when a sender offers an item to a recipient and deleted when the
/// recipient confirms. The confirmation token is the capability the recipient
/// must present to complete the transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sending {
    pub id: SendingId,
    pub item_id: ItemId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub confirmation_token: String,
}

/// Outcome of confirming a sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendingStatus {
    /// No sending matched (recipient, item, token).
    NoSending,
    /// Ownership moved and the sending was consumed.
    Completed,
    /// A sending matched but the transfer could not be applied; nothing was
    /// changed.
    Failed,
}
