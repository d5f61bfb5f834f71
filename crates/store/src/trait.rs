//! Store trait boundary.
//!
//! The services operate on these traits only and never see the backing
//! storage. Both backends assign identifiers on insert; callers never supply
//! ids for new rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use trove_core::{ItemId, UserId};

use crate::error::StoreResult;
use crate::record::{Item, Sending, SendingStatus, User};

/// User credential and token persistence.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new user. Fails with `StoreError::Conflict` when the login is
    /// already taken.
    async fn create_user(&self, login: &str, password: &str) -> StoreResult<User>;

    /// Whether a user with this login exists.
    async fn is_registered(&self, login: &str) -> StoreResult<bool>;

    /// Look up a user by login.
    async fn find_by_login(&self, login: &str) -> StoreResult<Option<User>>;

    /// Look up a user by exact (login, password) match.
    async fn find_by_credentials(&self, login: &str, password: &str)
        -> StoreResult<Option<User>>;

    /// Replace the user's access token and its expiry. Any previously issued
    /// token stops matching immediately.
    async fn set_token(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Look up the user holding `token`, provided the token is still live at
    /// `now`. A token whose expiry equals `now` is already dead.
    async fn find_by_live_token(&self, token: &str, now: DateTime<Utc>)
        -> StoreResult<Option<User>>;
}

/// Item persistence.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert a new item owned by `owner_id`.
    async fn create_item(&self, owner_id: UserId, name: &str) -> StoreResult<Item>;

    /// Look up an item of `owner_id` by name.
    async fn find_named(&self, owner_id: UserId, name: &str) -> StoreResult<Option<Item>>;

    /// Look up an item by id.
    async fn find_by_id(&self, item_id: ItemId) -> StoreResult<Option<Item>>;

    /// Delete an item together with any sendings that reference it, in one
    /// atomic scope.
    ///
    /// Returns the deleted id, or `None` when no such item exists.
    async fn delete_item(&self, item_id: ItemId) -> StoreResult<Option<ItemId>>;

    /// All items of `owner_id`, ascending by id.
    async fn list_items(&self, owner_id: UserId) -> StoreResult<Vec<Item>>;
}

/// Sending (transfer offer) persistence.
#[async_trait]
pub trait SendingStore: Send + Sync {
    /// The confirmation token of a pending offer for (item, sender,
    /// recipient), if any.
    async fn confirmation_token(
        &self,
        item_id: ItemId,
        from_user_id: UserId,
        to_user_id: UserId,
    ) -> StoreResult<Option<String>>;

    /// Record a new offer.
    async fn create_sending(
        &self,
        item_id: ItemId,
        from_user_id: UserId,
        to_user_id: UserId,
        confirmation_token: &str,
    ) -> StoreResult<Sending>;

    /// Confirm an offer in a single atomic scope:
    ///
    /// 1. find the sending by (recipient, item, token); absent means
    ///    `NoSending`;
    /// 2. re-home the item, conditional on the sender still owning it;
    /// 3. consume the sending;
    /// 4. both applied means `Completed`, anything else rolls back to
    ///    `Failed` with no observable change.
    async fn complete_sending(
        &self,
        to_user_id: UserId,
        item_id: ItemId,
        confirmation_token: &str,
    ) -> StoreResult<SendingStatus>;
}
