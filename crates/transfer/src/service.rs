//! Offer/confirm orchestration over the sending store.

use std::sync::Arc;

use tracing::instrument;

use trove_auth::mint_confirmation_token;
use trove_core::{ItemId, UserId};
use trove_store::{SendingStatus, SendingStore, StoreResult};

/// Orchestrates the two-party transfer handshake.
///
/// Per (item, sender, recipient) the transfer moves NONE -> PENDING on
/// `initiate` and out of PENDING on `complete`. PENDING is the only persisted
/// state; the terminal outcomes exist solely as status codes.
#[derive(Clone)]
pub struct TransferService {
    sendings: Arc<dyn SendingStore>,
}

impl TransferService {
    pub fn new(sendings: Arc<dyn SendingStore>) -> Self {
        Self { sendings }
    }

    /// Open (or re-read) an offer of `item_id` from `from_user_id` to
    /// `to_user_id` and return its confirmation token.
    ///
    /// Calling this again for the same triple returns the already-minted
    /// token instead of stacking offers. Whether the sender still owns the
    /// item is not checked here; a stale offer surfaces as `Failed` at
    /// confirmation time.
    #[instrument(skip(self), err)]
    pub async fn initiate(
        &self,
        from_user_id: UserId,
        to_user_id: UserId,
        item_id: ItemId,
    ) -> StoreResult<String> {
        if let Some(token) = self
            .sendings
            .confirmation_token(item_id, from_user_id, to_user_id)
            .await?
        {
            return Ok(token);
        }

        let token = mint_confirmation_token();
        let sending = self
            .sendings
            .create_sending(item_id, from_user_id, to_user_id, &token)
            .await?;
        tracing::debug!(sending_id = sending.id.as_i64(), "transfer offer opened");
        Ok(token)
    }

    /// Confirm an offer addressed to `to_user_id`.
    #[instrument(skip(self, confirmation_token), err)]
    pub async fn complete(
        &self,
        to_user_id: UserId,
        item_id: ItemId,
        confirmation_token: &str,
    ) -> StoreResult<SendingStatus> {
        let status = self
            .sendings
            .complete_sending(to_user_id, item_id, confirmation_token)
            .await?;
        tracing::debug!(?status, "transfer confirmation evaluated");
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trove_store::{InMemoryStore, ItemStore};

    #[tokio::test]
    async fn initiate_is_idempotent_per_triple() {
        let store = InMemoryStore::arc();
        let service = TransferService::new(store.clone());
        let alice = UserId::from_i64(1);
        let bob = UserId::from_i64(2);
        let item = store.create_item(alice, "anvil").await.unwrap();

        let token = service.initiate(alice, bob, item.id).await.unwrap();
        assert_eq!(token.len(), 22);

        let again = service.initiate(alice, bob, item.id).await.unwrap();
        assert_eq!(token, again);
    }

    #[tokio::test]
    async fn distinct_recipients_get_distinct_offers() {
        let store = InMemoryStore::arc();
        let service = TransferService::new(store.clone());
        let alice = UserId::from_i64(1);
        let item = store.create_item(alice, "anvil").await.unwrap();

        let for_bob = service
            .initiate(alice, UserId::from_i64(2), item.id)
            .await
            .unwrap();
        let for_carol = service
            .initiate(alice, UserId::from_i64(3), item.id)
            .await
            .unwrap();
        assert_ne!(for_bob, for_carol);
    }

    #[tokio::test]
    async fn handshake_moves_ownership_exactly_once() {
        let store = InMemoryStore::arc();
        let service = TransferService::new(store.clone());
        let alice = UserId::from_i64(1);
        let bob = UserId::from_i64(2);
        let item = store.create_item(alice, "anvil").await.unwrap();

        let token = service.initiate(alice, bob, item.id).await.unwrap();

        let status = service.complete(bob, item.id, &token).await.unwrap();
        assert_eq!(status, SendingStatus::Completed);
        assert_eq!(store.find_by_id(item.id).await.unwrap().unwrap().owner_id, bob);

        // The offer was consumed; confirming again finds nothing.
        let status = service.complete(bob, item.id, &token).await.unwrap();
        assert_eq!(status, SendingStatus::NoSending);
    }

    #[tokio::test]
    async fn wrong_token_finds_no_sending() {
        let store = InMemoryStore::arc();
        let service = TransferService::new(store.clone());
        let alice = UserId::from_i64(1);
        let bob = UserId::from_i64(2);
        let item = store.create_item(alice, "anvil").await.unwrap();
        service.initiate(alice, bob, item.id).await.unwrap();

        let status = service.complete(bob, item.id, "bogus").await.unwrap();
        assert_eq!(status, SendingStatus::NoSending);
    }

    #[tokio::test]
    async fn stale_offer_fails_after_the_item_moved() {
        let store = InMemoryStore::arc();
        let service = TransferService::new(store.clone());
        let alice = UserId::from_i64(1);
        let bob = UserId::from_i64(2);
        let carol = UserId::from_i64(3);
        let item = store.create_item(alice, "anvil").await.unwrap();

        let for_bob = service.initiate(alice, bob, item.id).await.unwrap();
        let for_carol = service.initiate(alice, carol, item.id).await.unwrap();

        let status = service.complete(bob, item.id, &for_bob).await.unwrap();
        assert_eq!(status, SendingStatus::Completed);

        // Alice no longer owns the item, so the second offer cannot apply.
        let status = service.complete(carol, item.id, &for_carol).await.unwrap();
        assert_eq!(status, SendingStatus::Failed);
        assert_eq!(store.find_by_id(item.id).await.unwrap().unwrap().owner_id, bob);
    }
}
