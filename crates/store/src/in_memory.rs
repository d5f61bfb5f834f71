//! In-memory store for tests and development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use trove_core::{ItemId, SendingId, UserId};

use crate::error::{StoreError, StoreResult};
use crate::r#trait::{CredentialStore, ItemStore, SendingStore};
use crate::record::{Item, Sending, SendingStatus, User};

/// In-memory implementation of all three store traits.
///
/// Identifiers are monotonic counters starting at 1, mirroring the BIGSERIAL
/// columns of the Postgres backend. Lock order is users, items, sendings for
/// every method that takes more than one lock.
#[derive(Debug)]
pub struct InMemoryStore {
    users: RwLock<HashMap<i64, User>>,
    items: RwLock<HashMap<i64, Item>>,
    sendings: RwLock<HashMap<i64, Sending>>,
    next_user_id: AtomicI64,
    next_item_id: AtomicI64,
    next_sending_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            items: RwLock::new(HashMap::new()),
            sendings: RwLock::new(HashMap::new()),
            next_user_id: AtomicI64::new(1),
            next_item_id: AtomicI64::new(1),
            next_sending_id: AtomicI64::new(1),
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn create_user(&self, login: &str, password: &str) -> StoreResult<User> {
        let mut users = self.users.write().unwrap();
        if users.values().any(|u| u.login == login) {
            return Err(StoreError::Conflict(format!("login already taken: {login}")));
        }
        let id = self.next_user_id.fetch_add(1, Ordering::SeqCst);
        let user = User {
            id: UserId::from_i64(id),
            login: login.to_string(),
            password: password.to_string(),
            token: None,
            token_expires_at: None,
        };
        users.insert(id, user.clone());
        Ok(user)
    }

    async fn is_registered(&self, login: &str) -> StoreResult<bool> {
        let users = self.users.read().unwrap();
        Ok(users.values().any(|u| u.login == login))
    }

    async fn find_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().unwrap();
        Ok(users.values().find(|u| u.login == login).cloned())
    }

    async fn find_by_credentials(
        &self,
        login: &str,
        password: &str,
    ) -> StoreResult<Option<User>> {
        let users = self.users.read().unwrap();
        Ok(users
            .values()
            .find(|u| u.login == login && u.password == password)
            .cloned())
    }

    async fn set_token(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut users = self.users.write().unwrap();
        if let Some(user) = users.get_mut(&user_id.as_i64()) {
            user.token = Some(token.to_string());
            user.token_expires_at = Some(expires_at);
        }
        Ok(())
    }

    async fn find_by_live_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let users = self.users.read().unwrap();
        Ok(users
            .values()
            .find(|u| {
                u.token.as_deref() == Some(token)
                    && u.token_expires_at.map_or(false, |at| now < at)
            })
            .cloned())
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn create_item(&self, owner_id: UserId, name: &str) -> StoreResult<Item> {
        let mut items = self.items.write().unwrap();
        let id = self.next_item_id.fetch_add(1, Ordering::SeqCst);
        let item = Item {
            id: ItemId::from_i64(id),
            owner_id,
            name: name.to_string(),
        };
        items.insert(id, item.clone());
        Ok(item)
    }

    async fn find_named(&self, owner_id: UserId, name: &str) -> StoreResult<Option<Item>> {
        let items = self.items.read().unwrap();
        Ok(items
            .values()
            .find(|i| i.owner_id == owner_id && i.name == name)
            .cloned())
    }

    async fn find_by_id(&self, item_id: ItemId) -> StoreResult<Option<Item>> {
        let items = self.items.read().unwrap();
        Ok(items.get(&item_id.as_i64()).cloned())
    }

    async fn delete_item(&self, item_id: ItemId) -> StoreResult<Option<ItemId>> {
        let mut items = self.items.write().unwrap();
        let mut sendings = self.sendings.write().unwrap();

        if items.remove(&item_id.as_i64()).is_none() {
            return Ok(None);
        }
        sendings.retain(|_, s| s.item_id != item_id);
        Ok(Some(item_id))
    }

    async fn list_items(&self, owner_id: UserId) -> StoreResult<Vec<Item>> {
        let items = self.items.read().unwrap();
        let mut result: Vec<_> = items
            .values()
            .filter(|i| i.owner_id == owner_id)
            .cloned()
            .collect();
        result.sort_by_key(|i| i.id.as_i64());
        Ok(result)
    }
}

#[async_trait]
impl SendingStore for InMemoryStore {
    async fn confirmation_token(
        &self,
        item_id: ItemId,
        from_user_id: UserId,
        to_user_id: UserId,
    ) -> StoreResult<Option<String>> {
        let sendings = self.sendings.read().unwrap();
        Ok(sendings
            .values()
            .find(|s| {
                s.item_id == item_id
                    && s.from_user_id == from_user_id
                    && s.to_user_id == to_user_id
            })
            .map(|s| s.confirmation_token.clone()))
    }

    async fn create_sending(
        &self,
        item_id: ItemId,
        from_user_id: UserId,
        to_user_id: UserId,
        confirmation_token: &str,
    ) -> StoreResult<Sending> {
        let mut sendings = self.sendings.write().unwrap();
        let id = self.next_sending_id.fetch_add(1, Ordering::SeqCst);
        let sending = Sending {
            id: SendingId::from_i64(id),
            item_id,
            from_user_id,
            to_user_id,
            confirmation_token: confirmation_token.to_string(),
        };
        sendings.insert(id, sending.clone());
        Ok(sending)
    }

    async fn complete_sending(
        &self,
        to_user_id: UserId,
        item_id: ItemId,
        confirmation_token: &str,
    ) -> StoreResult<SendingStatus> {
        let mut items = self.items.write().unwrap();
        let mut sendings = self.sendings.write().unwrap();

        let found = sendings
            .values()
            .find(|s| {
                s.to_user_id == to_user_id
                    && s.item_id == item_id
                    && s.confirmation_token == confirmation_token
            })
            .map(|s| (s.id, s.from_user_id));

        let (sending_id, from_user_id) = match found {
            Some(v) => v,
            None => return Ok(SendingStatus::NoSending),
        };

        // The re-home applies only while the sender still owns the item; on
        // any mismatch both rows stay untouched.
        match items.get_mut(&item_id.as_i64()) {
            Some(item) if item.owner_id == from_user_id => {
                item.owner_id = to_user_id;
                sendings.remove(&sending_id.as_i64());
                Ok(SendingStatus::Completed)
            }
            _ => Ok(SendingStatus::Failed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn user(store: &InMemoryStore, login: &str) -> User {
        store.create_user(login, "pw").await.unwrap()
    }

    #[tokio::test]
    async fn duplicate_login_conflicts() {
        let store = InMemoryStore::new();
        user(&store, "alice").await;

        let err = store.create_user("alice", "other").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // The first registration is untouched.
        let found = store.find_by_credentials("alice", "pw").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn credentials_must_match_exactly() {
        let store = InMemoryStore::new();
        user(&store, "alice").await;

        assert!(store.find_by_credentials("alice", "pw").await.unwrap().is_some());
        assert!(store.find_by_credentials("alice", "wrong").await.unwrap().is_none());
        assert!(store.find_by_credentials("bob", "pw").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn live_token_expiry_is_strict() {
        let store = InMemoryStore::new();
        let u = user(&store, "alice").await;
        let now = Utc::now();
        store.set_token(u.id, "tok", now + Duration::seconds(60)).await.unwrap();

        assert!(store.find_by_live_token("tok", now).await.unwrap().is_some());
        // At exactly the stored expiry the token is already dead.
        assert!(store
            .find_by_live_token("tok", now + Duration::seconds(60))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_by_live_token("tok", now + Duration::seconds(61))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn setting_a_token_invalidates_the_previous_one() {
        let store = InMemoryStore::new();
        let u = user(&store, "alice").await;
        let now = Utc::now();
        let expires = now + Duration::seconds(60);

        store.set_token(u.id, "first", expires).await.unwrap();
        store.set_token(u.id, "second", expires).await.unwrap();

        assert!(store.find_by_live_token("first", now).await.unwrap().is_none());
        let found = store.find_by_live_token("second", now).await.unwrap().unwrap();
        assert_eq!(found.id, u.id);
    }

    #[tokio::test]
    async fn list_items_is_ascending_by_id() {
        let store = InMemoryStore::new();
        let u = user(&store, "alice").await;

        let c = store.create_item(u.id, "cello").await.unwrap();
        let a = store.create_item(u.id, "anvil").await.unwrap();
        let b = store.create_item(u.id, "book").await.unwrap();

        let listed = store.list_items(u.id).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![c.id, a.id, b.id]);
        assert!(ids[0].as_i64() < ids[1].as_i64() && ids[1].as_i64() < ids[2].as_i64());
    }

    #[tokio::test]
    async fn listing_excludes_other_owners() {
        let store = InMemoryStore::new();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;

        store.create_item(alice.id, "anvil").await.unwrap();
        store.create_item(bob.id, "book").await.unwrap();

        let listed = store.list_items(alice.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "anvil");
    }

    #[tokio::test]
    async fn delete_item_removes_its_sendings() {
        let store = InMemoryStore::new();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        let item = store.create_item(alice.id, "anvil").await.unwrap();
        store
            .create_sending(item.id, alice.id, bob.id, "offer")
            .await
            .unwrap();

        let deleted = store.delete_item(item.id).await.unwrap();
        assert_eq!(deleted, Some(item.id));
        assert!(store.find_by_id(item.id).await.unwrap().is_none());
        assert!(store
            .confirmation_token(item.id, alice.id, bob.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn delete_missing_item_reports_none() {
        let store = InMemoryStore::new();
        let deleted = store.delete_item(ItemId::from_i64(999)).await.unwrap();
        assert_eq!(deleted, None);
    }

    #[tokio::test]
    async fn complete_unknown_sending_reports_no_sending() {
        let store = InMemoryStore::new();
        let bob = user(&store, "bob").await;

        let status = store
            .complete_sending(bob.id, ItemId::from_i64(1), "nope")
            .await
            .unwrap();
        assert_eq!(status, SendingStatus::NoSending);
    }

    #[tokio::test]
    async fn complete_moves_ownership_and_consumes_the_offer() {
        let store = InMemoryStore::new();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        let item = store.create_item(alice.id, "anvil").await.unwrap();
        store
            .create_sending(item.id, alice.id, bob.id, "offer")
            .await
            .unwrap();

        let status = store.complete_sending(bob.id, item.id, "offer").await.unwrap();
        assert_eq!(status, SendingStatus::Completed);

        let moved = store.find_by_id(item.id).await.unwrap().unwrap();
        assert_eq!(moved.owner_id, bob.id);

        // The offer is consumed; a second confirmation finds nothing.
        let again = store.complete_sending(bob.id, item.id, "offer").await.unwrap();
        assert_eq!(again, SendingStatus::NoSending);
    }

    #[tokio::test]
    async fn complete_with_stale_owner_fails_without_changes() {
        let store = InMemoryStore::new();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        let carol = user(&store, "carol").await;
        let item = store.create_item(alice.id, "anvil").await.unwrap();

        // Two offers for the same item; the first one completes.
        store
            .create_sending(item.id, alice.id, bob.id, "offer-bob")
            .await
            .unwrap();
        store
            .create_sending(item.id, alice.id, carol.id, "offer-carol")
            .await
            .unwrap();
        let status = store
            .complete_sending(bob.id, item.id, "offer-bob")
            .await
            .unwrap();
        assert_eq!(status, SendingStatus::Completed);

        // The stale offer still matches, but alice no longer owns the item.
        let status = store
            .complete_sending(carol.id, item.id, "offer-carol")
            .await
            .unwrap();
        assert_eq!(status, SendingStatus::Failed);

        // Nothing changed: bob keeps the item and the stale offer survives.
        let owner = store.find_by_id(item.id).await.unwrap().unwrap().owner_id;
        assert_eq!(owner, bob.id);
        assert!(store
            .confirmation_token(item.id, alice.id, carol.id)
            .await
            .unwrap()
            .is_some());
    }
}
