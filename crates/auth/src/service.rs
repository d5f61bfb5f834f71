//! Token-based authentication service.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use trove_store::{CredentialStore, StoreResult, User};

use crate::policy::TokenPolicy;
use crate::token::mint_access_token;

/// Issues and validates access tokens against the credential store.
///
/// A user holds at most one live token. `authorize` always mints a fresh
/// token and overwrites whatever was stored, so an older token stops working
/// before its expiry once the user logs in again.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    policy: TokenPolicy,
}

impl AuthService {
    pub fn new(users: Arc<dyn CredentialStore>, policy: TokenPolicy) -> Self {
        Self { users, policy }
    }

    /// Exchange credentials for a fresh access token.
    ///
    /// Returns `None` when no user matches the (login, password) pair; the
    /// caller maps that to an authorization failure.
    #[instrument(skip(self, password), err)]
    pub async fn authorize(&self, login: &str, password: &str) -> StoreResult<Option<String>> {
        let user = match self.users.find_by_credentials(login, password).await? {
            Some(user) => user,
            None => return Ok(None),
        };

        let token = mint_access_token(self.policy.token_bytes);
        let expires_at = self.policy.expiry_from(Utc::now());
        self.users.set_token(user.id, &token, expires_at).await?;

        tracing::debug!(user_id = user.id.as_i64(), "access token rotated");
        Ok(Some(token))
    }

    /// Resolve a bearer token to its user.
    ///
    /// Unknown and expired tokens both resolve to `None`; there is no
    /// refresh on read.
    #[instrument(skip(self, token), err)]
    pub async fn get_authorized(&self, token: &str) -> StoreResult<Option<User>> {
        self.users.find_by_live_token(token, Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use trove_store::InMemoryStore;

    fn service(store: Arc<InMemoryStore>) -> AuthService {
        AuthService::new(store, TokenPolicy::default())
    }

    #[tokio::test]
    async fn authorize_mints_a_resolvable_token() {
        let store = InMemoryStore::arc();
        store.create_user("alice", "pw").await.unwrap();
        let auth = service(store);

        let token = auth.authorize("alice", "pw").await.unwrap().unwrap();
        assert_eq!(token.len(), 43);

        let user = auth.get_authorized(&token).await.unwrap().unwrap();
        assert_eq!(user.login, "alice");
    }

    #[tokio::test]
    async fn authorize_rejects_bad_credentials() {
        let store = InMemoryStore::arc();
        store.create_user("alice", "pw").await.unwrap();
        let auth = service(store);

        assert!(auth.authorize("alice", "wrong").await.unwrap().is_none());
        assert!(auth.authorize("nobody", "pw").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn re_authorize_invalidates_the_previous_token() {
        let store = InMemoryStore::arc();
        store.create_user("alice", "pw").await.unwrap();
        let auth = service(store);

        let first = auth.authorize("alice", "pw").await.unwrap().unwrap();
        let second = auth.authorize("alice", "pw").await.unwrap().unwrap();
        assert_ne!(first, second);

        assert!(auth.get_authorized(&first).await.unwrap().is_none());
        assert!(auth.get_authorized(&second).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn zero_ttl_tokens_are_dead_on_arrival() {
        let store = InMemoryStore::arc();
        store.create_user("alice", "pw").await.unwrap();
        let auth = AuthService::new(
            store,
            TokenPolicy {
                ttl: Duration::seconds(0),
                ..TokenPolicy::default()
            },
        );

        let token = auth.authorize("alice", "pw").await.unwrap().unwrap();
        assert!(auth.get_authorized(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_token_resolves_to_none() {
        let auth = service(InMemoryStore::arc());
        assert!(auth.get_authorized("no-such-token").await.unwrap().is_none());
    }
}
