use std::sync::Arc;

use trove_auth::{AuthService, TokenPolicy};
use trove_store::{CredentialStore, InMemoryStore, ItemStore, PostgresStore, SendingStore};
use trove_transfer::TransferService;

/// Shared service handles, injected into every handler as an `Extension`.
///
/// `users` and `items` are the raw store views; token minting and the
/// transfer handshake go through the `auth` and `transfer` services.
#[derive(Clone)]
pub struct AppServices {
    auth: AuthService,
    users: Arc<dyn CredentialStore>,
    items: Arc<dyn ItemStore>,
    transfer: TransferService,
}

impl AppServices {
    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn users(&self) -> &Arc<dyn CredentialStore> {
        &self.users
    }

    pub fn items(&self) -> &Arc<dyn ItemStore> {
        &self.items
    }

    pub fn transfer(&self) -> &TransferService {
        &self.transfer
    }
}

pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        return build_persistent_services().await;
    }

    build_in_memory_services()
}

fn build_in_memory_services() -> AppServices {
    let store = InMemoryStore::arc();
    assemble(store.clone(), store.clone(), store)
}

async fn build_persistent_services() -> AppServices {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let store = Arc::new(
        PostgresStore::connect(&database_url)
            .await
            .expect("Failed to connect to Postgres"),
    );

    assemble(store.clone(), store.clone(), store)
}

fn assemble(
    users: Arc<dyn CredentialStore>,
    items: Arc<dyn ItemStore>,
    sendings: Arc<dyn SendingStore>,
) -> AppServices {
    AppServices {
        auth: AuthService::new(users.clone(), token_policy_from_env()),
        users,
        items,
        transfer: TransferService::new(sendings),
    }
}

fn token_policy_from_env() -> TokenPolicy {
    let mut policy = TokenPolicy::default();

    if let Ok(raw) = std::env::var("TOKEN_TTL_SECS") {
        match raw.parse::<i64>() {
            Ok(secs) if secs >= 0 => policy.ttl = chrono::Duration::seconds(secs),
            _ => tracing::warn!("ignoring invalid TOKEN_TTL_SECS: {raw}"),
        }
    }

    if let Ok(raw) = std::env::var("TOKEN_BYTES_LENGTH") {
        match raw.parse::<usize>() {
            Ok(bytes) if bytes > 0 => policy.token_bytes = bytes,
            _ => tracing::warn!("ignoring invalid TOKEN_BYTES_LENGTH: {raw}"),
        }
    }

    policy
}
