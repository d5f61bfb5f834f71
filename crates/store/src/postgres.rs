//! Postgres-backed store implementation.
//!
//! A single `PostgresStore` implements all three store traits over one
//! connection pool. The schema is applied on connect with idempotent
//! statements, so a fresh database is usable without any external migration
//! step.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Login (or token) already present |
//! | Database (other) | Any other | `Storage` | Constraint or query failures |
//! | PoolClosed | N/A | `Storage` | Connection pool was closed |
//! | Other | N/A | `Storage` | Network errors, connection failures, etc. |
//!
//! ## Thread Safety
//!
//! `PostgresStore` is `Send + Sync`; clones share the underlying pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use trove_core::{ItemId, SendingId, UserId};

use crate::error::{StoreError, StoreResult};
use crate::r#trait::{CredentialStore, ItemStore, SendingStore};
use crate::record::{Item, Sending, SendingStatus, User};

/// Schema statements applied on connect, one statement each.
///
/// `items` deliberately carries no unique constraint on (owner_id, name) and
/// `sendings` none on (item_id, from_user_id, to_user_id); duplicate
/// prevention for those is check-then-insert in the callers.
const SCHEMA_SQL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGSERIAL PRIMARY KEY,
        login TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        token TEXT UNIQUE,
        token_expires_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id BIGSERIAL PRIMARY KEY,
        owner_id BIGINT NOT NULL REFERENCES users(id),
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sendings (
        id BIGSERIAL PRIMARY KEY,
        item_id BIGINT NOT NULL REFERENCES items(id),
        from_user_id BIGINT NOT NULL REFERENCES users(id),
        to_user_id BIGINT NOT NULL REFERENCES users(id),
        confirmation_token TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_items_owner ON items(owner_id)",
    "CREATE INDEX IF NOT EXISTS idx_sendings_item ON sendings(item_id)",
    "CREATE INDEX IF NOT EXISTS idx_sendings_recipient ON sendings(to_user_id)",
];

/// Postgres-backed implementation of all three store traits.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wrap an existing pool. Does not touch the schema.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and apply the schema.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Storage(format!("connect: {e}")))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA_SQL {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PostgresStore {
    #[instrument(skip(self, password), err)]
    async fn create_user(&self, login: &str, password: &str) -> StoreResult<User> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (login, password) VALUES ($1, $2) RETURNING id",
        )
        .bind(login)
        .bind(password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;

        Ok(User {
            id: UserId::from_i64(id),
            login: login.to_string(),
            password: password.to_string(),
            token: None,
            token_expires_at: None,
        })
    }

    #[instrument(skip(self), err)]
    async fn is_registered(&self, login: &str) -> StoreResult<bool> {
        let present: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE login = $1)")
                .bind(login)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("is_registered", e))?;
        Ok(present)
    }

    #[instrument(skip(self), err)]
    async fn find_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, login, password, token, token_expires_at FROM users WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_login", e))?;

        if let Some(row) = row {
            let user = UserRow::from_row(&row)
                .map_err(|e| StoreError::Storage(format!("malformed user row: {e}")))?;
            Ok(Some(user.into()))
        } else {
            Ok(None)
        }
    }

    #[instrument(skip(self, password), err)]
    async fn find_by_credentials(
        &self,
        login: &str,
        password: &str,
    ) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, login, password, token, token_expires_at
            FROM users
            WHERE login = $1 AND password = $2
            "#,
        )
        .bind(login)
        .bind(password)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_credentials", e))?;

        if let Some(row) = row {
            let user = UserRow::from_row(&row)
                .map_err(|e| StoreError::Storage(format!("malformed user row: {e}")))?;
            Ok(Some(user.into()))
        } else {
            Ok(None)
        }
    }

    #[instrument(skip(self, token), err)]
    async fn set_token(
        &self,
        user_id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE users SET token = $2, token_expires_at = $3 WHERE id = $1")
            .bind(user_id.as_i64())
            .bind(token)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_token", e))?;
        Ok(())
    }

    #[instrument(skip(self, token), err)]
    async fn find_by_live_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, login, password, token, token_expires_at
            FROM users
            WHERE token = $1 AND token_expires_at > $2
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_live_token", e))?;

        if let Some(row) = row {
            let user = UserRow::from_row(&row)
                .map_err(|e| StoreError::Storage(format!("malformed user row: {e}")))?;
            Ok(Some(user.into()))
        } else {
            Ok(None)
        }
    }
}

#[async_trait]
impl ItemStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn create_item(&self, owner_id: UserId, name: &str) -> StoreResult<Item> {
        let id: i64 =
            sqlx::query_scalar("INSERT INTO items (owner_id, name) VALUES ($1, $2) RETURNING id")
                .bind(owner_id.as_i64())
                .bind(name)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("create_item", e))?;

        Ok(Item {
            id: ItemId::from_i64(id),
            owner_id,
            name: name.to_string(),
        })
    }

    #[instrument(skip(self), err)]
    async fn find_named(&self, owner_id: UserId, name: &str) -> StoreResult<Option<Item>> {
        let row = sqlx::query(
            "SELECT id, owner_id, name FROM items WHERE owner_id = $1 AND name = $2 LIMIT 1",
        )
        .bind(owner_id.as_i64())
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_named", e))?;

        if let Some(row) = row {
            let item = ItemRow::from_row(&row)
                .map_err(|e| StoreError::Storage(format!("malformed item row: {e}")))?;
            Ok(Some(item.into()))
        } else {
            Ok(None)
        }
    }

    #[instrument(skip(self), err)]
    async fn find_by_id(&self, item_id: ItemId) -> StoreResult<Option<Item>> {
        let row = sqlx::query("SELECT id, owner_id, name FROM items WHERE id = $1")
            .bind(item_id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_id", e))?;

        if let Some(row) = row {
            let item = ItemRow::from_row(&row)
                .map_err(|e| StoreError::Storage(format!("malformed item row: {e}")))?;
            Ok(Some(item.into()))
        } else {
            Ok(None)
        }
    }

    /// Deletes the item together with any sendings that still reference it.
    /// Both deletes run in one transaction so no dangling offer survives.
    #[instrument(skip(self), err)]
    async fn delete_item(&self, item_id: ItemId) -> StoreResult<Option<ItemId>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let present: Option<i64> = sqlx::query_scalar("SELECT id FROM items WHERE id = $1")
            .bind(item_id.as_i64())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("find_item", e))?;

        if present.is_none() {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(None);
        }

        sqlx::query("DELETE FROM sendings WHERE item_id = $1")
            .bind(item_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_item_sendings", e))?;

        sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(item_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(Some(item_id))
    }

    #[instrument(skip(self), err)]
    async fn list_items(&self, owner_id: UserId) -> StoreResult<Vec<Item>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, name FROM items WHERE owner_id = $1 ORDER BY id ASC",
        )
        .bind(owner_id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_items", e))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let item = ItemRow::from_row(&row)
                .map_err(|e| StoreError::Storage(format!("malformed item row: {e}")))?;
            items.push(item.into());
        }
        Ok(items)
    }
}

#[async_trait]
impl SendingStore for PostgresStore {
    #[instrument(skip(self), err)]
    async fn confirmation_token(
        &self,
        item_id: ItemId,
        from_user_id: UserId,
        to_user_id: UserId,
    ) -> StoreResult<Option<String>> {
        let token: Option<String> = sqlx::query_scalar(
            r#"
            SELECT confirmation_token
            FROM sendings
            WHERE item_id = $1 AND from_user_id = $2 AND to_user_id = $3
            LIMIT 1
            "#,
        )
        .bind(item_id.as_i64())
        .bind(from_user_id.as_i64())
        .bind(to_user_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("confirmation_token", e))?;
        Ok(token)
    }

    #[instrument(skip(self, confirmation_token), err)]
    async fn create_sending(
        &self,
        item_id: ItemId,
        from_user_id: UserId,
        to_user_id: UserId,
        confirmation_token: &str,
    ) -> StoreResult<Sending> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sendings (item_id, from_user_id, to_user_id, confirmation_token)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(item_id.as_i64())
        .bind(from_user_id.as_i64())
        .bind(to_user_id.as_i64())
        .bind(confirmation_token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_sending", e))?;

        Ok(Sending {
            id: SendingId::from_i64(id),
            item_id,
            from_user_id,
            to_user_id,
            confirmation_token: confirmation_token.to_string(),
        })
    }

    /// Confirms a sending inside one transaction:
    ///
    /// 1. fetch the sending by (recipient, item, token);
    /// 2. conditionally re-home the item (`WHERE owner_id = sender`);
    /// 3. delete the sending row;
    /// 4. commit only when both statements affected exactly one row.
    ///
    /// The conditional update means at most one of two racing confirmations
    /// can observe both expected row counts; the loser rolls back.
    #[instrument(skip(self, confirmation_token), err)]
    async fn complete_sending(
        &self,
        to_user_id: UserId,
        item_id: ItemId,
        confirmation_token: &str,
    ) -> StoreResult<SendingStatus> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let row = sqlx::query(
            r#"
            SELECT id, item_id, from_user_id, to_user_id, confirmation_token
            FROM sendings
            WHERE to_user_id = $1 AND item_id = $2 AND confirmation_token = $3
            LIMIT 1
            "#,
        )
        .bind(to_user_id.as_i64())
        .bind(item_id.as_i64())
        .bind(confirmation_token)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("find_sending", e))?;

        let sending: Sending = match row {
            Some(row) => SendingRow::from_row(&row)
                .map_err(|e| StoreError::Storage(format!("malformed sending row: {e}")))?
                .into(),
            None => {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Ok(SendingStatus::NoSending);
            }
        };

        let rehomed = sqlx::query("UPDATE items SET owner_id = $1 WHERE id = $2 AND owner_id = $3")
            .bind(to_user_id.as_i64())
            .bind(item_id.as_i64())
            .bind(sending.from_user_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("transfer_item", e))?
            .rows_affected();

        let consumed = sqlx::query("DELETE FROM sendings WHERE id = $1")
            .bind(sending.id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("consume_sending", e))?
            .rows_affected();

        if rehomed == 1 && consumed == 1 {
            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("commit_transaction", e))?;
            Ok(SendingStatus::Completed)
        } else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            Ok(SendingStatus::Failed)
        }
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            if let Some(code) = db_err.code() {
                if code.as_ref() == "23505" {
                    return StoreError::Conflict(msg);
                }
            }
            StoreError::Storage(msg)
        }
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {operation}"))
        }
        _ => StoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}

// SQLx row types

#[derive(Debug)]
struct UserRow {
    id: i64,
    login: String,
    password: String,
    token: Option<String>,
    token_expires_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for UserRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            login: row.try_get("login")?,
            password: row.try_get("password")?,
            token: row.try_get("token")?,
            token_expires_at: row.try_get("token_expires_at")?,
        })
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId::from_i64(row.id),
            login: row.login,
            password: row.password,
            token: row.token,
            token_expires_at: row.token_expires_at,
        }
    }
}

#[derive(Debug)]
struct ItemRow {
    id: i64,
    owner_id: i64,
    name: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ItemRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            name: row.try_get("name")?,
        })
    }
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: ItemId::from_i64(row.id),
            owner_id: UserId::from_i64(row.owner_id),
            name: row.name,
        }
    }
}

#[derive(Debug)]
struct SendingRow {
    id: i64,
    item_id: i64,
    from_user_id: i64,
    to_user_id: i64,
    confirmation_token: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for SendingRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(SendingRow {
            id: row.try_get("id")?,
            item_id: row.try_get("item_id")?,
            from_user_id: row.try_get("from_user_id")?,
            to_user_id: row.try_get("to_user_id")?,
            confirmation_token: row.try_get("confirmation_token")?,
        })
    }
}

impl From<SendingRow> for Sending {
    fn from(row: SendingRow) -> Self {
        Sending {
            id: SendingId::from_i64(row.id),
            item_id: ItemId::from_i64(row.item_id),
            from_user_id: UserId::from_i64(row.from_user_id),
            to_user_id: UserId::from_i64(row.to_user_id),
            confirmation_token: row.confirmation_token,
        }
    }
}
