//! Persistence boundary for users, items and sendings.
//!
//! This crate defines the three store traits the services operate on, plus two
//! interchangeable backends: a Postgres implementation (sqlx) and an in-memory
//! implementation for tests and development.

pub mod error;
pub mod in_memory;
pub mod postgres;
pub mod record;
pub mod r#trait;

pub use error::{StoreError, StoreResult};
pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use record::{Item, Sending, SendingStatus, User};
pub use r#trait::{CredentialStore, ItemStore, SendingStore};
