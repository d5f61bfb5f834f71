//! Two-party item transfer protocol.
//!
//! A transfer is a handshake: the sender opens an offer (a persisted
//! "sending" carrying a confirmation token), then the recipient presents the
//! token to take ownership. This crate orchestrates that handshake over the
//! sending store; it performs no HTTP and no direct SQL.

pub mod service;

pub use service::TransferService;
