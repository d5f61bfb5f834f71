//! Token issuance and validation.
//!
//! No HTTP types in here; the crate talks to the credential store boundary
//! only.

pub mod policy;
pub mod service;
pub mod token;

pub use policy::TokenPolicy;
pub use service::AuthService;
pub use token::{mint_access_token, mint_confirmation_token};
