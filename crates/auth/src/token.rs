//! Random token minting.

use base64::Engine;
use rand::Rng;

/// Random bytes behind a confirmation token.
pub const CONFIRMATION_TOKEN_BYTES: usize = 16;

/// Mint an opaque token from `n_bytes` of randomness.
///
/// URL-safe unpadded base64, so tokens can travel in query strings and path
/// segments untouched. 32 bytes encode to 43 characters.
pub fn mint_access_token(n_bytes: usize) -> String {
    let mut bytes = vec![0u8; n_bytes];
    rand::thread_rng().fill(&mut bytes[..]);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Mint a confirmation token for a transfer offer (16 random bytes, 22
/// characters).
pub fn mint_confirmation_token() -> String {
    mint_access_token(CONFIRMATION_TOKEN_BYTES)
}
