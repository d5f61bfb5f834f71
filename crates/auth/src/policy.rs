//! Token issuance policy.

use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_TOKEN_BYTES: usize = 32;
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 86_400;

/// Access token issuance parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    /// Random bytes per minted token.
    pub token_bytes: usize,

    /// How long a freshly minted token stays live.
    pub ttl: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            token_bytes: DEFAULT_TOKEN_BYTES,
            ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        }
    }
}

impl TokenPolicy {
    /// Expiry of a token minted at `now`.
    pub fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_one_day() {
        let policy = TokenPolicy::default();
        assert_eq!(policy.token_bytes, 32);
        assert_eq!(policy.ttl, Duration::seconds(86_400));

        let now = Utc::now();
        assert_eq!(policy.expiry_from(now), now + Duration::seconds(86_400));
    }
}
