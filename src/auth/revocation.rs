/// In-memory registry of revoked access tokens.
///
/// Each entry lives only until the revoked token would have expired on its
/// own; after that the signature check rejects the token anyway. Stale
/// entries are swept on every write, so the map never holds more than the
/// tokens revoked within the last access-token lifetime.
///
/// Not durable and not shared between processes: a restart or a second
/// instance does not see these revocations.

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::auth::jwt::TokenCodec;

#[derive(Debug, Default)]
pub struct RevocationStore {
    // raw token -> Unix timestamp at which the entry may be dropped
    entries: Mutex<HashMap<String, i64>>,
}

impl RevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke `token` until its own expiry.
    ///
    /// If the token cannot be decoded its expiry is unknown, and the entry
    /// is kept for `access_ttl_hint` from now instead.
    pub fn revoke(&self, token: &str, codec: &TokenCodec, access_ttl_hint: Duration) {
        let now = Utc::now().timestamp();
        let expires_at = match codec.decode(token) {
            Ok(claims) => claims.exp,
            Err(e) => {
                tracing::debug!(error = %e, "Revoking undecodable token with fallback expiry");
                now + access_ttl_hint.num_seconds()
            }
        };

        let swept = self.revoke_until(token, expires_at, now);
        tracing::debug!(swept, "Token revoked");
    }

    /// Insert an entry expiring at `expires_at` and sweep everything already
    /// expired as of `now`. Returns the number of entries swept.
    pub fn revoke_until(&self, token: &str, expires_at: i64, now: i64) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, exp| *exp > now);
        let swept = before - entries.len();
        entries.insert(token.to_string(), expires_at);
        swept
    }

    pub fn is_revoked(&self, token: &str) -> bool {
        self.lock().contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // retain and insert never leave the map half-updated, so a poisoned
    // lock still guards a consistent map.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
