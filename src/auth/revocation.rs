//! Refresh-token revocation checks.
//!
//! The cascade only asks "is this token revoked?". Storage is up to the
//! application; [`RevocationList`] is an in-memory option.

use std::sync::Arc;

use dashmap::DashMap;

use crate::auth::token::now_secs;

pub trait RevocationCheck: Send + Sync + 'static {
    fn is_revoked(&self, token: &str) -> bool;
}

/// Accepts every token.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRevoked;

impl RevocationCheck for NeverRevoked {
    fn is_revoked(&self, _token: &str) -> bool {
        false
    }
}

/// Concurrent set of revoked tokens, each kept until its own expiry.
#[derive(Debug, Clone, Default)]
pub struct RevocationList {
    entries: Arc<DashMap<String, u64>>,
}

impl RevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke `token` until `expires_at` (seconds since epoch).
    pub fn revoke(&self, token: impl Into<String>, expires_at: u64) {
        self.entries.insert(token.into(), expires_at);
    }

    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    /// Drop entries whose token would have expired anyway.
    pub fn prune(&self, now: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "Pruned revocation list");
        }
        removed
    }

    pub fn prune_expired(&self) -> usize {
        self.prune(now_secs())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RevocationCheck for RevocationList {
    fn is_revoked(&self, token: &str) -> bool {
        match self.entries.get(token) {
            Some(expires_at) => *expires_at > now_secs(),
            None => false,
        }
    }
}
