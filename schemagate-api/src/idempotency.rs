//! Idempotency replay store.
//!
//! Committed owning-mode responses are remembered per `(bizId, key)` together
//! with a SHA-256 fingerprint of the request body. A replay with the same body
//! gets the stored response back; a replay with a different body is a conflict.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use schemagate_core::{PseudoApiResponse, PseudoRequest};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Every this many recorded responses, expired entries are swept.
pub const PURGE_EVERY: usize = 256;

/// Warning attached to a replayed response.
pub const REPLAY_WARNING: &str = "idempotent replay: returning the stored response";

#[derive(Debug, Clone)]
struct IdempotencyEntry {
    fingerprint: String,
    response: PseudoApiResponse,
    stored_at: DateTime<Utc>,
}

/// What a lookup found for a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Replay {
    /// Never seen, or expired.
    Fresh,
    Stored(Box<PseudoApiResponse>),
    /// Same key, different request body.
    Conflict,
}

/// Fingerprint of the parts of a request that define its effect.
///
/// Request id and dry-run flag are left out so a retry with a new request id
/// still replays.
pub fn fingerprint(request: &PseudoRequest) -> String {
    let body = serde_json::json!({
        "scope": request.scope,
        "command": request.command,
    });
    let mut hasher = Sha256::new();
    hasher.update(body.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

pub struct IdempotencyStore {
    entries: DashMap<(String, String), IdempotencyEntry>,
    ttl: chrono::Duration,
    recorded: AtomicUsize,
}

impl IdempotencyStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            recorded: AtomicUsize::new(0),
        }
    }

    fn slot(tenant: Option<&str>, key: &str) -> (String, String) {
        (tenant.unwrap_or_default().to_string(), key.to_string())
    }

    fn is_expired(&self, entry: &IdempotencyEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.stored_at) > self.ttl
    }

    pub fn lookup(&self, tenant: Option<&str>, key: &str, fingerprint: &str) -> Replay {
        let slot = Self::slot(tenant, key);
        let now = Utc::now();

        let replay = match self.entries.get(&slot) {
            None => return Replay::Fresh,
            Some(entry) if self.is_expired(&entry, now) => None,
            Some(entry) if entry.fingerprint == fingerprint => {
                Some(Replay::Stored(Box::new(entry.response.clone())))
            }
            Some(_) => Some(Replay::Conflict),
        };

        // The read guard is gone by now; removing under it would deadlock the shard.
        replay.unwrap_or_else(|| {
            self.entries.remove(&slot);
            Replay::Fresh
        })
    }

    pub fn record(&self, tenant: Option<&str>, key: &str, fingerprint: String, response: PseudoApiResponse) {
        self.entries.insert(
            Self::slot(tenant, key),
            IdempotencyEntry {
                fingerprint,
                response,
                stored_at: Utc::now(),
            },
        );

        // Keys that are never looked up again would otherwise live forever.
        if (self.recorded.fetch_add(1, Ordering::Relaxed) + 1) % PURGE_EVERY == 0 {
            let removed = self.purge_expired();
            if removed > 0 {
                tracing::debug!(removed, remaining = self.len(), "Purged expired idempotency keys");
            }
        }
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.is_expired(entry, now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
