// File: src/cache/identity_cache.rs

use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, DashSet};

use chatplays_common::models::Identity;

pub const IDENTITY_TTL_MINUTES: i64 = 15;

#[derive(Debug, Clone)]
pub struct IdentityCacheEntry {
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

impl IdentityCacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Participant id → identity, with a TTL, plus the set of ids whose external
/// lookup is currently running.
pub struct IdentityCache {
    entries: DashMap<String, IdentityCacheEntry>,
    in_flight: Arc<DashSet<String>>,
    ttl: Duration,
}

impl IdentityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: Arc::new(DashSet::new()),
            ttl,
        }
    }

    /// Cached identity for `participant_id` if it hasn't expired yet.
    /// Expired entries are dropped on the way.
    pub fn fresh(&self, participant_id: &str, now: DateTime<Utc>) -> Option<Identity> {
        let expired = match self.entries.get(participant_id) {
            Some(entry) if entry.is_fresh(now) => return Some(entry.identity.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(participant_id, |_, e| !e.is_fresh(now));
        }
        None
    }

    /// Stores an externally resolved identity. Empty identities are not
    /// cached so the next message can retry straight away.
    pub fn store(&self, identity: Identity, now: DateTime<Utc>) -> bool {
        if identity.is_empty() {
            return false;
        }
        self.prune_expired(now);
        self.entries.insert(
            identity.participant_id.clone(),
            IdentityCacheEntry {
                identity,
                expires_at: now + self.ttl,
            },
        );
        true
    }

    /// Stores identity fields carried by a chat record itself. They are laid
    /// over whatever is cached and get a fresh TTL. Returns the merged identity.
    pub fn store_hint(&self, hint: Identity, now: DateTime<Utc>) -> Option<Identity> {
        if hint.is_empty() {
            return None;
        }
        let merged = match self.fresh(&hint.participant_id, now) {
            Some(existing) => hint.merged_over(&existing),
            None => hint,
        };
        self.store(merged.clone(), now);
        Some(merged)
    }

    /// Registers an external lookup for `participant_id`. Returns `None` if one
    /// is already running; otherwise the guard clears the marker when dropped.
    pub fn try_begin(&self, participant_id: &str) -> Option<InFlightGuard> {
        if self.in_flight.insert(participant_id.to_string()) {
            Some(InFlightGuard {
                participant_id: participant_id.to_string(),
                in_flight: Arc::clone(&self.in_flight),
            })
        } else {
            None
        }
    }

    pub fn is_in_flight(&self, participant_id: &str) -> bool {
        self.in_flight.contains(participant_id)
    }

    pub fn prune_expired(&self, now: DateTime<Utc>) {
        self.entries.retain(|_, entry| entry.is_fresh(now));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::new(Duration::minutes(IDENTITY_TTL_MINUTES))
    }
}

/// Clears the in-flight marker for one participant when dropped, whether the
/// lookup succeeded, came back empty, failed, or panicked.
pub struct InFlightGuard {
    participant_id: String,
    in_flight: Arc<DashSet<String>>,
}

impl InFlightGuard {
    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.participant_id);
    }
}
