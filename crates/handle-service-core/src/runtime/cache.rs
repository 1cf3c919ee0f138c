// crates/handle-service-core/src/runtime/cache.rs
// ============================================================================
// Module: Authorization Cache
// Description: Bounded, time-limited cache of resolved role grants.
// Purpose: Avoid an identity-service round trip on every admin check.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Entries are keyed by the credential fingerprint, so raw tokens are never
//! held in the map. An entry is served only while both hold:
//! - it was resolved no more than `ttl_millis` ago, and
//! - the credential's own expiry (if reported) lies in the future.
//!
//! A stale entry behaves exactly like a miss and is dropped on read; the
//! caller re-resolves and writes a fresh entry. When full, the least recently
//! used entry is evicted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::core::Credential;
use crate::core::RoleGrant;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default number of cached credentials.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
/// Default entry lifetime (five minutes).
pub const DEFAULT_CACHE_TTL_MILLIS: i64 = 300_000;

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Cached grant with bookkeeping.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Resolved grant.
    grant: RoleGrant,
    /// Clock reading when the grant was resolved.
    resolved_at: i64,
    /// Recency tick used for eviction.
    tick: u64,
}

/// Lock-protected cache state.
#[derive(Debug, Default)]
struct CacheState {
    /// Entries keyed by credential fingerprint.
    entries: HashMap<String, CacheEntry>,
    /// Recency index: tick to fingerprint.
    recency: BTreeMap<u64, String>,
    /// Next recency tick.
    next_tick: u64,
}

impl CacheState {
    /// Returns a fresh recency tick.
    const fn bump(&mut self) -> u64 {
        self.next_tick += 1;
        self.next_tick
    }

    /// Removes an entry and its recency slot.
    fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entries.remove(key) {
            self.recency.remove(&entry.tick);
        }
    }
}

/// Bounded LRU cache of role grants with a fixed time-to-live.
#[derive(Debug)]
pub struct AuthorizationCache {
    /// Cache state protected by a mutex.
    state: Mutex<CacheState>,
    /// Maximum number of entries (at least one).
    capacity: usize,
    /// Entry lifetime in milliseconds.
    ttl_millis: i64,
}

impl Default for AuthorizationCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_MILLIS)
    }
}

impl AuthorizationCache {
    /// Creates a cache; a zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize, ttl_millis: i64) -> Self {
        Self { state: Mutex::new(CacheState::default()), capacity: capacity.max(1), ttl_millis }
    }

    /// Returns the configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the configured time-to-live in milliseconds.
    #[must_use]
    pub const fn ttl_millis(&self) -> i64 {
        self.ttl_millis
    }

    /// Returns the live grant for `credential`, or `None` on miss or expiry.
    #[must_use]
    pub fn get(&self, credential: &Credential, now_millis: i64) -> Option<RoleGrant> {
        let key = credential.fingerprint();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (stale, old_tick) = {
            let entry = state.entries.get(&key)?;
            let stale = now_millis.saturating_sub(entry.resolved_at) > self.ttl_millis
                || entry.grant.is_expired(now_millis);
            (stale, entry.tick)
        };
        if stale {
            state.remove(&key);
            return None;
        }
        let tick = state.bump();
        state.recency.remove(&old_tick);
        state.recency.insert(tick, key.clone());
        let entry = state.entries.get_mut(&key)?;
        entry.tick = tick;
        Some(entry.grant.clone())
    }

    /// Stores a freshly resolved grant, evicting the least recently used
    /// entry when full.
    pub fn put(&self, credential: &Credential, grant: RoleGrant, resolved_at: i64) {
        let key = credential.fingerprint();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.remove(&key);
        while state.entries.len() >= self.capacity {
            let Some((_, oldest)) = state.recency.pop_first() else {
                break;
            };
            state.entries.remove(&oldest);
        }
        let tick = state.bump();
        state.recency.insert(tick, key.clone());
        state.entries.insert(key, CacheEntry { grant, resolved_at, tick });
    }

    /// Returns the number of stored entries, stale ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    /// Returns true when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.entries.clear();
        state.recency.clear();
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
