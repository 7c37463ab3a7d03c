// Copyright 2025 Chatcache Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Key-value storage with per-key expiry
//!
//! The chat pipeline keeps two kinds of state in a [`CacheStore`]:
//! answers keyed by the exact question text, and one shared
//! conversation transcript under a sentinel key. Every operation is a
//! single round-trip; failures propagate as [`crate::ChatError::CacheUnavailable`]
//! without local retry.
//!
//! [`MemoryStore`] is the in-process backend. It reads time from a
//! [`Clock`] so expiry can be driven by [`ManualClock`] in tests.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::Result;

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Whether a live (non-expired) value exists for `key`
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Live value for `key`, if any
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value and
    /// resetting its expiry to `ttl` from now
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Round-trip check used by health reporting
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str;
}

/// Source of monotonic time for expiry decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Instant,
}

/// Writes between full sweeps of expired entries
const SWEEP_EVERY_WRITES: u64 = 64;

/// In-process TTL store backed by a concurrent map.
///
/// Expired entries are evicted when read, and every
/// [`SWEEP_EVERY_WRITES`] writes the whole map is swept so keys that
/// are never read again do not accumulate.
pub struct MemoryStore {
    entries: DashMap<String, StoredValue>,
    clock: Arc<dyn Clock>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            writes: AtomicU64::new(0),
        }
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, stored| stored.expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "Swept expired cache entries");
        }
        removed
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        self.entries.remove_if(key, |_, stored| stored.expires_at <= now);
        self.entries.get(key).map(|stored| stored.value.clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.live_value(key).is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.live_value(key))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let expires_at = self.clock.now() + ttl;
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at,
            },
        );

        let writes = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if writes % SWEEP_EVERY_WRITES == 0 {
            self.sweep_expired();
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_clock() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (MemoryStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryStore::new();
        store
            .set_with_ttl("What is Rust?", "A language", Duration::from_secs(600))
            .await
            .unwrap();

        assert!(store.exists("What is Rust?").await.unwrap());
        assert_eq!(
            store.get("What is Rust?").await.unwrap().as_deref(),
            Some("A language")
        );
    }

    #[tokio::test]
    async fn test_missing_key() {
        let store = MemoryStore::new();
        assert!(!store.exists("nope").await.unwrap());
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_are_exact() {
        let store = MemoryStore::new();
        store
            .set_with_ttl("Hello", "hi", Duration::from_secs(600))
            .await
            .unwrap();

        assert!(!store.exists("hello").await.unwrap());
        assert!(!store.exists("Hello ").await.unwrap());
    }

    #[tokio::test]
    async fn test_entry_expires_at_deadline() {
        let (store, clock) = store_with_clock();
        store
            .set_with_ttl("q", "a", Duration::from_secs(600))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(599));
        assert!(store.exists("q").await.unwrap());

        clock.advance(Duration::from_secs(1));
        assert!(!store.exists("q").await.unwrap());
        assert!(store.get("q").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_resets_ttl() {
        let (store, clock) = store_with_clock();
        store
            .set_with_ttl("context", "one", Duration::from_secs(3600))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(3000));
        store
            .set_with_ttl("context", "two", Duration::from_secs(3600))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(3000));
        assert_eq!(
            store.get("context").await.unwrap().as_deref(),
            Some("two")
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_writes_sweep_keys_never_read_again() {
        let (store, clock) = store_with_clock();
        for i in 0..1000 {
            store
                .set_with_ttl(&format!("question {}", i), "a", Duration::from_secs(600))
                .await
                .unwrap();
        }
        assert_eq!(store.entries.len(), 1000);

        clock.advance(Duration::from_secs(600));
        for i in 0..SWEEP_EVERY_WRITES {
            store
                .set_with_ttl(&format!("fresh {}", i), "a", Duration::from_secs(600))
                .await
                .unwrap();
        }

        assert_eq!(store.entries.len(), store.len());
        assert!(store.entries.len() <= SWEEP_EVERY_WRITES as usize);
    }

    #[tokio::test]
    async fn test_sweep_keeps_live_entries() {
        let (store, clock) = store_with_clock();
        store
            .set_with_ttl("short", "a", Duration::from_secs(600))
            .await
            .unwrap();
        store
            .set_with_ttl("context", "b", Duration::from_secs(3600))
            .await
            .unwrap();

        clock.advance(Duration::from_secs(600));
        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.entries.len(), 1);
        assert_eq!(store.get("context").await.unwrap().as_deref(), Some("b"));
    }
}
