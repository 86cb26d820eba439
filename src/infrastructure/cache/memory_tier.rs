//! TTL- and capacity-bounded in-memory cache tier.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::ImageId;

use super::CacheKey;

struct Entry {
    payload: Bytes,
    inserted_at: Instant,
    last_access: Instant,
}

struct TierState {
    entries: HashMap<CacheKey, Entry>,
    bytes_used: u64,
}

/// Fast tier: payload bytes keyed by `(namespace, image_id)`.
///
/// The entry map and the running byte total live behind one mutex so
/// concurrent `put`/`get`/eviction always observe a consistent total. TTL
/// bounds staleness, the byte budget bounds footprint; the two axes are
/// independent.
pub struct MemoryTier {
    state: Mutex<TierState>,
    max_bytes: u64,
    ttl: Duration,
}

impl MemoryTier {
    /// Creates a tier with the given byte budget and entry lifetime.
    #[must_use]
    pub fn new(max_bytes: u64, ttl: Duration) -> Self {
        Self {
            state: Mutex::new(TierState {
                entries: HashMap::new(),
                bytes_used: 0,
            }),
            max_bytes,
            ttl,
        }
    }

    /// Inserts a payload and runs the eviction sweep in the same critical
    /// section, so the byte total can never overshoot unobserved.
    pub fn put(&self, key: CacheKey, payload: Bytes) {
        let now = Instant::now();
        let size = payload.len() as u64;
        let mut state = self.state.lock();

        if let Some(old) = state.entries.insert(
            key,
            Entry {
                payload,
                inserted_at: now,
                last_access: now,
            },
        ) {
            state.bytes_used -= old.payload.len() as u64;
        }
        state.bytes_used += size;

        self.evict_if_needed(&mut state);
    }

    /// Returns the payload if present and younger than the TTL.
    /// Expired entries are dropped on the spot and count as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<Bytes> {
        let now = Instant::now();
        let mut state = self.state.lock();

        let expired = match state.entries.get_mut(key) {
            Some(entry) => {
                if now.duration_since(entry.inserted_at) < self.ttl {
                    entry.last_access = now;
                    trace!(namespace = %key.namespace, image_id = %key.image_id, "Memory tier hit");
                    return Some(entry.payload.clone());
                }
                true
            }
            None => false,
        };

        if expired {
            if let Some(old) = state.entries.remove(key) {
                state.bytes_used -= old.payload.len() as u64;
            }
            trace!(namespace = %key.namespace, image_id = %key.image_id, "Memory tier entry expired");
        }
        None
    }

    /// Removes every entry belonging to `namespace`.
    /// Other namespaces are untouched.
    pub fn clear_namespace(&self, namespace: &str) -> usize {
        let mut state = self.state.lock();
        let before = state.entries.len();
        let mut freed = 0u64;
        state.entries.retain(|key, entry| {
            if key.namespace == namespace {
                freed += entry.payload.len() as u64;
                false
            } else {
                true
            }
        });
        state.bytes_used -= freed;
        let removed = before - state.entries.len();
        debug!(namespace = namespace, removed = removed, "Cleared namespace from memory tier");
        removed
    }

    /// Removes the image from every namespace.
    pub fn remove_image(&self, image_id: &ImageId) -> usize {
        let mut state = self.state.lock();
        let before = state.entries.len();
        let mut freed = 0u64;
        state.entries.retain(|key, entry| {
            if &key.image_id == image_id {
                freed += entry.payload.len() as u64;
                false
            } else {
                true
            }
        });
        state.bytes_used -= freed;
        before - state.entries.len()
    }

    /// Current byte total across all namespaces.
    pub fn bytes_used(&self) -> u64 {
        self.state.lock().bytes_used
    }

    /// Configured byte budget.
    #[must_use]
    pub const fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Configured entry lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of resident entries.
    pub fn entry_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    // Evicts least-recently-used entries until usage drops to 80% of the
    // budget. The batch amortizes eviction cost and avoids evict/re-add
    // thrash right at the capacity boundary.
    fn evict_if_needed(&self, state: &mut TierState) {
        if state.bytes_used <= self.max_bytes {
            return;
        }
        let target = self.max_bytes - self.max_bytes / 5;

        let mut by_age: Vec<(CacheKey, Instant, u64)> = state
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.last_access, entry.payload.len() as u64))
            .collect();
        by_age.sort_by_key(|(_, last_access, _)| *last_access);

        let mut evicted = 0usize;
        for (key, _, size) in by_age {
            if state.bytes_used <= target {
                break;
            }
            state.entries.remove(&key);
            state.bytes_used -= size;
            evicted += 1;
        }

        debug!(
            evicted = evicted,
            bytes_used = state.bytes_used,
            max_bytes = self.max_bytes,
            "Memory tier eviction sweep"
        );
    }
}

impl std::fmt::Debug for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTier")
            .field("max_bytes", &self.max_bytes)
            .field("ttl", &self.ttl)
            .field("bytes_used", &self.bytes_used())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(ns: &str, id: &str) -> CacheKey {
        CacheKey {
            namespace: ns.to_string(),
            image_id: ImageId::new(id),
        }
    }

    fn payload(len: usize) -> Bytes {
        Bytes::from(vec![7u8; len])
    }

    #[test]
    fn test_put_and_get() {
        let tier = MemoryTier::new(1024, Duration::from_secs(60));
        tier.put(key("gallery", "a"), payload(10));

        assert_eq!(tier.get(&key("gallery", "a")), Some(payload(10)));
        assert_eq!(tier.bytes_used(), 10);
        assert_eq!(tier.entry_count(), 1);
    }

    #[test]
    fn test_namespaces_do_not_share_entries() {
        let tier = MemoryTier::new(1024, Duration::from_secs(60));
        tier.put(key("a", "img"), payload(10));

        assert!(tier.get(&key("b", "img")).is_none());
    }

    #[test]
    fn test_replacing_entry_adjusts_byte_total() {
        let tier = MemoryTier::new(1024, Duration::from_secs(60));
        tier.put(key("ns", "a"), payload(100));
        tier.put(key("ns", "a"), payload(30));

        assert_eq!(tier.bytes_used(), 30);
        assert_eq!(tier.entry_count(), 1);
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_dropped() {
        let tier = MemoryTier::new(1024, Duration::from_millis(20));
        tier.put(key("ns", "a"), payload(10));

        std::thread::sleep(Duration::from_millis(30));

        assert!(tier.get(&key("ns", "a")).is_none());
        assert_eq!(tier.entry_count(), 0);
        assert_eq!(tier.bytes_used(), 0);
    }

    #[test]
    fn test_eviction_frees_to_eighty_percent() {
        let tier = MemoryTier::new(100, Duration::from_secs(60));
        // Ten 10-byte entries fill the budget exactly; the next put trips
        // the sweep.
        for i in 0..10 {
            tier.put(key("ns", &format!("{i}")), payload(10));
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(tier.bytes_used(), 100);

        tier.put(key("ns", "overflow"), payload(10));

        assert!(tier.bytes_used() <= 80);
        // Oldest entries went first; the newest insert survived.
        assert!(tier.get(&key("ns", "overflow")).is_some());
        assert!(tier.get(&key("ns", "0")).is_none());
    }

    #[test]
    fn test_eviction_is_lru_not_fifo() {
        let tier = MemoryTier::new(30, Duration::from_secs(60));
        tier.put(key("ns", "a"), payload(10));
        std::thread::sleep(Duration::from_millis(2));
        tier.put(key("ns", "b"), payload(10));
        std::thread::sleep(Duration::from_millis(2));
        tier.put(key("ns", "c"), payload(10));
        std::thread::sleep(Duration::from_millis(2));

        // Touch "a" so "b" becomes the least recently used.
        assert!(tier.get(&key("ns", "a")).is_some());
        std::thread::sleep(Duration::from_millis(2));

        tier.put(key("ns", "d"), payload(10));

        assert!(tier.get(&key("ns", "b")).is_none());
        assert!(tier.get(&key("ns", "a")).is_some());
    }

    #[test]
    fn test_clear_namespace_leaves_others() {
        let tier = MemoryTier::new(1024, Duration::from_secs(60));
        tier.put(key("a", "1"), payload(10));
        tier.put(key("a", "2"), payload(10));
        tier.put(key("b", "1"), payload(10));

        assert_eq!(tier.clear_namespace("a"), 2);
        assert!(tier.get(&key("a", "1")).is_none());
        assert!(tier.get(&key("b", "1")).is_some());
        assert_eq!(tier.bytes_used(), 10);
    }

    #[test]
    fn test_remove_image_spans_namespaces() {
        let tier = MemoryTier::new(1024, Duration::from_secs(60));
        tier.put(key("a", "img"), payload(10));
        tier.put(key("b", "img"), payload(10));
        tier.put(key("b", "other"), payload(10));

        assert_eq!(tier.remove_image(&ImageId::new("img")), 2);
        assert!(tier.get(&key("a", "img")).is_none());
        assert!(tier.get(&key("b", "other")).is_some());
    }
}
