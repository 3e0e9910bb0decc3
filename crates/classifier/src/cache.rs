//! Classification result cache
//!
//! Keyed by a normalized prefix of the utterance; shared across all
//! conversations, so the map must tolerate concurrent access. Entries past
//! their TTL are treated as absent and evicted opportunistically when the
//! cache exceeds its size bound. Eviction is best-effort LRU: under racing
//! writers the only guarantee needed is that a stale entry eventually
//! stops being returned.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use callsim_core::ClassificationResult;

/// Cache key: lowercased, whitespace-collapsed, truncated utterance prefix
pub fn cache_key(utterance: &str) -> String {
    let normalized = utterance
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    normalized.chars().take(120).collect()
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: ClassificationResult,
    inserted_at: Instant,
    last_used: Instant,
}

/// TTL + size-bounded concurrent result cache
pub struct ClassificationCache {
    entries: DashMap<String, CacheEntry>,
    capacity: usize,
    ttl: Duration,
}

impl ClassificationCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Look up a cached result; expired entries count as absent
    pub fn get(&self, utterance: &str) -> Option<ClassificationResult> {
        let key = cache_key(utterance);

        if let Some(entry) = self.entries.get(&key) {
            if entry.inserted_at.elapsed() >= self.ttl {
                drop(entry);
                self.entries.remove(&key);
                return None;
            }
        }

        self.entries.get_mut(&key).map(|mut entry| {
            entry.last_used = Instant::now();
            entry.result.clone()
        })
    }

    /// Store a final classification result
    pub fn insert(&self, utterance: &str, result: ClassificationResult) {
        let now = Instant::now();
        self.entries.insert(
            cache_key(utterance),
            CacheEntry {
                result,
                inserted_at: now,
                last_used: now,
            },
        );

        if self.entries.len() > self.capacity {
            self.evict();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries, then the least recently used until the cache
    /// fits its bound again
    fn evict(&self) {
        self.entries
            .retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);

        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.last_used)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }

        tracing::debug!(len = self.entries.len(), "cache evicted down to bound");
    }
}
