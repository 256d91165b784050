//! TTL caches: the per-genus detection caches and a generic string-keyed
//! TTL map reused by the fetch proxy and the processors' inventory caches.
//!
//! Expired entries are removed lazily on access; there is no background
//! eviction. Readers never observe partial entries and writes are
//! last-writer-wins per key.

use crate::results::Detection;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// A cached detection round for one source.
#[derive(Debug, Clone)]
pub struct DetectionsCacheEntry {
    /// Every detection the round produced, including sub-threshold ones.
    pub detections: Vec<Detection>,
    /// The selected detection; `None` records "no processor available".
    pub optimal: Option<Detection>,
    timestamp: Instant,
    ttl: Duration,
}

impl DetectionsCacheEntry {
    fn invalid(&self, now: Instant) -> bool {
        now.duration_since(self.timestamp) >= self.ttl
    }
}

/// One detection cache per processor genus.
#[derive(Debug)]
pub struct DetectionsCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, DetectionsCacheEntry>>,
}

impl DetectionsCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Looks up a fresh entry for `source`, dropping it when expired.
    #[must_use]
    pub fn lookup(&self, source: &str) -> Option<DetectionsCacheEntry> {
        self.lookup_at(source, Instant::now())
    }

    #[must_use]
    pub fn lookup_at(&self, source: &str, now: Instant) -> Option<DetectionsCacheEntry> {
        let expired = {
            let entries = self.read();
            match entries.get(source) {
                Some(entry) if entry.invalid(now) => true,
                Some(entry) => return Some(entry.clone()),
                None => return None,
            }
        };
        if expired {
            self.write().remove(source);
        }
        None
    }

    /// Records a detection round. Last writer wins.
    pub fn record(&self, source: &str, detections: Vec<Detection>, optimal: Option<Detection>) {
        self.record_at(source, detections, optimal, Instant::now());
    }

    pub fn record_at(
        &self,
        source: &str,
        detections: Vec<Detection>,
        optimal: Option<Detection>,
        now: Instant,
    ) {
        let entry = DetectionsCacheEntry {
            detections,
            optimal,
            timestamp: now,
            ttl: self.ttl,
        };
        self.write().insert(source.to_string(), entry);
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, DetectionsCacheEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, DetectionsCacheEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Generic string-keyed TTL cache for cheaply cloneable values.
#[derive(Debug)]
pub struct TtlCache<V: Clone> {
    entries: RwLock<HashMap<String, (V, Instant, Duration)>>,
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: Clone> TtlCache<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    #[must_use]
    pub fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let expired = {
            let entries = self.read();
            match entries.get(key) {
                Some((_, timestamp, ttl)) if now.duration_since(*timestamp) >= *ttl => true,
                Some((value, _, _)) => return Some(value.clone()),
                None => return None,
            }
        };
        if expired {
            self.write().remove(key);
        }
        None
    }

    /// Returns the value even when expired, without evicting it.
    ///
    /// Used for conditional revalidation: a stale HTTP response still
    /// carries validators worth sending back to the server.
    #[must_use]
    pub fn peek_stale(&self, key: &str) -> Option<V> {
        self.read().get(key).map(|(value, _, _)| value.clone())
    }

    pub fn insert(&self, key: &str, value: V, ttl: Duration) {
        self.insert_at(key, value, ttl, Instant::now());
    }

    pub fn insert_at(&self, key: &str, value: V, ttl: Duration, now: Instant) {
        self.write().insert(key.to_string(), (value, now, ttl));
    }

    fn read(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, (V, Instant, Duration)>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, (V, Instant, Duration)>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}
