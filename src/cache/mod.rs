//! Byte-bounded LRU cache for rendered images.
//!
//! Key properties:
//!
//! - **Bounded size**: after every insertion `total_bytes() <= max_bytes()`
//! - **Recency**: `get` marks an entry most recently used; eviction removes
//!   the least recently used entries first
//! - **Shared**: the cache is `Send + Sync` and handed to every visualizer
//!   as an `Arc<ImageCache>`
//!
//! An image larger than the whole ceiling is not retained.

pub mod key;

pub use key::{build_key, visualizer_prefix, CacheKey, KeySection};

use crate::config::EngineConfig;
use crate::image::RasterImage;
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default ceiling: 250 MB.
pub const DEFAULT_MAX_BYTES: usize = 250 * 1024 * 1024;

#[derive(Debug)]
struct Entry {
    image: Arc<RasterImage>,
    bytes: usize,
    stamp: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, Entry>,
    /// Access stamp -> key, oldest first.
    order: BTreeMap<u64, String>,
    clock: u64,
    total_bytes: usize,
}

impl CacheState {
    fn touch(&mut self, key: &str) -> Option<Arc<RasterImage>> {
        self.clock += 1;
        let stamp = self.clock;
        let entry = self.entries.get_mut(key)?;
        self.order.remove(&entry.stamp);
        entry.stamp = stamp;
        self.order.insert(stamp, key.to_string());
        Some(Arc::clone(&entry.image))
    }

    fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.stamp);
        self.total_bytes -= entry.bytes;
        Some(entry)
    }

    fn evict_to(&mut self, max_bytes: usize) {
        while self.total_bytes > max_bytes {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&key) {
                self.total_bytes -= entry.bytes;
                debug!("image cache evicted '{key}' ({} bytes)", entry.bytes);
            }
        }
    }
}

/// Thread-safe LRU image cache bounded by total byte size.
#[derive(Debug)]
pub struct ImageCache {
    state: Mutex<CacheState>,
    max_bytes: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ImageCache {
    /// Create a cache holding at most `max_bytes` of pixel data.
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            max_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Create a cache sized by the engine configuration.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.cache_max_bytes())
    }

    /// Convenience constructor for the shared handle visualizers take.
    #[must_use]
    pub fn shared(max_bytes: usize) -> Arc<Self> {
        Arc::new(Self::new(max_bytes))
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `key`, marking it most recently used.
    pub fn get(&self, key: &str) -> Option<Arc<RasterImage>> {
        let found = self.lock().touch(key);
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("image cache hit: {key}");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("image cache miss: {key}");
        }
        found
    }

    /// True if `key` is cached; does not affect recency or counters.
    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Insert or replace `key`, then evict least recently used entries
    /// until the ceiling holds.
    pub fn put(&self, key: impl Into<String>, image: Arc<RasterImage>) {
        let key = key.into();
        let bytes = image.byte_size();
        let mut state = self.lock();
        state.remove(&key);

        if bytes > self.max_bytes {
            debug!(
                "image cache not retaining '{key}': {bytes} bytes exceed ceiling of {}",
                self.max_bytes
            );
            return;
        }

        state.clock += 1;
        let stamp = state.clock;
        state.order.insert(stamp, key.clone());
        state.entries.insert(key, Entry { image, bytes, stamp });
        state.total_bytes += bytes;
        state.evict_to(self.max_bytes);
    }

    /// Remove one entry.
    pub fn remove(&self, key: &str) -> Option<Arc<RasterImage>> {
        self.lock().remove(key).map(|e| e.image)
    }

    /// Remove every entry whose key starts with `prefix`; returns the count.
    pub fn remove_all_with_prefix(&self, prefix: &str) -> usize {
        let mut state = self.lock();
        let doomed: Vec<String> = state
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in &doomed {
            state.remove(key);
        }
        if !doomed.is_empty() {
            debug!("image cache dropped {} entries with prefix '{prefix}'", doomed.len());
        }
        doomed.len()
    }

    /// Drop everything; counters are kept.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
        state.total_bytes = 0;
    }

    /// Number of cached images.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes currently held.
    pub fn total_bytes(&self) -> usize {
        self.lock().total_bytes
    }

    /// Configured ceiling.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Number of successful lookups.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of failed lookups.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> Vec<String> {
        self.lock().order.values().cloned().collect()
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES)
    }
}
