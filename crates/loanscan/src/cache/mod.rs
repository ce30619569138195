//! In-memory result caches keyed by page content fingerprint.
//!
//! # Fingerprints
//!
//! [`fingerprint`] hashes the page dimensions plus every [`FINGERPRINT_STRIDE`]th
//! pixel in both directions with `ahash`. It is approximate and non-cryptographic:
//!
//! - byte-identical pages always share a fingerprint
//! - near-duplicates that differ only between sample points collide, so the stride
//!   is kept small enough that any mark of 4x4 pixels or more changes the hash
//! - values are stable within a process, not across processes
//!
//! # Lifecycle
//!
//! Entries are created on the first miss and live until [`FingerprintCache::clear`].
//! There is no eviction; a cache grows for the lifetime of its owner. Reads and
//! writes go through a `parking_lot::RwLock`, so page workers can populate the same
//! cache concurrently.

use ahash::{AHashMap, AHasher};
use image::GenericImageView;
use parking_lot::RwLock;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::types::{CacheStats, PageImage};

/// Sampling stride of [`fingerprint`], in pixels, on both axes.
pub const FINGERPRINT_STRIDE: u32 = 4;

/// Approximate content fingerprint of a page.
pub fn fingerprint(image: &PageImage) -> u64 {
    let view = image.as_dynamic();
    let (width, height) = view.dimensions();

    let mut hasher = AHasher::default();
    width.hash(&mut hasher);
    height.hash(&mut hasher);
    view.color().channel_count().hash(&mut hasher);

    for y in (0..height).step_by(FINGERPRINT_STRIDE as usize) {
        for x in (0..width).step_by(FINGERPRINT_STRIDE as usize) {
            view.get_pixel(x, y).0.hash(&mut hasher);
        }
    }

    hasher.finish()
}

/// Thread-safe unbounded map with hit/miss accounting.
#[derive(Debug)]
pub struct FingerprintCache<K, V> {
    entries: RwLock<AHashMap<K, V>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl<K, V> Default for FingerprintCache<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(AHashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }
}

impl<K, V> FingerprintCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`, counting a hit or a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let found = self.entries.read().get(key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Look up `key` without touching the counters.
    pub fn peek(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.write().insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        self.entries.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::sync::Arc;

    #[test]
    fn test_fingerprint_identical_pages_match() {
        let a = PageImage::from_gray(GrayImage::from_fn(64, 64, |x, y| Luma([(x ^ y) as u8])));
        let b = PageImage::from_gray(GrayImage::from_fn(64, 64, |x, y| Luma([(x ^ y) as u8])));
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_sees_small_marks() {
        let blank = GrayImage::from_pixel(100, 100, Luma([255]));
        let mut marked = blank.clone();
        for y in 41..45 {
            for x in 13..17 {
                marked.put_pixel(x, y, Luma([0]));
            }
        }
        assert_ne!(
            fingerprint(&PageImage::from_gray(blank)),
            fingerprint(&PageImage::from_gray(marked))
        );
    }

    #[test]
    fn test_fingerprint_includes_dimensions() {
        let a = PageImage::from_gray(GrayImage::from_pixel(40, 80, Luma([255])));
        let b = PageImage::from_gray(GrayImage::from_pixel(80, 40, Luma([255])));
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_cache_counts_hits_and_misses() {
        let cache: FingerprintCache<u64, String> = FingerprintCache::new();
        assert!(cache.get(&1).is_none());
        cache.insert(1, "page".to_string());
        assert_eq!(cache.get(&1).as_deref(), Some("page"));
        assert_eq!(cache.peek(&1).as_deref(), Some("page"));

        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 1,
                hits: 1,
                misses: 1
            }
        );

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_cache_concurrent_writers() {
        let cache: Arc<FingerprintCache<u64, u64>> = Arc::new(FingerprintCache::new());
        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..100u64 {
                        cache.insert(t * 1000 + i, i);
                        let _ = cache.get(&(t * 1000 + i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = cache.stats();
        assert_eq!(stats.entries, 800);
        assert_eq!(stats.hits, 800);
    }
}
