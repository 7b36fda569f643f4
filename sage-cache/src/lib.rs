//! ABOUTME: The Response Cache: a single-mutex bounded LRU keyed by class + question + conversation

mod key;

use parking_lot::Mutex;
use sage_core::Answer;

pub use key::cache_key;

/// Bounded LRU cache over [`Answer`]s, guarded by a single mutex so the map
/// and its recency order can never disagree.
pub struct ResponseCache {
    inner: Mutex<lru::LruCache<String, Answer>>,
}

impl ResponseCache {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = std::num::NonZeroUsize::new(capacity).expect("cache capacity must be non-zero");
        Self { inner: Mutex::new(lru::LruCache::new(capacity)) }
    }

    /// On hit, moves the entry to the MRU end and returns a copy with
    /// `cache_hit = true`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Answer> {
        let mut guard = self.inner.lock();
        guard.get(key).map(|answer| {
            let mut hit = answer.clone();
            hit.cache_hit = true;
            hit
        })
    }

    /// Insert at MRU; evicts the LRU entry if at capacity.
    pub fn put(&self, key: String, answer: Answer) {
        self.inner.lock().put(key, answer);
    }

    /// Evict every entry, returning the count evicted.
    pub fn clear(&self) -> usize {
        let mut guard = self.inner.lock();
        let count = guard.len();
        guard.clear();
        count
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sage_core::ModeUsed;
    use std::collections::HashMap;

    fn answer(text: &str) -> Answer {
        Answer {
            text: text.to_string(),
            sources: Vec::new(),
            confidence: 0.5,
            processing_time_s: 0.01,
            cache_hit: false,
            metadata: HashMap::new(),
            mode_used: ModeUsed::Grounded,
        }
    }

    #[test]
    fn miss_then_hit_sets_cache_hit_flag() {
        let cache = ResponseCache::new(2);
        assert!(cache.get("k1").is_none());
        cache.put("k1".to_string(), answer("hello"));
        let hit = cache.get("k1").unwrap();
        assert!(hit.cache_hit);
        assert_eq!(hit.text, "hello");
    }

    #[test]
    fn capacity_is_enforced_and_evicts_lru() {
        let cache = ResponseCache::new(2);
        cache.put("k1".to_string(), answer("a"));
        cache.put("k2".to_string(), answer("b"));
        cache.put("k3".to_string(), answer("c"));
        assert_eq!(cache.size(), 2);
        assert!(cache.get("k1").is_none());
        assert!(cache.get("k2").is_some());
        assert!(cache.get("k3").is_some());
    }

    #[test]
    fn clear_returns_evicted_count() {
        let cache = ResponseCache::new(5);
        cache.put("k1".to_string(), answer("a"));
        cache.put("k2".to_string(), answer("b"));
        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.size(), 0);
    }

    proptest::proptest! {
        #[test]
        fn size_never_exceeds_capacity(capacity in 1usize..16, inserts in 0usize..64) {
            let cache = ResponseCache::new(capacity);
            for i in 0..inserts {
                cache.put(format!("k{i}"), answer("x"));
            }
            prop_assert!(cache.size() <= capacity);
        }
    }
}
