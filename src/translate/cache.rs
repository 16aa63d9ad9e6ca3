//! In-memory LRU cache with TTL in front of `approved_translations`.
//! Key: blake3 hash of (source_hash | target_lang).

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;

use crate::history::ApprovedTranslation;

struct CacheEntry {
    approved: ApprovedTranslation,
    inserted_at: Instant,
}

pub struct ApprovedCache {
    inner: Mutex<LruCache<[u8; 32], CacheEntry>>,
    ttl: Duration,
}

impl ApprovedCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn compute_key(source_hash: &str, target_lang: &str) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(source_hash.as_bytes());
        hasher.update(b"|");
        hasher.update(target_lang.as_bytes());
        *hasher.finalize().as_bytes()
    }

    /// Returns None if absent or expired.
    pub fn get(&self, source_hash: &str, target_lang: &str) -> Option<ApprovedTranslation> {
        let key = Self::compute_key(source_hash, target_lang);
        let mut cache = self.inner.lock();
        if let Some(entry) = cache.get(&key) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.approved.clone());
            }
            cache.pop(&key);
        }
        None
    }

    pub fn insert(&self, approved: ApprovedTranslation) {
        let key = Self::compute_key(&approved.source_hash, &approved.target_lang);
        self.inner.lock().put(
            key,
            CacheEntry {
                approved,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approved(hash: &str, lang: &str, text: &str) -> ApprovedTranslation {
        ApprovedTranslation {
            id: 1,
            source_hash: hash.into(),
            target_lang: lang.into(),
            source_text: "굿즈".into(),
            approved_text: text.into(),
            usage_count: 0,
            approval_count: 1,
            quality_score: 1.0,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_hit_and_language_separation() {
        let cache = ApprovedCache::new(8, Duration::from_secs(60));
        cache.insert(approved("h", "en", "goods"));
        assert_eq!(cache.get("h", "en").unwrap().approved_text, "goods");
        assert!(cache.get("h", "ja").is_none());
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache = ApprovedCache::new(8, Duration::ZERO);
        cache.insert(approved("h", "en", "goods"));
        assert!(cache.get("h", "en").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_refresh_replaces() {
        let cache = ApprovedCache::new(8, Duration::from_secs(60));
        cache.insert(approved("h", "en", "goods"));
        cache.insert(approved("h", "en", "merch"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("h", "en").unwrap().approved_text, "merch");
    }
}
