//! Memoisation of recently materialised base objects.
//!
//! The source allocates this cache but never populates it. We populate it: the
//! workspace already relies on exactly this shape (`git_object::cache::ObjectCache`)
//! for loose objects, so an inert cache here would be a missed opportunity rather
//! than fidelity to the source.

use std::num::NonZeroUsize;
use std::sync::Arc;

use git_object::ObjectType;
use lru::LruCache;

const DEFAULT_CAPACITY: usize = 64;

/// `position -> materialised bytes + type`, keyed by packfile offset.
pub struct BaseCache {
    cache: LruCache<u64, (ObjectType, Arc<[u8]>)>,
}

impl BaseCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap()),
            ),
        }
    }

    pub fn get(&mut self, position: u64) -> Option<(ObjectType, Arc<[u8]>)> {
        self.cache.get(&position).cloned()
    }

    pub fn insert(&mut self, position: u64, kind: ObjectType, data: Arc<[u8]>) {
        self.cache.push(position, (kind, data));
    }
}

impl Default for BaseCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get_roundtrip() {
        let mut cache = BaseCache::with_capacity(2);
        let data: Arc<[u8]> = Arc::from(b"hello".as_slice());
        cache.insert(12, ObjectType::Blob, data.clone());
        let (kind, got) = cache.get(12).unwrap();
        assert_eq!(kind, ObjectType::Blob);
        assert_eq!(&*got, &*data);
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = BaseCache::with_capacity(1);
        cache.insert(1, ObjectType::Blob, Arc::from(b"a".as_slice()));
        cache.insert(2, ObjectType::Blob, Arc::from(b"b".as_slice()));
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_some());
    }

    #[test]
    fn miss_returns_none() {
        let mut cache = BaseCache::new();
        assert!(cache.get(999).is_none());
    }
}
