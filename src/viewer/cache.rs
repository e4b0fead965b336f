//! LRU cache for rendered page surfaces

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::engine::{RasterSurface, RenderTransform};
use crate::viewer::transform::Rotation;

/// Cache key for rendered surfaces
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RasterKey {
    /// Page number (0-indexed)
    pub page: usize,
    /// Scale factor (stored as millionths for stable hashing)
    pub scale_millionths: u32,
    /// Effective on-screen rotation
    pub rotation: Rotation,
}

impl RasterKey {
    /// Create a cache key from a render transform
    #[must_use]
    pub fn new(page: usize, transform: &RenderTransform) -> Self {
        Self {
            page,
            scale_millionths: (transform.scale * 1_000_000.0) as u32,
            rotation: transform.rotation,
        }
    }
}

/// LRU cache for rendered page surfaces
pub struct RasterCache {
    cache: LruCache<RasterKey, Arc<RasterSurface>>,
}

impl RasterCache {
    /// Create a new cache with the given capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).expect("1 is non-zero")),
            ),
        }
    }

    /// Get a cached surface, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, key: &RasterKey) -> Option<Arc<RasterSurface>> {
        self.cache.get(key).cloned()
    }

    /// Check if a key is in the cache without promoting it
    #[must_use]
    pub fn contains(&self, key: &RasterKey) -> bool {
        self.cache.contains(key)
    }

    /// Insert a surface into the cache, returning an Arc to it
    pub fn insert(&mut self, key: RasterKey, surface: RasterSurface) -> Arc<RasterSurface> {
        let arc = Arc::new(surface);
        self.cache.put(key, arc.clone());
        arc
    }

    /// Clear all cached surfaces
    pub fn invalidate_all(&mut self) {
        self.cache.clear();
    }

    /// Invalidate all cached versions of a specific page
    pub fn invalidate_page(&mut self, page: usize) {
        let keys_to_remove: Vec<_> = self
            .cache
            .iter()
            .filter(|(k, _)| k.page == page)
            .map(|(k, _)| k.clone())
            .collect();

        for key in keys_to_remove {
            self.cache.pop(&key);
        }
    }

    /// Number of cached surfaces
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Cache capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(scale: f32, rotation: Rotation) -> RenderTransform {
        RenderTransform { scale, rotation }
    }

    #[test]
    fn cache_insert_and_get() {
        let mut cache = RasterCache::new(10);
        let key = RasterKey::new(0, &transform(1.0, Rotation::R0));

        cache.insert(key.clone(), RasterSurface::new(4, 4));

        assert!(cache.contains(&key));
        assert!(cache.get(&key).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_distinguishes_rotation_and_scale() {
        let mut cache = RasterCache::new(10);
        cache.insert(
            RasterKey::new(0, &transform(1.0, Rotation::R0)),
            RasterSurface::new(4, 4),
        );

        assert!(!cache.contains(&RasterKey::new(0, &transform(1.0, Rotation::R90))));
        assert!(!cache.contains(&RasterKey::new(0, &transform(1.5, Rotation::R0))));
    }

    #[test]
    fn cache_lru_eviction() {
        let mut cache = RasterCache::new(2);

        for page in 0..3 {
            cache.insert(
                RasterKey::new(page, &transform(1.0, Rotation::R0)),
                RasterSurface::new(4, 4),
            );
        }

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&RasterKey::new(0, &transform(1.0, Rotation::R0))));
        assert!(cache.contains(&RasterKey::new(1, &transform(1.0, Rotation::R0))));
        assert!(cache.contains(&RasterKey::new(2, &transform(1.0, Rotation::R0))));
    }

    #[test]
    fn cache_invalidate_page() {
        let mut cache = RasterCache::new(10);

        cache.insert(
            RasterKey::new(0, &transform(1.0, Rotation::R0)),
            RasterSurface::new(4, 4),
        );
        cache.insert(
            RasterKey::new(0, &transform(2.0, Rotation::R0)),
            RasterSurface::new(8, 8),
        );
        let kept = RasterKey::new(1, &transform(1.0, Rotation::R0));
        cache.insert(kept.clone(), RasterSurface::new(4, 4));

        cache.invalidate_page(0);

        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&kept));
    }
}
