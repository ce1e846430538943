//! Memory tier.
//!
//! A concurrent map from key to decoded image. Entries stay until removed,
//! cleared or dropped by a memory-pressure sweep; there is no size-based
//! eviction.

use std::sync::Arc;

use dashmap::DashMap;

use super::types::CachedImage;

#[derive(Debug, Default)]
pub(crate) struct MemoryTier {
    entries: DashMap<String, Arc<CachedImage>>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<CachedImage>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&self, key: impl Into<String>, image: Arc<CachedImage>) {
        self.entries.insert(key.into(), image);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry. Returns how many there were.
    pub fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    fn image() -> Arc<CachedImage> {
        Arc::new(CachedImage::still(DynamicImage::new_rgb8(2, 2), None))
    }

    #[test]
    fn test_insert_get_remove() {
        let tier = MemoryTier::new();
        assert!(tier.get("a").is_none());

        tier.insert("a", image());
        assert!(tier.contains("a"));
        assert_eq!(tier.get("a").map(|i| i.width()), Some(2));

        assert!(tier.remove("a"));
        assert!(!tier.remove("a"));
        assert_eq!(tier.len(), 0);
    }

    #[test]
    fn test_clear() {
        let tier = MemoryTier::new();
        tier.insert("a", image());
        tier.insert("b", image());

        assert_eq!(tier.clear(), 2);
        assert!(!tier.contains("a"));
    }
}
