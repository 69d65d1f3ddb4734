//! Hash collections used throughout Vellum.
//!
//! Resource reservation tables are keyed by small integer IDs, so the
//! AHash-backed maps are a better fit than the SipHash defaults.

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashmap_insert_and_remove() {
        let mut map = HashMap::new();
        map.insert(7u32, "texture");
        assert_eq!(map.get(&7), Some(&"texture"));
        assert_eq!(map.remove(&7), Some("texture"));
        assert!(map.is_empty());
    }

    #[test]
    fn test_hashset_contains() {
        let mut set = HashSet::new();
        set.insert(42u32);
        assert!(set.contains(&42));
        assert!(!set.contains(&43));
    }
}
