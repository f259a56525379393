use std::hash::Hash;

use ahash::AHashMap;

/// Dense row or column positions for a matrix axis.
///
/// Built once and shared by every matrix in a chain whose axes must line up.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpace<K: Hash + Eq> {
    keys: Vec<K>,
    positions: AHashMap<K, usize>,
}

impl<K: Hash + Eq + Clone + Ord> IndexSpace<K> {
    /// Space over the distinct keys, in ascending order.
    pub fn from_sorted(keys: impl IntoIterator<Item = K>) -> Self {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();
        let positions = keys.iter().cloned().enumerate().map(|(i, k)| (k, i)).collect();
        Self { keys, positions }
    }
}

impl<K: Hash + Eq> IndexSpace<K> {
    pub fn get(&self, key: &K) -> Option<usize> { self.positions.get(key).copied() }

    pub fn key(&self, position: usize) -> Option<&K> { self.keys.get(position) }

    pub fn keys(&self) -> &[K] { &self.keys }

    pub fn contains(&self, key: &K) -> bool { self.positions.contains_key(key) }

    pub fn len(&self) -> usize { self.keys.len() }

    pub fn is_empty(&self) -> bool { self.keys.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_follow_sorted_order() {
        let space = IndexSpace::from_sorted([7u32, 3, 7, 5]);
        assert_eq!(space.keys(), &[3, 5, 7]);
        assert_eq!(space.get(&7), Some(2));
        assert_eq!(space.get(&4), None);
        assert_eq!(space.key(1), Some(&5));
    }
}
