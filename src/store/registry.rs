use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Serialize, de::DeserializeOwned};

use super::{DataSink, DataSource};

/// Named metadata records persisted as one JSON document.
///
/// The document is a list of `[key, value]` entries so that compound keys
/// (e.g. `(first, second)` intersection names) survive the round trip.
#[derive(Debug, Clone)]
pub struct Registry<K, V> {
    file: &'static str,
    entries: BTreeMap<K, V>,
}

impl<K, V> Registry<K, V>
where
    K: Ord + Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    pub(crate) fn empty(file: &'static str) -> Self {
        Self { file, entries: BTreeMap::new() }
    }

    /// Load the registry document, or start empty if the store has none.
    pub(crate) fn load<S: DataSource + ?Sized>(src: &S, file: &'static str) -> Result<Self> {
        if !src.has(file) {
            return Ok(Self::empty(file));
        }
        let bytes = src.get(file)
            .with_context(|| format!("Failed to read {file}"))?;
        let entries: Vec<(K, V)> = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse {file}"))?;
        Ok(Self { file, entries: entries.into_iter().collect() })
    }

    pub(crate) fn flush<S: DataSink + ?Sized>(&self, sink: &mut S) -> Result<()> {
        let entries: Vec<(&K, &V)> = self.entries.iter().collect();
        let bytes = serde_json::to_vec_pretty(&entries)
            .with_context(|| format!("Failed to serialize {}", self.file))?;
        sink.put(self.file, &bytes)
            .with_context(|| format!("Failed to write {}", self.file))
    }
}

impl<K: Ord, V> Registry<K, V> {
    pub fn get(&self, key: &K) -> Option<&V> { self.entries.get(key) }

    pub fn contains(&self, key: &K) -> bool { self.entries.contains_key(key) }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> { self.entries.iter() }

    pub fn keys(&self) -> impl Iterator<Item = &K> { self.entries.keys() }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub(crate) fn get_mut(&mut self, key: &K) -> Option<&mut V> { self.entries.get_mut(key) }

    pub(crate) fn insert(&mut self, key: K, value: V) -> Option<V> { self.entries.insert(key, value) }

    pub(crate) fn remove(&mut self, key: &K) -> Option<V> { self.entries.remove(key) }
}
