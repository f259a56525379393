use std::{path::{Path, PathBuf}, sync::Arc};

use ahash::AHashMap;
use anyhow::{Context, Result, anyhow};

use crate::common::write_atomic;

/// Read-only access to stored files by store-relative path, e.g.
/// "geocollections.json", "processed/places.3f9a.bin".
pub trait DataSource: Send + Sync {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>>;
    fn has(&self, rel: &str) -> bool;
}

/// Write access to stored files by store-relative path.
pub trait DataSink: Send + Sync {
    fn put(&mut self, rel: &str, bytes: &[u8]) -> Result<()>;
    fn remove(&mut self, rel: &str) -> Result<()>;
}

/// A store that can be both read and written.
pub trait DataStore: DataSource + DataSink {}

impl<T: DataSource + DataSink> DataStore for T {}

/// Directory-backed store; every write is atomic.
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    fn full(&self, rel: &str) -> PathBuf { self.root.join(rel) }
}

impl DataSource for DiskStore {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>> {
        let path = self.full(rel);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Arc::from(bytes))
    }

    fn has(&self, rel: &str) -> bool { self.full(rel).exists() }
}

impl DataSink for DiskStore {
    fn put(&mut self, rel: &str, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.full(rel), bytes)
    }

    fn remove(&mut self, rel: &str) -> Result<()> {
        let path = self.full(rel);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

/// In-memory store, mostly for tests and throwaway sessions.
#[derive(Default, Clone)]
pub struct MemStore {
    pub(crate) files: AHashMap<String, Arc<[u8]>>,
}

impl MemStore {
    pub fn new() -> Self { Self::default() }
}

impl DataSource for MemStore {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>> {
        self.files.get(rel).cloned()
            .ok_or_else(|| anyhow!("missing stored file: {rel}"))
    }

    fn has(&self, rel: &str) -> bool { self.files.contains_key(rel) }
}

impl DataSink for MemStore {
    fn put(&mut self, rel: &str, bytes: &[u8]) -> Result<()> {
        self.files.insert(rel.to_string(), Arc::from(bytes.to_vec()));
        Ok(())
    }

    fn remove(&mut self, rel: &str) -> Result<()> {
        self.files.remove(rel);
        Ok(())
    }
}
