use std::{fs::File, io::{Read, Write}, path::{Path, PathBuf}};

use anyhow::{Context, Result, bail};
use regex::Regex;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

/// Create the directory if it doesn’t exist; error if a non-directory exists there.
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            bail!("Path exists but is not a directory: {}", path.display());
        }
    } else {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Write-then-rename wrapper for atomic outputs.
#[cfg_attr(not(feature = "remote"), allow(dead_code))]
pub(crate) struct PendingWrite {
    target: PathBuf,
    tmp: Option<NamedTempFile>,
}

#[cfg_attr(not(feature = "remote"), allow(dead_code))]
impl PendingWrite {
    /// Open a temporary file next to `target`.
    pub(crate) fn open(target: &Path, force: bool) -> Result<Self> {
        let parent = target.parent().unwrap_or(Path::new("."));
        ensure_dir_exists(parent)?;
        if !force && target.exists() {
            bail!("Refusing to overwrite existing file: {}", target.display());
        }
        let tmp = NamedTempFile::new_in(parent)
            .context("create temp file")?;

        Ok(Self { target: target.to_path_buf(), tmp: Some(tmp) })
    }

    /// Rename the temporary file onto the target.
    pub(crate) fn finalize(mut self) -> Result<PathBuf> {
        let Some(tmp) = self.tmp.take() else {
            bail!("{} already finalized", self.target.display());
        };
        tmp.as_file().sync_all().ok(); // best-effort fsync file
        tmp.persist(&self.target)
            .with_context(|| format!("rename to {}", self.target.display()))?;
        if let Some(dir) = self.target.parent() {
            let _ = File::open(dir).and_then(|f| f.sync_all());
        }
        Ok(self.target)
    }

    fn file(&mut self) -> std::io::Result<&mut NamedTempFile> {
        self.tmp.as_mut()
            .ok_or_else(|| std::io::Error::other("pending write already finalized"))
    }
}

impl Write for PendingWrite {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> { self.file()?.write(buf) }

    fn flush(&mut self) -> std::io::Result<()> { self.file()?.flush() }
}

/// Atomically replace `target` with `bytes`.
pub(crate) fn write_atomic(target: &Path, bytes: &[u8]) -> Result<()> {
    let mut sink = PendingWrite::open(target, true)?;
    sink.write_all(bytes)
        .with_context(|| format!("write {}", target.display()))?;
    sink.finalize()?;
    Ok(())
}

/// Hex SHA-256 of the file contents.
pub(crate) fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .with_context(|| format!("open for hash {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 1 << 16];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub(crate) fn sha256_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Filesystem-safe, collision-free file stem for an object name:
/// a slug of the name plus the first hex digits of its hash.
pub(crate) fn safe_filename(name: &str) -> Result<String> {
    let re = Regex::new(r"[^\w\-\.]+")?;
    let slug = re.replace_all(name, "-");
    let slug = slug.trim_matches('-');
    Ok(format!("{}.{}", slug, &sha256_bytes(name.as_bytes())[..16]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_filename_strips_unsafe_characters() {
        let name = safe_filename("places ⇄ regions/v2").unwrap();
        let (slug, hash) = name.rsplit_once('.').unwrap();
        assert_eq!(slug, "places-regions-v2");
        assert_eq!(hash.len(), 16);
    }

    #[test]
    fn safe_filename_distinguishes_similar_names() {
        assert_ne!(safe_filename("a b").unwrap(), safe_filename("a/b").unwrap());
    }

    #[test]
    fn pending_write_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("out.bin");
        write_atomic(&target, b"first").unwrap();
        write_atomic(&target, b"second").unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"second");
        assert!(PendingWrite::open(&target, false).is_err());
    }

    #[test]
    fn hashes_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::write(&path, b"abc").unwrap();
        let expected = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        assert_eq!(sha256_file(&path).unwrap(), expected);
        assert_eq!(sha256_bytes(b"abc"), expected);
    }
}
