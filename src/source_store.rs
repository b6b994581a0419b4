//! Source Store (spec §4.1): canonicalizes paths, reads source, content-hashes.

use crate::diagnostics::StageError;
use crate::hashing::ContentHash;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Canonicalized absolute path; identity of a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourcePath(Arc<PathBuf>);

impl SourcePath {
    pub fn canonicalize(path: impl AsRef<Path>) -> Result<Self, StageError> {
        let canonical = std::fs::canonicalize(&path).map_err(|source| StageError::Io {
            path: SourcePath(Arc::new(path.as_ref().to_path_buf())),
            source,
        })?;
        Ok(Self(Arc::new(canonical)))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn display(&self) -> std::path::Display<'_> {
        self.0.display()
    }
}

impl std::fmt::Display for SourcePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A component's name is derived from its file stem, not its content —
/// shared by the build engine (naming the generated constructor) and the
/// invalidator (recomputing the exported-surface hash without a parse).
pub fn component_name(path: &SourcePath) -> String {
    path.as_path()
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("component")
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStat {
    mtime: SystemTime,
    size: u64,
}

/// `(content_hash, bytes, discovered_at)`. Immutable per hash.
#[derive(Debug, Clone)]
pub struct SourceBlob {
    pub content_hash: ContentHash,
    pub bytes: Arc<str>,
    pub discovered_at: SystemTime,
    stat: FileStat,
}

impl SourceBlob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Caches the last-read blob per path; a stat mismatch (mtime or size)
/// triggers a re-read and re-hash, per spec §4.1. Read is a single stat +
/// read, no partial reads or retries beyond what `StageError::Io` records.
#[derive(Default)]
pub struct SourceStore {
    cache: dashmap::DashMap<SourcePath, SourceBlob>,
}

impl SourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, path: &SourcePath) -> Result<SourceBlob, StageError> {
        let meta = std::fs::metadata(path.as_path()).map_err(|source| StageError::Io {
            path: path.clone(),
            source,
        })?;
        let stat = FileStat {
            mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            size: meta.len(),
        };

        if let Some(cached) = self.cache.get(path) {
            if cached.stat == stat {
                return Ok(cached.clone());
            }
        }

        let raw = std::fs::read(path.as_path()).map_err(|source| StageError::Io {
            path: path.clone(),
            source,
        })?;
        let text = String::from_utf8(raw).map_err(|e| StageError::BadUtf8 {
            byte_offset: e.utf8_error().valid_up_to() as u32,
        })?;
        let content_hash = ContentHash::of(text.as_bytes());
        let blob = SourceBlob {
            content_hash,
            bytes: Arc::from(text),
            discovered_at: SystemTime::now(),
            stat,
        };
        self.cache.insert(path.clone(), blob.clone());
        Ok(blob)
    }

    pub fn invalidate(&self, path: &SourcePath) {
        self.cache.remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_paths_same_bytes_distinct_identity() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.egh");
        let b = dir.path().join("b.egh");
        std::fs::write(&a, "x").unwrap();
        std::fs::write(&b, "x").unwrap();

        let store = SourceStore::new();
        let pa = SourcePath::canonicalize(&a).unwrap();
        let pb = SourcePath::canonicalize(&b).unwrap();
        assert_ne!(pa, pb);

        let ba = store.read(&pa).unwrap();
        let bb = store.read(&pb).unwrap();
        assert_eq!(ba.content_hash, bb.content_hash);
    }

    #[test]
    fn rereads_on_mtime_change() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("a.egh");
        std::fs::write(&p, "one").unwrap();

        let store = SourceStore::new();
        let path = SourcePath::canonicalize(&p).unwrap();
        let first = store.read(&path).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        std::fs::write(&p, "two-longer").unwrap();
        let second = store.read(&path).unwrap();

        assert_ne!(first.content_hash, second.content_hash);
        assert_eq!(&*second.bytes, "two-longer");
    }
}
