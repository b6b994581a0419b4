//! Project configuration (`egh.toml` / `Egh.toml`), spec §3.2.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EghConfig {
    #[serde(default)]
    pub package: PackageConfig,
    #[serde(default)]
    pub build: BuildConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PackageConfig {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default)]
    pub route_roots: Vec<String>,
    /// 0 means "use all available cores" (spec §4.8).
    #[serde(default)]
    pub worker_threads: usize,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "default_cache_byte_budget")]
    pub cache_byte_budget: u64,
    #[serde(default = "default_stage_timeout_ms")]
    pub stage_timeout_ms: u64,
    #[serde(default = "default_coalesce_window_ms")]
    pub coalesce_window_ms: u64,
}

fn default_root() -> String {
    "src".to_string()
}
fn default_cache_dir() -> String {
    ".egh-cache".to_string()
}
fn default_cache_byte_budget() -> u64 {
    512 * 1024 * 1024
}
fn default_stage_timeout_ms() -> u64 {
    30_000
}
fn default_coalesce_window_ms() -> u64 {
    20
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            route_roots: Vec::new(),
            worker_threads: 0,
            cache_dir: default_cache_dir(),
            cache_byte_budget: default_cache_byte_budget(),
            stage_timeout_ms: default_stage_timeout_ms(),
            coalesce_window_ms: default_coalesce_window_ms(),
        }
    }
}

impl EghConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse {}: {e}", path.display()))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("failed to serialize config: {e}"))?;
        fs::write(path, content).map_err(|e| format!("failed to write {}: {e}", path.display()))
    }

    pub fn worker_count(&self) -> usize {
        if self.build.worker_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.build.worker_threads
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_missing_build_section() {
        let cfg: EghConfig = toml::from_str("[package]\nname = \"demo\"\n").unwrap();
        assert_eq!(cfg.build.root, "src");
        assert_eq!(cfg.build.coalesce_window_ms, 20);
        assert_eq!(cfg.build.worker_threads, 0);
    }

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("egh.toml");
        let mut cfg = EghConfig::default();
        cfg.package.name = "demo".into();
        cfg.package.version = "0.1.0".into();
        cfg.save_to_file(&path).unwrap();
        let loaded = EghConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.package.name, "demo");
    }
}
