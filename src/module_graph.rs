//! Whole-project module graph (spec §3, §4.6): arena-indexed nodes, forward
//! `imports` edges and a reverse `dependents` index kept consistent inside
//! `upsert`'s single critical section. Grounded on the teacher's
//! `module_system.rs` discovery/registration code, generalized from
//! filesystem-directory modules to import-graph modules.

use crate::hashing::ContentHash;
use crate::source_store::SourcePath;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

#[derive(Debug, Clone, Default)]
pub struct ModuleAttrs {
    pub content_hash: Option<ContentHash>,
    pub ast_hash: Option<ContentHash>,
    pub chunk_hash: Option<ContentHash>,
    pub exports_hash: Option<ContentHash>,
}

struct Inner {
    arena: Vec<SourcePath>,
    by_path: HashMap<SourcePath, ModuleId>,
    imports: HashMap<ModuleId, Vec<ModuleId>>,
    dependents: HashMap<ModuleId, Vec<ModuleId>>,
    attrs: HashMap<ModuleId, ModuleAttrs>,
}

/// Readers-writer discipline per spec §5: many concurrent readers during
/// stages, a single writer holding the lock only across `upsert`'s
/// edge-diff, never across a stage.
pub struct ModuleGraph {
    inner: RwLock<Inner>,
}

impl Default for ModuleGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                arena: Vec::new(),
                by_path: HashMap::new(),
                imports: HashMap::new(),
                dependents: HashMap::new(),
                attrs: HashMap::new(),
            }),
        }
    }

    fn id_for(inner: &mut Inner, path: &SourcePath) -> ModuleId {
        if let Some(&id) = inner.by_path.get(path) {
            return id;
        }
        let id = ModuleId(inner.arena.len() as u32);
        inner.arena.push(path.clone());
        inner.by_path.insert(path.clone(), id);
        inner.imports.entry(id).or_default();
        inner.dependents.entry(id).or_default();
        id
    }

    /// Atomically diffs `path`'s outgoing edges against `new_imports` and
    /// updates the reverse index to match (spec §4.6).
    pub fn upsert(&self, path: &SourcePath, new_imports: &[SourcePath]) -> ModuleId {
        let mut inner = self.inner.write();
        let id = Self::id_for(&mut inner, path);
        let new_ids: Vec<ModuleId> = new_imports
            .iter()
            .map(|p| Self::id_for(&mut inner, p))
            .collect();

        let old_ids = inner.imports.get(&id).cloned().unwrap_or_default();
        let old_set: HashSet<ModuleId> = old_ids.iter().copied().collect();
        let new_set: HashSet<ModuleId> = new_ids.iter().copied().collect();

        for removed in old_set.difference(&new_set) {
            if let Some(dents) = inner.dependents.get_mut(removed) {
                dents.retain(|&d| d != id);
            }
        }
        for added in new_set.difference(&old_set) {
            inner.dependents.entry(*added).or_default().push(id);
        }

        inner.imports.insert(id, new_ids);
        id
    }

    pub fn set_attrs(&self, id: ModuleId, attrs: ModuleAttrs) {
        self.inner.write().attrs.insert(id, attrs);
    }

    pub fn attrs(&self, id: ModuleId) -> Option<ModuleAttrs> {
        self.inner.read().attrs.get(&id).cloned()
    }

    pub fn id_of(&self, path: &SourcePath) -> Option<ModuleId> {
        self.inner.read().by_path.get(path).copied()
    }

    pub fn path_of(&self, id: ModuleId) -> SourcePath {
        self.inner.read().arena[id.0 as usize].clone()
    }

    /// Direct outgoing imports of `path`.
    pub fn imports_of(&self, path: &SourcePath) -> Vec<SourcePath> {
        let inner = self.inner.read();
        let Some(&id) = inner.by_path.get(path) else {
            return Vec::new();
        };
        inner
            .imports
            .get(&id)
            .into_iter()
            .flatten()
            .map(|i| inner.arena[i.0 as usize].clone())
            .collect()
    }

    /// Direct (non-transitive) dependents of `path`.
    pub fn dependents(&self, path: &SourcePath) -> HashSet<SourcePath> {
        let inner = self.inner.read();
        let Some(&id) = inner.by_path.get(path) else {
            return HashSet::new();
        };
        inner
            .dependents
            .get(&id)
            .into_iter()
            .flatten()
            .map(|d| inner.arena[d.0 as usize].clone())
            .collect()
    }

    /// Transitive closure of dependents. Never includes the query node
    /// unless a module-level cycle makes it its own transitive dependent
    /// (spec §4.6 invariant — permitted at module level, flagged for the
    /// bundler, not rejected here).
    pub fn dependents_transitive(&self, path: &SourcePath) -> HashSet<SourcePath> {
        let inner = self.inner.read();
        let Some(&start) = inner.by_path.get(path) else {
            return HashSet::new();
        };
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        let mut result = HashSet::new();
        while let Some(id) = stack.pop() {
            for &dep in inner.dependents.get(&id).into_iter().flatten() {
                if seen.insert(dep) {
                    result.insert(inner.arena[dep.0 as usize].clone());
                    stack.push(dep);
                }
            }
        }
        result
    }

    /// Removes `path` and its edges. Callers must reconcile chunks
    /// referencing it (spec §4.6).
    pub fn evict(&self, path: &SourcePath) {
        let mut inner = self.inner.write();
        let Some(id) = inner.by_path.remove(path) else {
            return;
        };
        inner.attrs.remove(&id);
        let imported = inner.imports.remove(&id).unwrap_or_default();
        for target in imported {
            if let Some(dents) = inner.dependents.get_mut(&target) {
                dents.retain(|&d| d != id);
            }
        }
        inner.dependents.remove(&id);
        for dents in inner.dependents.values_mut() {
            dents.retain(|&d| d != id);
        }
        for imports in inner.imports.values_mut() {
            imports.retain(|&i| i != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(dir: &std::path::Path, name: &str) -> SourcePath {
        let p = dir.join(name);
        std::fs::write(&p, "").unwrap();
        SourcePath::canonicalize(&p).unwrap()
    }

    #[test]
    fn reverse_index_tracks_forward_edges() {
        let dir = tempfile::tempdir().unwrap();
        let a = path(dir.path(), "a.egh");
        let b = path(dir.path(), "b.egh");
        let graph = ModuleGraph::new();
        graph.upsert(&a, &[b.clone()]);
        assert!(graph.dependents(&b).contains(&a));
    }

    #[test]
    fn upsert_diff_removes_stale_reverse_edges() {
        let dir = tempfile::tempdir().unwrap();
        let a = path(dir.path(), "a.egh");
        let b = path(dir.path(), "b.egh");
        let graph = ModuleGraph::new();
        graph.upsert(&a, &[b.clone()]);
        graph.upsert(&a, &[]);
        assert!(!graph.dependents(&b).contains(&a));
    }

    #[test]
    fn transitive_dependents_follow_chain() {
        let dir = tempfile::tempdir().unwrap();
        let a = path(dir.path(), "a.egh");
        let b = path(dir.path(), "b.egh");
        let c = path(dir.path(), "c.egh");
        let graph = ModuleGraph::new();
        graph.upsert(&a, &[b.clone()]);
        graph.upsert(&b, &[c.clone()]);
        assert!(graph.dependents_transitive(&c).contains(&b));
        assert!(graph.dependents_transitive(&c).contains(&a));
    }
}
