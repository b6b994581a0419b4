//! File-system invalidation (spec §4.9): consumes raw `notify` events on a
//! dedicated thread, classifies them, coalesces bursts over a 20 ms window,
//! and publishes batches over a `crossbeam-channel` bounded channel.
//! `notify` and `crossbeam-channel` are drawn from the `oxidized` sibling
//! repo's file-watching/concurrency stack.

use crate::codegen::module::exported_symbols;
use crate::hashing::{self, ContentHash};
use crate::module_graph::ModuleGraph;
use crate::source_store::SourcePath;
use crossbeam_channel::{bounded, Receiver, Sender};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum FsChange {
    Modified(SourcePath),
    Created(SourcePath),
    Deleted(SourcePath),
    Renamed(SourcePath, SourcePath),
}

#[derive(Debug, Clone)]
pub struct InvalidationBatch {
    pub epoch: u64,
    pub affected: HashSet<SourcePath>,
    pub missing_imports: HashSet<SourcePath>,
}

pub const COALESCE_WINDOW: Duration = Duration::from_millis(20);

pub struct Invalidator {
    _watcher: RecommendedWatcher,
    epoch: Arc<AtomicU64>,
}

impl Invalidator {
    /// Spawns the watcher thread rooted at `root` and returns the
    /// invalidator handle plus a receiver of coalesced batches.
    pub fn spawn(
        root: &Path,
        module_graph: Arc<ModuleGraph>,
        epoch: Arc<AtomicU64>,
    ) -> notify::Result<(Self, Receiver<InvalidationBatch>)> {
        let (raw_tx, raw_rx) = bounded::<Event>(1024);
        let (batch_tx, batch_rx) = bounded::<InvalidationBatch>(64);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = raw_tx.send(event);
            }
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        let epoch_for_thread = epoch.clone();
        std::thread::spawn(move || {
            coalesce_loop(raw_rx, batch_tx, module_graph, epoch_for_thread);
        });

        Ok((
            Self {
                _watcher: watcher,
                epoch,
            },
            batch_rx,
        ))
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }
}

fn coalesce_loop(
    raw_rx: Receiver<Event>,
    batch_tx: Sender<InvalidationBatch>,
    module_graph: Arc<ModuleGraph>,
    epoch: Arc<AtomicU64>,
) {
    loop {
        let Ok(first) = raw_rx.recv() else { return };
        let mut pending = vec![first];
        let deadline = std::time::Instant::now() + COALESCE_WINDOW;
        while let Ok(remaining) = deadline.checked_duration_since(std::time::Instant::now()) {
            match raw_rx.recv_timeout(remaining) {
                Ok(ev) => pending.push(ev),
                Err(_) => break,
            }
        }

        let new_epoch = epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let mut affected = HashSet::new();
        let mut missing_imports = HashSet::new();

        for event in pending {
            for change in classify(&event) {
                apply_change(change, &module_graph, &mut affected, &mut missing_imports);
            }
        }

        let _ = batch_tx.send(InvalidationBatch {
            epoch: new_epoch,
            affected,
            missing_imports,
        });
    }
}

fn classify(event: &Event) -> Vec<FsChange> {
    let paths: Vec<SourcePath> = event
        .paths
        .iter()
        .filter_map(|p| SourcePath::canonicalize(p).ok())
        .collect();
    match event.kind {
        EventKind::Create(_) => paths.into_iter().map(FsChange::Created).collect(),
        EventKind::Remove(_) => paths.into_iter().map(FsChange::Deleted).collect(),
        EventKind::Modify(_) => paths.into_iter().map(FsChange::Modified).collect(),
        _ => Vec::new(),
    }
}

/// Applies one classified change to the running `affected`/`missing_imports`
/// sets per the rules in spec §4.9.
fn apply_change(
    change: FsChange,
    module_graph: &ModuleGraph,
    affected: &mut HashSet<SourcePath>,
    missing_imports: &mut HashSet<SourcePath>,
) {
    match change {
        FsChange::Modified(path) => {
            affected.insert(path.clone());
            if exports_changed(&path, module_graph) {
                affected.extend(module_graph.dependents_transitive(&path));
            }
        }
        FsChange::Created(path) => {
            affected.insert(path);
        }
        FsChange::Deleted(path) => {
            affected.insert(path.clone());
            let dependents = module_graph.dependents_transitive(&path);
            affected.extend(dependents.iter().cloned());
            missing_imports.extend(dependents);
            module_graph.evict(&path);
        }
        FsChange::Renamed(from, to) => {
            apply_change(FsChange::Deleted(from), module_graph, affected, missing_imports);
            apply_change(FsChange::Created(to), module_graph, affected, missing_imports);
        }
    }
}

/// Restricts `Modified` propagation to the direct file unless the exported
/// surface changed (spec §4.9): compares a freshly-derived exports hash
/// against the one recorded on the module's last `compile`. A module with
/// no recorded attrs (never compiled, or compiled before this field
/// existed) is treated as changed, since there's nothing safe to compare
/// against.
fn exports_changed(path: &SourcePath, module_graph: &ModuleGraph) -> bool {
    let name = crate::source_store::component_name(path);
    let fresh_hash = hashing::fold(
        exported_symbols(&name)
            .iter()
            .map(|e| ContentHash::of(e.as_bytes())),
    );
    let Some(id) = module_graph.id_of(path) else {
        return true;
    };
    match module_graph.attrs(id).and_then(|a| a.exports_hash) {
        Some(recorded) => recorded != fresh_hash,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module_graph::ModuleAttrs;

    #[test]
    fn modified_change_includes_transitive_dependents() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.egh");
        let b = dir.path().join("b.egh");
        std::fs::write(&a, "").unwrap();
        std::fs::write(&b, "").unwrap();
        let a_path = SourcePath::canonicalize(&a).unwrap();
        let b_path = SourcePath::canonicalize(&b).unwrap();

        let graph = ModuleGraph::new();
        graph.upsert(&a_path, &[b_path.clone()]);

        let mut affected = HashSet::new();
        let mut missing = HashSet::new();
        apply_change(FsChange::Modified(b_path.clone()), &graph, &mut affected, &mut missing);

        assert!(affected.contains(&b_path));
        assert!(affected.contains(&a_path));
    }

    #[test]
    fn deleted_change_flags_missing_imports() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.egh");
        let b = dir.path().join("b.egh");
        std::fs::write(&a, "").unwrap();
        std::fs::write(&b, "").unwrap();
        let a_path = SourcePath::canonicalize(&a).unwrap();
        let b_path = SourcePath::canonicalize(&b).unwrap();

        let graph = ModuleGraph::new();
        graph.upsert(&a_path, &[b_path.clone()]);

        let mut affected = HashSet::new();
        let mut missing = HashSet::new();
        apply_change(FsChange::Deleted(b_path), &graph, &mut affected, &mut missing);

        assert!(missing.contains(&a_path));
    }

    #[test]
    fn modified_change_with_unchanged_exports_does_not_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.egh");
        let b = dir.path().join("b.egh");
        std::fs::write(&a, "").unwrap();
        std::fs::write(&b, "").unwrap();
        let a_path = SourcePath::canonicalize(&a).unwrap();
        let b_path = SourcePath::canonicalize(&b).unwrap();

        let graph = ModuleGraph::new();
        let b_id = graph.upsert(&b_path, &[]);
        graph.upsert(&a_path, &[b_path.clone()]);

        let name = crate::source_store::component_name(&b_path);
        let hash = crate::hashing::fold(
            exported_symbols(&name)
                .iter()
                .map(|e| crate::hashing::ContentHash::of(e.as_bytes())),
        );
        graph.set_attrs(
            b_id,
            ModuleAttrs {
                exports_hash: Some(hash),
                ..Default::default()
            },
        );

        let mut affected = HashSet::new();
        let mut missing = HashSet::new();
        apply_change(FsChange::Modified(b_path.clone()), &graph, &mut affected, &mut missing);

        assert!(affected.contains(&b_path));
        assert!(!affected.contains(&a_path));
    }
}
