//! Worker pool (spec §4.8): sized via `rayon`, concurrent compiles of the
//! same path joined onto a single in-flight computation via a per-path
//! `DashMap` of mutexes, per-file stage ordering Lex → Parse → Analyze →
//! Gen, epoch-tagged cooperative cancellation. No async runtime — every
//! stage is synchronous CPU work, and `rayon` is the idiomatic choice
//! already present in this lineage's sibling compiler code for "parallel
//! compile the independent parts".

use crate::ast::ComponentAst;
use crate::cache::BuildCache;
use crate::codegen;
use crate::diagnostics::Diagnostic;
use crate::hashing::{self, ContentHash};
use crate::module_graph::ModuleGraph;
use crate::parser::parse_component;
use crate::reactivity::{self, AnalysisResult};
use crate::source_store::{SourcePath, SourceStore};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Lex,
    Parse,
    Analyze,
    Gen,
}

pub struct CompileOutcome {
    pub epoch: u64,
    pub ast: Option<ComponentAst>,
    pub module_js: Option<String>,
    pub sourcemap_bytes: Vec<u8>,
    pub diagnostics: Vec<Diagnostic>,
    pub content_hash: ContentHash,
    pub degraded: bool,
}

/// A toolchain-version tag folded into every `input_fingerprint`
/// (spec §3 `CacheEntry`), so a compiler upgrade invalidates stale cache
/// entries without an explicit migration.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct Scheduler {
    pool: rayon::ThreadPool,
    source_store: Arc<SourceStore>,
    module_graph: Arc<ModuleGraph>,
    cache: Arc<BuildCache>,
    epoch: Arc<AtomicU64>,
    in_flight: DashMap<SourcePath, Arc<Mutex<()>>>,
}

impl Scheduler {
    pub fn new(
        worker_threads: usize,
        source_store: Arc<SourceStore>,
        module_graph: Arc<ModuleGraph>,
        cache: Arc<BuildCache>,
        epoch: Arc<AtomicU64>,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if worker_threads > 0 {
            builder = builder.num_threads(worker_threads);
        }
        Ok(Self {
            pool: builder.build()?,
            source_store,
            module_graph,
            cache,
            epoch,
            in_flight: DashMap::new(),
        })
    }

    /// Runs the full Lex → Parse → Analyze → Gen pipeline for one file on
    /// the worker pool, checking the task's recorded epoch at each stage
    /// boundary and bailing out with `degraded: true` if a newer epoch has
    /// since started (spec §4.8 cancellation, §5 ordering).
    pub fn compile_path(&self, path: SourcePath, component_name: &str) -> CompileOutcome {
        let epoch_at_submit = self.epoch.load(Ordering::Acquire);
        self.pool.install(|| self.run_pipeline(path, component_name, epoch_at_submit))
    }

    fn cancelled(&self, epoch_at_submit: u64) -> bool {
        self.epoch.load(Ordering::Acquire) != epoch_at_submit
    }

    /// Joins concurrent `compile_path` calls for the same file onto one
    /// in-flight computation: a second caller blocks on the first's lock
    /// rather than racing it through Lex/Parse/Analyze/Gen independently
    /// (spec §4.8 request coalescing).
    fn run_pipeline(&self, path: SourcePath, component_name: &str, epoch_at_submit: u64) -> CompileOutcome {
        let lock = self
            .in_flight
            .entry(path.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock();

        let blob = match self.source_store.read(&path) {
            Ok(blob) => blob,
            Err(e) => {
                return CompileOutcome {
                    epoch: epoch_at_submit,
                    ast: None,
                    module_js: None,
                    sourcemap_bytes: Vec::new(),
                    diagnostics: vec![Diagnostic::error(
                        crate::diagnostics::DiagnosticCode::IoError,
                        e.to_string(),
                    )],
                    content_hash: ContentHash::of(&[]),
                    degraded: true,
                };
            }
        };

        if self.cancelled(epoch_at_submit) {
            return self.degraded_outcome(epoch_at_submit, blob.content_hash);
        }

        // Parse (lex happens inside parse_component).
        let (mut ast, mut diagnostics) = match parse_component(path.clone(), component_name, &blob.bytes) {
            Ok(r) => r,
            Err(stage_err) => {
                return CompileOutcome {
                    epoch: epoch_at_submit,
                    ast: None,
                    module_js: None,
                    sourcemap_bytes: Vec::new(),
                    diagnostics: vec![Diagnostic::error(
                        crate::diagnostics::DiagnosticCode::ParseError,
                        stage_err.to_string(),
                    )],
                    content_hash: blob.content_hash,
                    degraded: true,
                };
            }
        };

        if self.cancelled(epoch_at_submit) {
            return self.degraded_outcome(epoch_at_submit, blob.content_hash);
        }

        // Analyze.
        let analysis: AnalysisResult = reactivity::analyze(&path, &mut ast);
        diagnostics.extend(analysis.diagnostics.clone());
        let has_cycle = analysis
            .diagnostics
            .iter()
            .any(|d| d.code == crate::diagnostics::DiagnosticCode::ReactiveCycle);

        if self.cancelled(epoch_at_submit) {
            return self.degraded_outcome(epoch_at_submit, blob.content_hash);
        }

        // Gen — skipped entirely on a cyclic graph (spec §4.4 step 3).
        let mut sourcemap_bytes = Vec::new();
        let module_js = if has_cycle {
            None
        } else {
            let fingerprint = hashing::fold([
                ContentHash::of(b"gen"),
                blob.content_hash,
                ContentHash::of(COMPILER_VERSION.as_bytes()),
            ]);
            let map_fingerprint = hashing::fold([fingerprint, ContentHash::of(b"sourcemap")]);
            let cached = self.cache.get(fingerprint).ok().flatten();
            let cached_map = self.cache.get(map_fingerprint).ok().flatten();
            if let (Some(entry), Some(map_entry)) = (cached, cached_map) {
                sourcemap_bytes = map_entry.output_bytes.to_vec();
                Some(String::from_utf8_lossy(&entry.output_bytes).into_owned())
            } else {
                let generated = codegen::generate(
                    &ast,
                    &analysis,
                    &path.as_path().to_string_lossy(),
                    &blob.bytes,
                    blob.content_hash,
                );
                let _ = self.cache.put(fingerprint, "gen", generated.js.clone().into_bytes());
                let _ = self
                    .cache
                    .put(map_fingerprint, "gen-map", generated.sourcemap.clone());
                sourcemap_bytes = generated.sourcemap;
                Some(generated.js)
            }
        };

        self.module_graph.upsert(
            &path,
            &ast.imports
                .iter()
                .filter_map(|i| resolve_import(&path, &i.source))
                .collect::<Vec<_>>(),
        );

        CompileOutcome {
            epoch: epoch_at_submit,
            ast: Some(ast),
            module_js,
            sourcemap_bytes,
            diagnostics,
            content_hash: blob.content_hash,
            degraded: false,
        }
    }

    fn degraded_outcome(&self, epoch: u64, content_hash: ContentHash) -> CompileOutcome {
        CompileOutcome {
            epoch,
            ast: None,
            module_js: None,
            sourcemap_bytes: Vec::new(),
            diagnostics: Vec::new(),
            content_hash,
            degraded: true,
        }
    }
}

/// Resolves a relative import specifier against the importer's directory.
/// Returns `None` for specifiers that don't point at a file on disk yet
/// (the Invalidator's `Created` handling covers those resolving later).
fn resolve_import(importer: &SourcePath, specifier: &str) -> Option<SourcePath> {
    let base = importer.as_path().parent()?;
    let candidate = base.join(specifier);
    let candidate = if candidate.extension().is_none() {
        candidate.with_extension("egh")
    } else {
        candidate
    };
    SourcePath::canonicalize(&candidate).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_scheduler() -> (Scheduler, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SourceStore::new());
        let graph = Arc::new(ModuleGraph::new());
        let cache = Arc::new(BuildCache::new(dir.path().join("cache"), 1024 * 1024));
        let epoch = Arc::new(AtomicU64::new(0));
        let scheduler = Scheduler::new(1, store, graph, cache, epoch).unwrap();
        (scheduler, dir)
    }

    #[test]
    fn compiles_well_formed_component() {
        let (scheduler, dir) = new_scheduler();
        let p = dir.path().join("counter.egh");
        std::fs::write(&p, "<script>~count = 0</script><template><div>{count}</div></template>").unwrap();
        let path = SourcePath::canonicalize(&p).unwrap();
        let outcome = scheduler.compile_path(path, "counter");
        assert!(!outcome.degraded);
        assert!(outcome.module_js.is_some());
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn concurrent_compiles_of_the_same_path_are_joined() {
        let (scheduler, dir) = new_scheduler();
        let p = dir.path().join("counter.egh");
        std::fs::write(&p, "<script>~count = 0</script><template><div>{count}</div></template>").unwrap();
        let path = SourcePath::canonicalize(&p).unwrap();

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let path = path.clone();
                    s.spawn(|| scheduler.compile_path(path, "counter"))
                })
                .collect();
            for h in handles {
                let outcome = h.join().unwrap();
                assert!(!outcome.degraded);
                assert!(outcome.module_js.is_some());
            }
        });
    }

    #[test]
    fn cyclic_component_skips_gen() {
        let (scheduler, dir) = new_scheduler();
        let p = dir.path().join("cyc.egh");
        std::fs::write(&p, "<script>a => b + 1\nb => a + 1</script>").unwrap();
        let path = SourcePath::canonicalize(&p).unwrap();
        let outcome = scheduler.compile_path(path, "cyc");
        assert!(outcome.module_js.is_none());
        assert!(outcome
            .diagnostics
            .iter()
            .any(|d| d.code == crate::diagnostics::DiagnosticCode::ReactiveCycle));
    }
}
