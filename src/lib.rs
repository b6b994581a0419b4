//! `.egh` single-file-component compiler and incremental build engine.
//!
//! The public surface mirrors the inbound API in spec §6.1: [`BuildEngine::compile`],
//! [`BuildEngine::watch`], [`BuildEngine::bundle`], [`BuildEngine::invalidate`],
//! backed by a [`Scheduler`] worker pool, a content-addressed [`BuildCache`],
//! a [`ModuleGraph`], and an [`Invalidator`] file watcher.

pub mod ast;
pub mod bundler;
pub mod cache;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod hashing;
pub mod invalidator;
pub mod lexer;
pub mod module_graph;
pub mod parser;
pub mod reactivity;
pub mod scheduler;
pub mod source_store;
pub mod span;

use bundler::{Bundler, Manifest, ModuleSource};
use cache::BuildCache;
use config::EghConfig;
use diagnostics::Diagnostic;
use hashing::ContentHash;
use invalidator::{InvalidationBatch, Invalidator};
use module_graph::ModuleGraph;
use scheduler::Scheduler;
use source_store::{component_name, SourcePath, SourceStore};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The result of compiling one component, per spec §6.1.
pub struct CompileResult {
    pub module_bytes: Vec<u8>,
    pub sourcemap_bytes: Vec<u8>,
    pub diagnostics: Vec<Diagnostic>,
    pub exports: Vec<String>,
    pub imports: Vec<String>,
    pub content_hash: ContentHash,
}

/// Owns the long-lived services for one project: source store, module
/// graph, build cache, and scheduler. Construct once per `egh.toml`.
pub struct BuildEngine {
    config: EghConfig,
    root: std::path::PathBuf,
    source_store: Arc<SourceStore>,
    module_graph: Arc<ModuleGraph>,
    epoch: Arc<AtomicU64>,
    scheduler: Scheduler,
}

impl BuildEngine {
    pub fn new(root: impl AsRef<Path>, config: EghConfig) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let source_store = Arc::new(SourceStore::new());
        let module_graph = Arc::new(ModuleGraph::new());
        let cache = Arc::new(BuildCache::new(
            root.join(&config.build.cache_dir),
            config.build.cache_byte_budget,
        ));
        let epoch = Arc::new(AtomicU64::new(0));
        let scheduler = Scheduler::new(
            config.worker_count(),
            source_store.clone(),
            module_graph.clone(),
            cache,
            epoch.clone(),
        )?;
        Ok(Self {
            config,
            root,
            source_store,
            module_graph,
            epoch,
            scheduler,
        })
    }

    /// `compile(path) -> CompileResult` (spec §6.1). Synchronous: every
    /// stage is CPU work dispatched onto the scheduler's worker pool, so
    /// there is no I/O-bound await point worth modeling as a `Future`.
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    pub fn compile(&self, path: &Path) -> anyhow::Result<CompileResult> {
        let source_path = SourcePath::canonicalize(path)?;
        let name = component_name(&source_path);
        let outcome = self.scheduler.compile_path(source_path.clone(), &name);

        let exports: Vec<String> = outcome
            .ast
            .as_ref()
            .map(|ast| codegen::module::exported_symbols(&ast.name.name))
            .unwrap_or_default();
        let imports = outcome
            .ast
            .as_ref()
            .map(|ast| ast.imports.iter().map(|i| i.source.clone()).collect())
            .unwrap_or_default();

        if outcome.degraded {
            tracing::warn!(path = %path.display(), "compilation degraded, retaining last good output");
        }

        if outcome.ast.is_some() {
            if let Some(id) = self.module_graph.id_of(&source_path) {
                let exports_hash =
                    hashing::fold(exports.iter().map(|e| ContentHash::of(e.as_bytes())));
                let mut attrs = self.module_graph.attrs(id).unwrap_or_default();
                attrs.exports_hash = Some(exports_hash);
                self.module_graph.set_attrs(id, attrs);
            }
        }

        Ok(CompileResult {
            module_bytes: outcome.module_js.unwrap_or_default().into_bytes(),
            sourcemap_bytes: outcome.sourcemap_bytes,
            diagnostics: outcome.diagnostics,
            exports,
            imports,
            content_hash: outcome.content_hash,
        })
    }

    /// `watch(roots, on_event)` (spec §6.1): begins file watching under
    /// `roots`; `on_event` receives each coalesced `InvalidationBatch`.
    pub fn watch(
        &self,
        roots: &[std::path::PathBuf],
        mut on_event: impl FnMut(InvalidationBatch) + Send + 'static,
    ) -> anyhow::Result<Vec<Invalidator>> {
        let mut handles = Vec::new();
        for root in roots {
            let (invalidator, rx) =
                Invalidator::spawn(root, self.module_graph.clone(), self.epoch.clone())?;
            std::thread::spawn(move || {
                while let Ok(batch) = rx.recv() {
                    on_event(batch);
                }
            });
            handles.push(invalidator);
        }
        Ok(handles)
    }

    /// `bundle(routes) -> Manifest` (spec §6.1).
    pub fn bundle(&self, routes: &[(String, std::path::PathBuf)]) -> anyhow::Result<Manifest> {
        let mut bundler = Bundler::new(self.module_graph.clone());
        let mut roots = Vec::new();
        let mut sources = HashMap::new();
        for (route, path) in routes {
            let source_path = SourcePath::canonicalize(path)?;
            let result = self.compile(path)?;
            sources.insert(
                source_path.clone(),
                ModuleSource {
                    path: source_path.clone(),
                    js: String::from_utf8_lossy(&result.module_bytes).into_owned(),
                    exports: result.exports,
                },
            );
            roots.push((route.clone(), source_path));
        }
        Ok(bundler.partition(&roots, &sources))
    }

    /// `invalidate(paths)` (spec §6.1): forces revalidation without a
    /// file-system signal.
    pub fn invalidate(&self, paths: &[std::path::PathBuf]) -> anyhow::Result<()> {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        for path in paths {
            let source_path = SourcePath::canonicalize(path)?;
            self.source_store.invalidate(&source_path);
        }
        Ok(())
    }

    pub fn config(&self) -> &EghConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Installs the project's `tracing` subscriber (spec §3.3): env-filter plus
/// the default fmt layer.
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
