//! Reactivity analysis: dependency graph construction, cycle detection,
//! deterministic scheduling order (spec §4.4).

pub mod analyzer;
pub mod graph;

pub use analyzer::{analyze, AnalysisResult};
pub use graph::{DependencyGraph, NodeId, NodeKind};
