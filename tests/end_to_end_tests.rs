//! End-to-end scenarios exercising the full Lex -> Parse -> Analyze -> Gen
//! pipeline through the `BuildEngine` public API.

use egh_build_core::config::EghConfig;
use egh_build_core::diagnostics::{DiagnosticCode, Severity};
use egh_build_core::BuildEngine;
use std::fs;

fn engine_in(dir: &std::path::Path) -> BuildEngine {
    BuildEngine::new(dir, EghConfig::default()).unwrap()
}

#[test]
fn counter_compile_is_deterministic_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counter.egh");
    fs::write(
        &path,
        "<script>\n~count = 0\ndouble => count * 2\nincrement :: { count = count + 1 }\n</script>\n<template><div>{count} {double}</div></template>",
    )
    .unwrap();

    let engine = engine_in(dir.path());
    let first = engine.compile(&path).unwrap();
    let second = engine.compile(&path).unwrap();

    assert_eq!(first.content_hash, second.content_hash);
    assert_eq!(first.module_bytes, second.module_bytes);
    assert!(first.diagnostics.is_empty());
}

#[test]
fn derived_topology_orders_by_dependency_not_declaration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain.egh");
    // `c` is declared before `b`, but depends on it; the generated module
    // must still define `b`'s getter before `c`'s.
    fs::write(
        &path,
        "<script>\n~a = 1\nc => b + 1\nb => a + 1\n</script>\n<template><div>{c}</div></template>",
    )
    .unwrap();

    let engine = engine_in(dir.path());
    let result = engine.compile(&path).unwrap();
    assert!(result.diagnostics.is_empty());

    let js = String::from_utf8(result.module_bytes).unwrap();
    let b_pos = js.find("'b'").or_else(|| js.find("\"b\"")).expect("b getter emitted");
    let c_pos = js.find("'c'").or_else(|| js.find("\"c\"")).expect("c getter emitted");
    assert!(b_pos < c_pos, "b must be defined before c in topological order");
}

#[test]
fn cyclic_deriveds_are_rejected_and_gen_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cycle.egh");
    fs::write(&path, "<script>\nx => y + 1\ny => x + 1\n</script>").unwrap();

    let engine = engine_in(dir.path());
    let result = engine.compile(&path).unwrap();

    assert!(result.module_bytes.is_empty());
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.code == DiagnosticCode::ReactiveCycle && d.severity == Severity::Error));
}

#[test]
fn unknown_identifier_reported_but_does_not_abort_compile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("typo.egh");
    fs::write(
        &path,
        "<script>\n~count = 0\ndouble => coutn * 2\n</script>\n<template><div>{count}</div></template>",
    )
    .unwrap();

    let engine = engine_in(dir.path());
    let result = engine.compile(&path).unwrap();
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.code == DiagnosticCode::UnknownIdent));
}

#[test]
fn each_block_and_html_opt_out_compile_with_hint() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("list.egh");
    fs::write(
        &path,
        "<script>\n~items = []\n~note = \"hi\"\n</script>\n<template><ul>{#each items as item (item)}<li>{item}</li>{/each}</ul>{@html note}</template>",
    )
    .unwrap();

    let engine = engine_in(dir.path());
    let result = engine.compile(&path).unwrap();
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.code == DiagnosticCode::HtmlOptOut));
    assert!(!result.module_bytes.is_empty());
}

#[test]
fn incremental_rebuild_after_invalidate_reflects_new_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counter.egh");
    fs::write(
        &path,
        "<script>~count = 0</script><template><div>{count}</div></template>",
    )
    .unwrap();

    let engine = engine_in(dir.path());
    let first = engine.compile(&path).unwrap();

    std::thread::sleep(std::time::Duration::from_millis(10));
    fs::write(
        &path,
        "<script>~count = 1</script><template><div>{count}</div></template>",
    )
    .unwrap();
    engine.invalidate(&[path.clone()]).unwrap();
    let second = engine.compile(&path).unwrap();

    assert_ne!(first.content_hash, second.content_hash);
}
