//! Benchmarks the sub-100ms incremental-rebuild property (spec §2): after a
//! warm cache, recompiling one changed component in a project with many
//! siblings should stay far under the cold-compile cost.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use egh_build_core::config::EghConfig;
use egh_build_core::BuildEngine;
use std::path::PathBuf;

fn write_project(dir: &std::path::Path, count: usize) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for i in 0..count {
        let path = dir.join(format!("component_{i}.egh"));
        std::fs::write(
            &path,
            format!(
                "<script>\n~count_{i} = {i}\ndouble_{i} => count_{i} * 2\n</script>\n<template><div>{{count_{i}}} {{double_{i}}}</div></template>"
            ),
        )
        .unwrap();
        paths.push(path);
    }
    paths
}

fn bench_cold_compile(c: &mut Criterion) {
    c.bench_function("cold_compile_100_components", |b| {
        b.iter(|| {
            let dir = tempfile::tempdir().unwrap();
            let paths = write_project(dir.path(), 100);
            let engine = BuildEngine::new(dir.path(), EghConfig::default()).unwrap();
            for path in &paths {
                let result = engine.compile(path).unwrap();
                black_box(result);
            }
        });
    });
}

fn bench_incremental_single_change(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_project(dir.path(), 100);
    let engine = BuildEngine::new(dir.path(), EghConfig::default()).unwrap();
    for path in &paths {
        engine.compile(path).unwrap();
    }

    let changed = paths[42].clone();
    c.bench_function("incremental_rebuild_single_component", |b| {
        b.iter(|| {
            std::fs::write(
                &changed,
                "<script>\n~count_42 = 999\ndouble_42 => count_42 * 2\n</script>\n<template><div>{count_42} {double_42}</div></template>",
            )
            .unwrap();
            engine.invalidate(&[changed.clone()]).unwrap();
            let result = engine.compile(&changed).unwrap();
            black_box(result);
        });
    });
}

criterion_group!(benches, bench_cold_compile, bench_incremental_single_change);
criterion_main!(benches);
