//! Code generation: JS module emission plus accompanying sourcemap
//! (spec §4.5).

pub mod module;
pub mod sourcemap;
pub mod vnode;

pub use module::{generate, GeneratedModule};
pub use sourcemap::{SourceMapBuilder, SourceMapV3};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::ContentHash;
    use crate::parser::parse_component;
    use crate::reactivity::analyze;
    use crate::source_store::SourcePath;

    #[test]
    fn generates_module_with_expected_exports() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("counter.egh");
        let src = "<script>~count = 0\ndoubled => count * 2</script><template><div>{count}</div></template>";
        std::fs::write(&p, src).unwrap();
        let path = SourcePath::canonicalize(&p).unwrap();
        let (mut ast, diags) = parse_component(path.clone(), "counter", src).unwrap();
        assert!(diags.is_empty());
        let analysis = analyze(&path, &mut ast);
        assert!(analysis.diagnostics.is_empty());
        let generated = generate(
            &ast,
            &analysis,
            &path.as_path().to_string_lossy(),
            src,
            ContentHash::of(src.as_bytes()),
        );
        assert!(generated.js.contains("export function createcounter"));
        assert!(generated.js.contains("mount(host)"));
        assert!(generated.js.contains("destroy()"));
        assert!(generated.js.contains("set(propsPatch)"));
    }

    #[test]
    fn function_bodies_are_transpiled_not_scaffolded() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("counter.egh");
        let src = "<script>\n~count = 0\nfn increment() {\n  count = count + 1\n}\n</script>\n<template><div>{count}</div></template>";
        std::fs::write(&p, src).unwrap();
        let path = SourcePath::canonicalize(&p).unwrap();
        let (mut ast, diags) = parse_component(path.clone(), "counter", src).unwrap();
        assert!(diags.is_empty());
        let analysis = analyze(&path, &mut ast);
        let generated = generate(
            &ast,
            &analysis,
            &path.as_path().to_string_lossy(),
            src,
            ContentHash::of(src.as_bytes()),
        );
        assert!(generated.js.contains("count = (count + 1);"));
        assert!(!generated.js.contains("omitted"));
    }
}
