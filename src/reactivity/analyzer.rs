//! Reactivity analysis (spec §4.4): builds the [`DependencyGraph`], resolves
//! free identifiers against the symbol table, detects cycles among
//! deriveds, and assigns stable `patch_id`s to template interpolations.

use super::graph::{DependencyGraph, NodeId, NodeKind};
use crate::ast::{ComponentAst, Decl, Expr, TemplateNode};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::source_store::SourcePath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Binding,
    Derived,
    Effect,
    Function,
    Import,
}

pub struct AnalysisResult {
    pub graph: DependencyGraph,
    pub diagnostics: Vec<Diagnostic>,
    /// Interpolation `patch_id` assignments, in template pre-order. Mirrors
    /// the ids written back onto `ComponentAst`'s `InterpolationNode`s.
    pub patch_ids: Vec<u32>,
}

const BUILTINS: &[&str] = &["console", "Math", "Date", "window", "document"];

/// Walks `component`, builds the dependency graph, and returns it alongside
/// diagnostics. Also writes a stable `patch_id` back onto every
/// `InterpolationNode` in `component.template` (spec §4.4 step 5) and adds a
/// `NodeKind::Interpolation` graph node per interpolation site, edged to the
/// bindings/deriveds its expression reads (spec §3).
///
/// Refuses to assign an order (leaves `graph.order()` empty) when a cycle
/// among deriveds is found — callers must check `diagnostics` for
/// `DiagnosticCode::ReactiveCycle` before codegen.
pub fn analyze(path: &SourcePath, component: &mut ComponentAst) -> AnalysisResult {
    let mut symbols: std::collections::HashMap<String, (SymbolKind, NodeId)> =
        std::collections::HashMap::new();
    let mut graph = DependencyGraph::new();
    let mut diagnostics = Vec::new();

    // Step 1: collect declared identifiers into the symbol table.
    for decl in &component.script.decls {
        match decl {
            Decl::Binding(b) => {
                let id = graph.add_node(NodeKind::Binding, b.name.name.clone());
                symbols.insert(b.name.name.clone(), (SymbolKind::Binding, id));
            }
            Decl::Derived(d) => {
                let id = graph.add_node(NodeKind::Derived, d.name.name.clone());
                symbols.insert(d.name.name.clone(), (SymbolKind::Derived, id));
            }
            Decl::Effect(e) => {
                let id = graph.add_node(NodeKind::Effect, e.name.name.clone());
                symbols.insert(e.name.name.clone(), (SymbolKind::Effect, id));
            }
            Decl::Function(f) => {
                // Functions participate in the symbol table for call
                // resolution but are not graph nodes: they only run when
                // invoked, not on a dependency's change.
                symbols.insert(
                    f.name.name.clone(),
                    (SymbolKind::Function, NodeId(u32::MAX)),
                );
            }
            Decl::Import(spec) => {
                for b in &spec.bindings {
                    symbols.insert(b.name.clone(), (SymbolKind::Import, NodeId(u32::MAX)));
                }
            }
        }
    }

    // Step 2: walk every expression, computing deps against the symbol table.
    for decl in &component.script.decls {
        match decl {
            Decl::Derived(d) => {
                let (_, node_id) = symbols[&d.name.name];
                resolve_and_link(&d.expr, &symbols, &mut graph, node_id, path, &mut diagnostics, &[]);
            }
            Decl::Effect(e) => {
                let (_, node_id) = symbols[&e.name.name];
                for stmt in &e.body.stmts {
                    walk_stmt_for_deps(stmt, &symbols, &mut graph, node_id, path, &mut diagnostics);
                }
            }
            _ => {}
        }
    }

    // Step 2b: one `Interpolation` node per template interpolation site,
    // linked to the bindings/deriveds it reads, and the `patch_id` that site
    // carries for the rest of its life (spec §4.4 step 5, §3).
    let mut patch_ids = Vec::new();
    let mut next_patch_id = 0u32;
    let mut locals: Vec<String> = Vec::new();
    if let Some(root) = &mut component.template.root {
        walk_template_for_patch_ids_and_deps(
            root,
            &symbols,
            &mut graph,
            &mut next_patch_id,
            path,
            &mut diagnostics,
            &mut locals,
            &mut patch_ids,
        );
    }

    // Step 3: cycle detection among deriveds.
    if let Err(cycle) = graph.detect_cycle() {
        diagnostics.push(Diagnostic::error(
            DiagnosticCode::ReactiveCycle,
            format!("cyclic derived dependency: {}", cycle.cycle.join(" -> ")),
        ));
    } else {
        // Step 4: deterministic topological order, ties by declaration order.
        let order = graph.topological_order();
        graph.set_order(order);
    }

    AnalysisResult {
        graph,
        diagnostics,
        patch_ids,
    }
}

fn resolve_and_link(
    expr: &Expr,
    symbols: &std::collections::HashMap<String, (SymbolKind, NodeId)>,
    graph: &mut DependencyGraph,
    node_id: NodeId,
    path: &SourcePath,
    diagnostics: &mut Vec<Diagnostic>,
    locals: &[String],
) {
    let mut free = Vec::new();
    expr.free_identifiers(&mut free);
    for name in free {
        if locals.contains(&name) {
            continue;
        }
        match symbols.get(&name) {
            Some((SymbolKind::Binding, dep_id)) | Some((SymbolKind::Derived, dep_id)) => {
                graph.add_edge(node_id, *dep_id);
            }
            Some(_) => {}
            None if BUILTINS.contains(&name.as_str()) => {}
            None => {
                diagnostics.push(
                    Diagnostic::error(
                        DiagnosticCode::UnknownIdent,
                        format!("unknown identifier `{name}`"),
                    )
                    .with_span(crate::diagnostics::Span::new(path.clone(), expr.span())),
                );
            }
        }
    }
}

fn walk_stmt_for_deps(
    stmt: &crate::ast::Stmt,
    symbols: &std::collections::HashMap<String, (SymbolKind, NodeId)>,
    graph: &mut DependencyGraph,
    node_id: NodeId,
    path: &SourcePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    use crate::ast::Stmt;
    match stmt {
        Stmt::Let { value, .. } | Stmt::Expr(value) => {
            resolve_and_link(value, symbols, graph, node_id, path, diagnostics, &[])
        }
        Stmt::Assign { value, .. } => {
            resolve_and_link(value, symbols, graph, node_id, path, diagnostics, &[])
        }
        Stmt::Return(Some(value)) => {
            resolve_and_link(value, symbols, graph, node_id, path, diagnostics, &[])
        }
        Stmt::Return(None) => {}
        Stmt::If {
            cond,
            then_branch,
            else_branch,
        } => {
            resolve_and_link(cond, symbols, graph, node_id, path, diagnostics, &[]);
            for s in &then_branch.stmts {
                walk_stmt_for_deps(s, symbols, graph, node_id, path, diagnostics);
            }
            if let Some(else_branch) = else_branch {
                for s in &else_branch.stmts {
                    walk_stmt_for_deps(s, symbols, graph, node_id, path, diagnostics);
                }
            }
        }
    }
}

/// Assigns each interpolation a `patch_id` keyed by pre-order index (spec
/// §4.4 step 5), writes it back onto the `InterpolationNode`, and adds a
/// `NodeKind::Interpolation` node to `graph` edged to the identifiers its
/// expression reads. `locals` tracks `{#each ... as item}` bindings in scope
/// so a loop variable isn't flagged as an unknown identifier.
fn walk_template_for_patch_ids_and_deps(
    node: &mut TemplateNode,
    symbols: &std::collections::HashMap<String, (SymbolKind, NodeId)>,
    graph: &mut DependencyGraph,
    next_id: &mut u32,
    path: &SourcePath,
    diagnostics: &mut Vec<Diagnostic>,
    locals: &mut Vec<String>,
    out: &mut Vec<u32>,
) {
    match node {
        TemplateNode::Interpolation(interp) => {
            let id = *next_id;
            *next_id += 1;
            interp.patch_id = Some(id);
            out.push(id);

            let mut free = Vec::new();
            interp.expr.free_identifiers(&mut free);
            let hint = if free.is_empty() {
                id.to_string()
            } else {
                free.join("+")
            };
            let node_id = graph.add_node(NodeKind::Interpolation, format!("interp@{hint}"));
            resolve_and_link(&interp.expr, symbols, graph, node_id, path, diagnostics, locals);
        }
        TemplateNode::Element(el) => {
            for child in &mut el.children {
                walk_template_for_patch_ids_and_deps(
                    child, symbols, graph, next_id, path, diagnostics, locals, out,
                );
            }
        }
        TemplateNode::If(if_node) => {
            for (_, body) in &mut if_node.branches {
                for child in body {
                    walk_template_for_patch_ids_and_deps(
                        child, symbols, graph, next_id, path, diagnostics, locals, out,
                    );
                }
            }
            if let Some(else_branch) = &mut if_node.else_branch {
                for child in else_branch {
                    walk_template_for_patch_ids_and_deps(
                        child, symbols, graph, next_id, path, diagnostics, locals, out,
                    );
                }
            }
        }
        TemplateNode::Each(each) => {
            locals.push(each.item_binding.name.clone());
            for child in &mut each.body {
                walk_template_for_patch_ids_and_deps(
                    child, symbols, graph, next_id, path, diagnostics, locals, out,
                );
            }
            locals.pop();
        }
        TemplateNode::ComponentInstance(comp) => {
            for child in &mut comp.children {
                walk_template_for_patch_ids_and_deps(
                    child, symbols, graph, next_id, path, diagnostics, locals, out,
                );
            }
        }
        TemplateNode::Fragment(children) => {
            for child in children {
                walk_template_for_patch_ids_and_deps(
                    child, symbols, graph, next_id, path, diagnostics, locals, out,
                );
            }
        }
        TemplateNode::Text(_) | TemplateNode::Slot(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_component;

    fn analyze_source(src: &str) -> AnalysisResult {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("c.egh");
        std::fs::write(&p, src).unwrap();
        let path = SourcePath::canonicalize(&p).unwrap();
        let (mut ast, _) = parse_component(path.clone(), "c", src).unwrap();
        analyze(&path, &mut ast)
    }

    #[test]
    fn derived_depends_on_binding() {
        let result = analyze_source("<script>~count = 0\ndoubled => count * 2</script>");
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.graph.order().len(), 2);
    }

    #[test]
    fn unknown_identifier_is_flagged() {
        let result = analyze_source("<script>doubled => missing_thing * 2</script>");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::UnknownIdent));
    }

    #[test]
    fn cyclic_deriveds_are_rejected() {
        let result = analyze_source("<script>a => b + 1\nb => a + 1</script>");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.code == DiagnosticCode::ReactiveCycle));
        assert!(result.graph.order().is_empty());
    }

    #[test]
    fn interpolation_site_becomes_a_graph_node_linked_to_its_dependency() {
        let result = analyze_source(
            "<script>~count = 0\ndoubled => count * 2</script><template><div>{doubled}</div></template>",
        );
        assert!(result.diagnostics.is_empty());

        let interp = result
            .graph
            .nodes()
            .iter()
            .find(|n| n.kind == NodeKind::Interpolation)
            .expect("interpolation node present");
        assert_eq!(interp.name, "interp@doubled");

        let doubled = result
            .graph
            .nodes()
            .iter()
            .find(|n| n.kind == NodeKind::Derived)
            .unwrap();
        assert!(result.graph.deps_of(interp.id).contains(&doubled.id));

        let order = result.graph.order();
        let count_pos = order
            .iter()
            .position(|id| result.graph.node(*id).name == "count")
            .unwrap();
        let doubled_pos = order.iter().position(|id| *id == doubled.id).unwrap();
        let interp_pos = order.iter().position(|id| *id == interp.id).unwrap();
        assert!(count_pos < doubled_pos);
        assert!(doubled_pos < interp_pos);
    }

    #[test]
    fn patch_ids_are_distinct_and_written_back_onto_the_ast() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("c.egh");
        let src = "<script>~count = 0</script><template><div>{count} {count}</div></template>";
        std::fs::write(&p, src).unwrap();
        let path = SourcePath::canonicalize(&p).unwrap();
        let (mut ast, _) = parse_component(path.clone(), "c", src).unwrap();
        let result = analyze(&path, &mut ast);

        assert_eq!(result.patch_ids.len(), 2);
        assert_ne!(result.patch_ids[0], result.patch_ids[1]);

        let TemplateNode::Element(el) = ast.template.root.as_ref().unwrap() else {
            panic!("expected root element");
        };
        let ids: Vec<u32> = el
            .children
            .iter()
            .filter_map(|c| match c {
                TemplateNode::Interpolation(i) => i.patch_id,
                _ => None,
            })
            .collect();
        assert_eq!(ids, result.patch_ids);
    }

    #[test]
    fn each_loop_binding_is_not_flagged_as_unknown() {
        let result = analyze_source(
            "<script>~items = []</script><template><ul>{#each items as item (item)}<li>{item}</li>{/each}</ul></template>",
        );
        assert!(result.diagnostics.is_empty());
    }
}
