//! Per-component dependency graph (spec §3, §4.4): one node per binding,
//! derived, effect, and template interpolation site; deterministic
//! topological order; three-color DFS cycle detection among deriveds.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Binding,
    Derived,
    Effect,
    Interpolation,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    /// Declaration order — used to break topological-sort ties (spec §3).
    pub decl_order: u32,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    /// `deps[node] = [nodes it reads from]`.
    deps: HashMap<NodeId, Vec<NodeId>>,
    order: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct CycleError {
    pub cycle: Vec<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, kind: NodeKind, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let decl_order = id.0;
        self.nodes.push(Node {
            id,
            kind,
            name: name.into(),
            decl_order,
        });
        self.deps.insert(id, Vec::new());
        id
    }

    pub fn add_edge(&mut self, node: NodeId, depends_on: NodeId) {
        self.deps.entry(node).or_default().push(depends_on);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn deps_of(&self, id: NodeId) -> &[NodeId] {
        self.deps.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Computed topological order, ties broken by declaration order
    /// (spec §3, §4.4 step 4). Call after all nodes/edges are added and
    /// [`Self::detect_cycle`] has returned `Ok`.
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut in_degree: HashMap<NodeId, usize> = self
            .nodes
            .iter()
            .map(|n| (n.id, self.deps_of(n.id).len()))
            .collect();

        let mut ready: std::collections::BTreeSet<(u32, u32)> = self
            .nodes
            .iter()
            .filter(|n| in_degree[&n.id] == 0)
            .map(|n| (n.decl_order, n.id.0))
            .collect();

        // reverse edges: who depends on `id`
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for node in &self.nodes {
            for &dep in self.deps_of(node.id) {
                dependents.entry(dep).or_default().push(node.id);
            }
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(&(decl_order, id_raw)) = ready.iter().next() {
            ready.remove(&(decl_order, id_raw));
            let id = NodeId(id_raw);
            order.push(id);
            if let Some(dents) = dependents.get(&id) {
                for &dependent in dents {
                    let deg = in_degree.get_mut(&dependent).unwrap();
                    *deg -= 1;
                    if *deg == 0 {
                        let dn = self.node(dependent);
                        ready.insert((dn.decl_order, dn.id.0));
                    }
                }
            }
        }
        order
    }

    /// Three-color DFS cycle detection restricted to `Derived` nodes, per
    /// spec §4.4 step 3 (`a => ... b ...` and `b => ... a ...`).
    pub fn detect_cycle(&self) -> Result<(), CycleError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }
        let mut color: HashMap<NodeId, Color> =
            self.nodes.iter().map(|n| (n.id, Color::White)).collect();
        let mut stack = Vec::new();

        fn visit(
            graph: &DependencyGraph,
            id: NodeId,
            color: &mut HashMap<NodeId, Color>,
            stack: &mut Vec<NodeId>,
        ) -> Result<(), CycleError> {
            if graph.node(id).kind != NodeKind::Derived {
                return Ok(());
            }
            match color[&id] {
                Color::Black => return Ok(()),
                Color::Gray => {
                    let start = stack.iter().position(|n| *n == id).unwrap_or(0);
                    let cycle = stack[start..]
                        .iter()
                        .chain(std::iter::once(&id))
                        .map(|n| graph.node(*n).name.clone())
                        .collect();
                    return Err(CycleError { cycle });
                }
                Color::White => {}
            }
            color.insert(id, Color::Gray);
            stack.push(id);
            for &dep in graph.deps_of(id) {
                visit(graph, dep, color, stack)?;
            }
            stack.pop();
            color.insert(id, Color::Black);
            Ok(())
        }

        for node in &self.nodes {
            if node.kind == NodeKind::Derived {
                visit(self, node.id, &mut color, &mut stack)?;
            }
        }
        Ok(())
    }

    pub fn set_order(&mut self, order: Vec<NodeId>) {
        self.order = order;
    }

    pub fn order(&self) -> &[NodeId] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topo_order_respects_declaration_ties() {
        let mut g = DependencyGraph::new();
        let a = g.add_node(NodeKind::Binding, "a");
        let b = g.add_node(NodeKind::Binding, "b");
        let c = g.add_node(NodeKind::Derived, "c");
        g.add_edge(c, a);
        g.add_edge(c, b);
        let order = g.topological_order();
        assert_eq!(order.last(), Some(&c));
        assert!(order.iter().position(|n| *n == a) < order.iter().position(|n| *n == c));
        assert!(order.iter().position(|n| *n == b) < order.iter().position(|n| *n == c));
    }

    #[test]
    fn detects_two_node_cycle() {
        let mut g = DependencyGraph::new();
        let a = g.add_node(NodeKind::Derived, "a");
        let b = g.add_node(NodeKind::Derived, "b");
        g.add_edge(a, b);
        g.add_edge(b, a);
        let err = g.detect_cycle().unwrap_err();
        assert!(err.cycle.contains(&"a".to_string()));
        assert!(err.cycle.contains(&"b".to_string()));
    }

    #[test]
    fn acyclic_graph_passes() {
        let mut g = DependencyGraph::new();
        let a = g.add_node(NodeKind::Binding, "a");
        let b = g.add_node(NodeKind::Derived, "b");
        g.add_edge(b, a);
        assert!(g.detect_cycle().is_ok());
    }
}
