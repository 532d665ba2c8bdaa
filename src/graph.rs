//! The graph store and its traversals. Nodes and edges live in a petgraph
//! stable graph, so handles stay valid across deletions and there is no
//! arena relocation to invalidate them.

use crate::err;
use crate::error::{Result, StatusCode};
use crate::nodes::{self, Node, NodeParams};
use fxhash::FxHashSet;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use smallvec::SmallVec;
use std::io::Write;

pub use petgraph::stable_graph::{EdgeIndex, NodeIndex};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    Input,
    Canvas,
    /// Reserved; nothing emits these today.
    Info,
}

#[derive(Copy, Clone, Debug)]
pub struct Edge {
    pub kind: EdgeKind,
}

pub struct Graph {
    graph: StableDiGraph<Node, Edge, u32>,
}

impl Graph {
    pub fn create() -> Graph {
        Graph::with_capacity(10, 10)
    }

    pub fn with_capacity(nodes: usize, edges: usize) -> Graph {
        Graph {
            graph: StableDiGraph::with_capacity(nodes, edges),
        }
    }

    //---------------------------------------------------------------- nodes

    pub fn add_node(&mut self, params: NodeParams) -> NodeIndex {
        self.graph.add_node(Node::new(params))
    }

    /// Adds a node; when `prev` is given, connects it with an input edge.
    pub fn create_node(&mut self, prev: Option<NodeIndex>, params: NodeParams) -> NodeIndex {
        let id = self.add_node(params);
        if let Some(prev) = prev {
            self.graph.add_edge(prev, id, Edge { kind: EdgeKind::Input });
        }
        id
    }

    pub fn contains(&self, id: NodeIndex) -> bool {
        self.graph.contains_node(id)
    }

    pub fn node(&self, id: NodeIndex) -> &Node {
        &self.graph[id]
    }

    pub fn node_mut(&mut self, id: NodeIndex) -> &mut Node {
        &mut self.graph[id]
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node ids in ascending index order, for deterministic traversals.
    pub fn node_ids(&self) -> Vec<NodeIndex> {
        let mut ids: Vec<NodeIndex> = self.graph.node_indices().collect();
        ids.sort();
        ids
    }

    /// Deleting a node drops its edges too. Nodes holding a result bitmap
    /// must not be deleted.
    pub fn delete_node(&mut self, id: NodeIndex) -> Result<()> {
        match self.graph.node_weight(id) {
            None => Err(err!(StatusCode::ItemDoesNotExist)),
            Some(node) if node.result.is_some() => Err(err!(
                StatusCode::InvalidInternalState,
                "cannot delete a node with an attached result bitmap"
            )),
            Some(_) => {
                self.graph.remove_node(id);
                Ok(())
            }
        }
    }

    //---------------------------------------------------------------- edges

    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, kind: EdgeKind) -> Result<EdgeIndex> {
        if !self.contains(from) || !self.contains(to) {
            return Err(err!(StatusCode::InvalidArgument, "edge endpoint does not exist"));
        }
        Ok(self.graph.add_edge(from, to, Edge { kind }))
    }

    pub fn delete_edge(&mut self, id: EdgeIndex) -> Result<()> {
        self.graph
            .remove_edge(id)
            .map(|_| ())
            .ok_or_else(|| err!(StatusCode::ItemDoesNotExist))
    }

    pub fn edge_kind(&self, id: EdgeIndex) -> Option<EdgeKind> {
        self.graph.edge_weight(id).map(|e| e.kind)
    }

    pub fn edge_endpoints(&self, id: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(id)
    }

    pub fn edge_ids(&self) -> Vec<EdgeIndex> {
        let mut ids: Vec<EdgeIndex> = self.graph.edge_indices().collect();
        ids.sort();
        ids
    }

    /// Inbound `(edge, source, kind)` triples in ascending edge order.
    pub fn inbound_edges(&self, id: NodeIndex) -> SmallVec<[(EdgeIndex, NodeIndex, EdgeKind); 4]> {
        let mut edges: SmallVec<[(EdgeIndex, NodeIndex, EdgeKind); 4]> = self
            .graph
            .edges_directed(id, Direction::Incoming)
            .map(|e| (e.id(), e.source(), e.weight().kind))
            .collect();
        edges.sort_by_key(|&(e, _, _)| e);
        edges
    }

    /// Outbound `(edge, target, kind)` triples in ascending edge order.
    pub fn outbound_edges(&self, id: NodeIndex) -> SmallVec<[(EdgeIndex, NodeIndex, EdgeKind); 4]> {
        let mut edges: SmallVec<[(EdgeIndex, NodeIndex, EdgeKind); 4]> = self
            .graph
            .edges_directed(id, Direction::Outgoing)
            .map(|e| (e.id(), e.target(), e.weight().kind))
            .collect();
        edges.sort_by_key(|&(e, _, _)| e);
        edges
    }

    pub fn first_inbound_node_of_kind(&self, id: NodeIndex, kind: EdgeKind) -> Option<NodeIndex> {
        self.inbound_edges(id)
            .into_iter()
            .find(|&(_, _, k)| k == kind)
            .map(|(_, source, _)| source)
    }

    pub fn inbound_count_of_kind(&self, id: NodeIndex, kind: EdgeKind) -> usize {
        self.inbound_edges(id)
            .into_iter()
            .filter(|&(_, _, k)| k == kind)
            .count()
    }

    pub fn outbound_count(&self, id: NodeIndex) -> usize {
        self.graph
            .edges_directed(id, Direction::Outgoing)
            .count()
    }

    pub fn inbound_count(&self, id: NodeIndex) -> usize {
        self.graph
            .edges_directed(id, Direction::Incoming)
            .count()
    }

    /// Clones every matching edge of `from_node`, rewriting the shared
    /// endpoint to `to_node`. The edge set is snapshotted first, so newly
    /// created edges are never revisited.
    pub fn duplicate_edges_to_another_node(
        &mut self,
        from_node: NodeIndex,
        to_node: NodeIndex,
        copy_inbound: bool,
        copy_outbound: bool,
    ) -> Result<()> {
        if copy_inbound {
            for (_, source, kind) in self.inbound_edges(from_node) {
                self.add_edge(source, to_node, kind)?;
            }
        }
        if copy_outbound {
            for (_, target, kind) in self.outbound_edges(from_node) {
                self.add_edge(to_node, target, kind)?;
            }
        }
        Ok(())
    }

    //---------------------------------------------------------------- traversal

    /// Post-order walk from every sink: a node is visited only after all of
    /// the nodes it depends on. `visited` memoizes across sinks; the DFS
    /// path doubles as the cycle detector. A non-empty graph without sinks
    /// is cyclic by construction.
    pub fn walk_dependency_wise<F>(&mut self, mut visit: F) -> Result<()>
    where
        F: FnMut(&mut Graph, NodeIndex) -> Result<()>,
    {
        let sinks: Vec<NodeIndex> = self
            .node_ids()
            .into_iter()
            .filter(|&id| self.outbound_count(id) == 0)
            .collect();
        if sinks.is_empty() && self.node_count() > 0 {
            return Err(err!(StatusCode::GraphIsCyclic));
        }
        let mut visited_global: FxHashSet<NodeIndex> = FxHashSet::default();
        for sink in sinks {
            let mut path: FxHashSet<NodeIndex> = FxHashSet::default();
            self.walk_dependency_recursive(sink, &mut path, &mut visited_global, &mut visit)?;
        }
        Ok(())
    }

    fn walk_dependency_recursive<F>(
        &mut self,
        id: NodeIndex,
        path: &mut FxHashSet<NodeIndex>,
        visited_global: &mut FxHashSet<NodeIndex>,
        visit: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&mut Graph, NodeIndex) -> Result<()>,
    {
        if !self.contains(id) {
            return Ok(());
        }
        if !path.insert(id) {
            return Err(err!(StatusCode::GraphIsCyclic));
        }
        if visited_global.insert(id) {
            let inbound: SmallVec<[NodeIndex; 4]> = self
                .inbound_edges(id)
                .into_iter()
                .map(|(_, source, _)| source)
                .collect();
            for source in inbound {
                self.walk_dependency_recursive(source, path, visited_global, visit)?;
            }
            if self.contains(id) {
                visit(self, id)?;
            }
        }
        path.remove(&id);
        Ok(())
    }

    /// Depth-first walk along outbound edges from every source node. The
    /// visitor returns whether to skip the node's outbound paths.
    pub fn walk_forward<F>(&mut self, mut visit: F) -> Result<()>
    where
        F: FnMut(&mut Graph, NodeIndex) -> Result<bool>,
    {
        let sources: Vec<NodeIndex> = self
            .node_ids()
            .into_iter()
            .filter(|&id| self.inbound_count(id) == 0)
            .collect();
        let mut visited: FxHashSet<NodeIndex> = FxHashSet::default();
        for source in sources {
            self.walk_forward_recursive(source, &mut visited, &mut visit)?;
        }
        Ok(())
    }

    fn walk_forward_recursive<F>(
        &mut self,
        id: NodeIndex,
        visited: &mut FxHashSet<NodeIndex>,
        visit: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&mut Graph, NodeIndex) -> Result<bool>,
    {
        if !self.contains(id) || !visited.insert(id) {
            return Ok(());
        }
        let skip_outbound = visit(self, id)?;
        if skip_outbound {
            return Ok(());
        }
        let outbound: SmallVec<[NodeIndex; 4]> = self
            .outbound_edges(id)
            .into_iter()
            .map(|(_, target, _)| target)
            .collect();
        for target in outbound {
            self.walk_forward_recursive(target, visited, visit)?;
        }
        Ok(())
    }

    //---------------------------------------------------------------- validation

    /// Checks every node against its definition (edge counts, prohibited
    /// outputs) and that the graph is acyclic.
    pub fn validate(&mut self) -> Result<()> {
        for id in self.node_ids() {
            nodes::validate_edges(self, id)?;
        }
        self.walk_dependency_wise(|_, _| Ok(()))?;
        Ok(())
    }

    pub fn fully_executed(&self) -> bool {
        self.graph
            .node_indices()
            .all(|id| self.graph[id].stage.contains(crate::nodes::NodeStage::EXECUTED))
    }

    //---------------------------------------------------------------- diagnostics

    /// Standard Graphviz DOT, labelled with dimensions and per-node
    /// milliseconds.
    pub fn print_to_dot(
        &self,
        w: &mut dyn Write,
        image_node_filename_prefix: Option<&str>,
    ) -> Result<()> {
        let io_err = |e: ::std::io::Error| err!(StatusCode::IoError, "dot output failed: {}", e);
        writeln!(w, "digraph g {{").map_err(io_err)?;
        writeln!(
            w,
            "  node [shape=box, fontsize=20, fontcolor=\"#5AFA0A\" fontname=\"sans-serif bold\"]\n  size=\"12,18\"\n  edge [fontsize=20, fontname=\"sans-serif\"]"
        )
        .map_err(io_err)?;

        for edge_id in self.edge_ids() {
            let (from, to) = self.edge_endpoints(edge_id).unwrap();
            let kind = self.edge_kind(edge_id).unwrap();
            let n = self.node(from);
            let dimensions = match n.frame_est {
                Some(est) => format!("{}x{} {}", est.w, est.h, est.format_name()),
                None => "?x?".to_owned(),
            };
            writeln!(
                w,
                "  n{} -> n{} [label=\"e{}: {}{}\"]",
                from.index(),
                to.index(),
                edge_id.index(),
                dimensions,
                if kind == EdgeKind::Canvas { " canvas" } else { "" }
            )
            .map_err(io_err)?;
        }

        let mut total_ticks = 0i64;
        for id in self.node_ids() {
            let n = self.node(id);
            let label = nodes::stringify(self, id);
            total_ticks += n.ticks_elapsed;
            let ms =
                n.ticks_elapsed as f64 * 1000.0 / crate::context::profiler_ticks_per_second() as f64;
            match (n.result.is_some(), image_node_filename_prefix) {
                (true, Some(prefix)) => writeln!(
                    w,
                    "  n{} [image=\"{}{}.png\", label=\"n{}: {}\n{:.2}ms\"]",
                    id.index(),
                    prefix,
                    id.index(),
                    id.index(),
                    label,
                    ms
                )
                .map_err(io_err)?,
                _ => writeln!(
                    w,
                    "  n{} [label=\"n{}: {}\n{:.2}ms\"]",
                    id.index(),
                    id.index(),
                    label,
                    ms
                )
                .map_err(io_err)?,
            }
        }

        let total_ms =
            total_ticks as f64 * 1000.0 / crate::context::profiler_ticks_per_second() as f64;
        writeln!(
            w,
            " graphinfo [label=\"{} nodes\n {} edges\nExecution time: {:.2}ms\"]",
            self.node_count(),
            self.edge_count(),
            total_ms
        )
        .map_err(io_err)?;
        writeln!(w, "}}").map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::NodeParams;

    fn chain(g: &mut Graph, len: usize) -> Vec<NodeIndex> {
        let mut ids = Vec::new();
        let mut prev = None;
        for _ in 0..len {
            let id = g.create_node(prev, NodeParams::Noop);
            ids.push(id);
            prev = Some(id);
        }
        ids
    }

    #[test]
    fn test_dependency_walk_visits_sources_first() {
        let mut g = Graph::create();
        let ids = chain(&mut g, 4);
        let mut order = Vec::new();
        g.walk_dependency_wise(|_, id| {
            order.push(id);
            Ok(())
        })
        .unwrap();
        assert_eq!(order, ids);
    }

    #[test]
    fn test_dependency_walk_handles_diamonds() {
        // a -> b -> d, a -> c -> d: every node visited once, `a` first.
        let mut g = Graph::create();
        let a = g.create_node(None, NodeParams::Noop);
        let b = g.create_node(Some(a), NodeParams::Noop);
        let c = g.create_node(Some(a), NodeParams::Noop);
        let d = g.create_node(Some(b), NodeParams::Noop);
        g.add_edge(c, d, EdgeKind::Input).unwrap();

        let mut order = Vec::new();
        g.walk_dependency_wise(|_, id| {
            order.push(id);
            Ok(())
        })
        .unwrap();
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], a);
        assert_eq!(*order.last().unwrap(), d);
    }

    #[test]
    fn test_cycle_detection() {
        let mut g = Graph::create();
        let ids = chain(&mut g, 3);
        // No sinks at all once the cycle closes.
        g.add_edge(ids[2], ids[0], EdgeKind::Input).unwrap();
        let err = g.walk_dependency_wise(|_, _| Ok(())).unwrap_err();
        assert_eq!(err.status, StatusCode::GraphIsCyclic);

        // A cycle hanging off a walked sink.
        let mut g2 = Graph::create();
        let ids = chain(&mut g2, 3);
        g2.add_edge(ids[1], ids[0], EdgeKind::Input).unwrap();
        let err = g2.walk_dependency_wise(|_, _| Ok(())).unwrap_err();
        assert_eq!(err.status, StatusCode::GraphIsCyclic);
    }

    #[test]
    fn test_forward_walk_can_prune() {
        let mut g = Graph::create();
        let ids = chain(&mut g, 3);
        let mut seen = Vec::new();
        g.walk_forward(|_, id| {
            seen.push(id);
            Ok(id == ids[0]) // prune below the first node
        })
        .unwrap();
        assert_eq!(seen, vec![ids[0]]);
    }

    #[test]
    fn test_duplicate_edges_rewrites_endpoints() {
        let mut g = Graph::create();
        let a = g.create_node(None, NodeParams::Noop);
        let b = g.create_node(Some(a), NodeParams::Noop);
        let c = g.create_node(Some(b), NodeParams::Noop);
        let replacement = g.create_node(None, NodeParams::Noop);

        g.duplicate_edges_to_another_node(b, replacement, true, true).unwrap();
        assert_eq!(g.first_inbound_node_of_kind(replacement, EdgeKind::Input), Some(a));
        assert_eq!(g.inbound_count(c), 2);
    }

    #[test]
    fn test_delete_node_removes_edges() {
        let mut g = Graph::create();
        let ids = chain(&mut g, 3);
        g.delete_node(ids[1]).unwrap();
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 0);
        assert!(g.delete_node(ids[1]).is_err());
    }
}
