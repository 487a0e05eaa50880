//! Depth-first, post-order ("on finish") traversal.
//!
//! A node finishes only after every node feeding one of its inputs has
//! finished, so the node order is a valid execution order. Ties are broken
//! deterministically: roots are taken in node insertion order and each
//! node's dependencies in input declaration order. Arena indices never
//! influence the result.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::edge::EdgeRecord;
use crate::error::CoreError;
use crate::graph::Graph;
use crate::id::NodeId;
use crate::view::NodeRef;

/// Result of a traversal: nodes in finish order, and each edge walked once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Traversal {
    pub nodes: Vec<String>,
    pub edges: Vec<EdgeRecord>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Gray,
    Black,
}

/// Iterative depth-first walk. Each stack frame holds a node and the index
/// of the next input to inspect, so graph depth never grows the call stack.
///
/// Nodes for which `settled` holds are treated as already finished: their
/// edges are recorded but they are neither descended into nor reported.
struct Walk<'g, F> {
    graph: &'g Graph,
    settled: F,
    colors: HashMap<NodeId, Color>,
    finished: Vec<NodeId>,
    edges: Vec<EdgeRecord>,
}

impl<'g, F: Fn(NodeId) -> bool> Walk<'g, F> {
    fn new(graph: &'g Graph, settled: F) -> Self {
        Walk {
            graph,
            settled,
            colors: HashMap::new(),
            finished: Vec::new(),
            edges: Vec::new(),
        }
    }

    fn visit(&mut self, root: NodeId) -> Result<(), CoreError> {
        let graph = self.graph;
        match self.colors.get(&root).copied() {
            Some(Color::Black) => return Ok(()),
            Some(Color::Gray) => {
                return Err(CoreError::CyclicGraph {
                    node: graph.node_by_id(root)?.name().to_string(),
                });
            }
            None => {}
        }
        self.colors.insert(root, Color::Gray);

        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
        while let Some(frame) = stack.last_mut() {
            let (id, cursor) = *frame;
            let node = graph.node_by_id(id)?;
            let next = node
                .inputs()
                .enumerate()
                .skip(cursor)
                .find_map(|(i, input)| {
                    graph
                        .incoming(id, input.name())
                        .map(|(source, edge)| (i, source, edge))
                });

            let Some((i, source, edge)) = next else {
                stack.pop();
                self.colors.insert(id, Color::Black);
                tracing::trace!("finished {}", node.name());
                self.finished.push(id);
                continue;
            };
            frame.1 = i + 1;

            let source_node = graph.node_by_id(source)?;
            self.edges.push(EdgeRecord {
                source: source_node.name().to_string(),
                source_key: edge.source_key.clone(),
                dest: node.name().to_string(),
                dest_key: edge.dest_key.clone(),
            });

            match self.colors.get(&source).copied() {
                Some(Color::Black) => {}
                Some(Color::Gray) => {
                    return Err(CoreError::CyclicGraph {
                        node: source_node.name().to_string(),
                    });
                }
                None if (self.settled)(source) => {
                    self.colors.insert(source, Color::Black);
                }
                None => {
                    self.colors.insert(source, Color::Gray);
                    stack.push((source, 0));
                }
            }
        }
        Ok(())
    }

    fn into_traversal(self) -> Result<Traversal, CoreError> {
        let nodes = self
            .finished
            .iter()
            .map(|id| Ok(self.graph.node_by_id(*id)?.name().to_string()))
            .collect::<Result<Vec<String>, CoreError>>()?;
        Ok(Traversal {
            nodes,
            edges: self.edges,
        })
    }
}

impl Graph {
    /// Traverses the whole graph.
    ///
    /// Leaves (nodes nothing depends on) are the roots, in insertion order.
    pub fn traverse(&self) -> Result<Traversal, CoreError> {
        let mut walk = Walk::new(self, |_: NodeId| false);
        let ids: Vec<NodeId> = self.nodes().map(|n| n.id()).collect();
        for id in ids.iter().filter(|id| !self.has_outgoing(**id)) {
            walk.visit(*id)?;
        }
        // Only reachable if an invariant broke; the gray check then reports it.
        for id in &ids {
            walk.visit(*id)?;
        }
        let traversal = walk.into_traversal()?;
        tracing::debug!(
            "traversed {} nodes, {} edges",
            traversal.nodes.len(),
            traversal.edges.len()
        );
        Ok(traversal)
    }

    /// Traverses the dependencies of `roots`, roots included, in the given
    /// root order.
    pub fn dfs_on_finish(&self, roots: &[&str]) -> Result<Traversal, CoreError> {
        let mut walk = Walk::new(self, |_: NodeId| false);
        for root in roots {
            walk.visit(self.id_of(root)?)?;
        }
        walk.into_traversal()
    }

    /// `root` and its unsettled dependencies, dependencies first.
    ///
    /// The walk stops at nodes for which `settled` holds.
    pub(crate) fn finish_order(
        &self,
        root: NodeId,
        settled: impl Fn(NodeId) -> bool,
    ) -> Result<Vec<NodeId>, CoreError> {
        let mut walk = Walk::new(self, settled);
        walk.visit(root)?;
        Ok(walk.finished)
    }

    /// Every node `name` depends on, directly or transitively, in finish
    /// order.
    pub fn upstream(&self, name: &str) -> Result<Vec<NodeRef<'_>>, CoreError> {
        let traversal = self.dfs_on_finish(&[name])?;
        traversal
            .nodes
            .iter()
            .filter(|n| n.as_str() != name)
            .map(|n| self.node(n))
            .collect()
    }

    /// Every node depending on `name`, directly or transitively, in
    /// whole-graph traversal order.
    pub fn downstream(&self, name: &str) -> Result<Vec<NodeRef<'_>>, CoreError> {
        let start = self.id_of(name)?;
        let mut reached: HashSet<NodeId> = HashSet::new();
        let mut queue: VecDeque<NodeId> = self.targets_of(start).collect();
        while let Some(id) = queue.pop_front() {
            if reached.insert(id) {
                queue.extend(self.targets_of(id));
            }
        }

        let order = self.traverse()?;
        order
            .nodes
            .iter()
            .map(|n| self.node(n))
            .filter(|n| n.as_ref().map_or(true, |n| reached.contains(&n.id())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::desc::{AttributeDesc, NodeDesc};
    use crate::id::UidGroup;

    use super::*;

    fn desc(type_id: &str, inputs: &[&str]) -> Arc<NodeDesc> {
        Arc::new(NodeDesc::new(
            type_id,
            inputs
                .iter()
                .map(|k| AttributeDesc::file(k, "").in_group(UidGroup::PRIMARY))
                .collect(),
            vec![AttributeDesc::output("output", "{cache}/{nodeType}/{uid0}/")],
        ).unwrap())
    }

    /// Diamond: A feeds B and C, both feed D. Built downstream-first.
    fn diamond() -> Graph {
        let mut g = Graph::new();
        g.add_node_named("D", &desc("Join", &["left", "right"])).unwrap();
        g.add_node_named("C", &desc("Step", &["input"])).unwrap();
        g.add_node_named("B", &desc("Step", &["input"])).unwrap();
        g.add_node_named("A", &desc("Init", &[])).unwrap();
        g.connect("B", "output", "D", "left").unwrap();
        g.connect("C", "output", "D", "right").unwrap();
        g.connect("A", "output", "C", "input").unwrap();
        g.connect("A", "output", "B", "input").unwrap();
        g
    }

    #[test]
    fn dependencies_finish_first() {
        let t = diamond().traverse().unwrap();
        assert_eq!(t.nodes, vec!["A", "B", "C", "D"]);
        assert_eq!(t.edges.len(), 4);
        let edges: Vec<String> = t.edges.iter().map(ToString::to_string).collect();
        assert_eq!(
            edges,
            vec![
                "B.output -> D.left",
                "A.output -> B.input",
                "C.output -> D.right",
                "A.output -> C.input",
            ]
        );
    }

    #[test]
    fn independent_leaves_follow_insertion_order() {
        let mut g = Graph::new();
        g.add_node_named("y", &desc("Init", &[])).unwrap();
        g.add_node_named("x", &desc("Init", &[])).unwrap();
        assert_eq!(g.traverse().unwrap().nodes, vec!["y", "x"]);
    }

    #[test]
    fn traversal_is_stable_across_calls() {
        let g = diamond();
        assert_eq!(g.traverse().unwrap(), g.traverse().unwrap());
    }

    #[test]
    fn partial_traversal_and_neighbourhoods() {
        let g = diamond();
        assert_eq!(g.dfs_on_finish(&["B"]).unwrap().nodes, vec!["A", "B"]);

        let up: Vec<&str> = g.upstream("D").unwrap().iter().map(|n| n.name()).collect();
        assert_eq!(up, vec!["A", "B", "C"]);

        let down: Vec<&str> = g.downstream("B").unwrap().iter().map(|n| n.name()).collect();
        assert_eq!(down, vec!["D"]);

        let down: Vec<&str> = g.downstream("A").unwrap().iter().map(|n| n.name()).collect();
        assert_eq!(down, vec!["B", "C", "D"]);

        assert!(g.upstream("Z").is_err());
    }

    #[test]
    fn finish_order_stops_at_settled_nodes() {
        let g = diamond();
        let b = g.id_of("B").unwrap();
        let order = g.finish_order(g.id_of("D").unwrap(), |id| id == b).unwrap();
        let names: Vec<&str> = order
            .iter()
            .map(|id| g.node_by_id(*id).unwrap().name())
            .collect();
        assert_eq!(names, vec!["A", "C", "D"]);
    }

    #[test]
    fn empty_graph_traverses_to_nothing() {
        let t = Graph::new().traverse().unwrap();
        assert!(t.nodes.is_empty());
        assert!(t.edges.is_empty());
    }
}
