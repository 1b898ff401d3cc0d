//! Topological analysis of constraint graphs.
//!
//! Provides algorithms for:
//! - Reachability between states
//! - Dead-end and connectivity detection
//! - Shortest edge sequences (fewest transitions)

use crate::core::error::{EdgeId, GraphResult, StateId, ValidationWarning};
use crate::graph::structure::ConstraintGraph;
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};
use std::collections::{HashMap, VecDeque};

/// Analyzer for graph topology.
///
/// Edges of weight zero are never drawn by edge selection and are left out
/// of the analysis.
pub struct TopologyAnalyzer<'a> {
    graph: &'a ConstraintGraph,
    topology: DiGraph<StateId, EdgeId>,
}

impl<'a> TopologyAnalyzer<'a> {
    /// Create a new analyzer for the given graph.
    pub fn new(graph: &'a ConstraintGraph) -> Self {
        let mut topology = DiGraph::with_capacity(graph.states().len(), graph.edges().len());
        for state in graph.states() {
            topology.add_node(state.id());
        }
        for edge in graph.edges().iter().filter(|edge| edge.weight() > 0) {
            topology.add_edge(
                NodeIndex::new(edge.from().0),
                NodeIndex::new(edge.to().0),
                edge.id(),
            );
        }
        Self { graph, topology }
    }

    fn node(&self, state: StateId) -> GraphResult<NodeIndex> {
        self.graph.state(state)?;
        Ok(NodeIndex::new(state.0))
    }

    /// States reachable from `from`, including itself, in breadth-first order.
    pub fn reachable_states(&self, from: StateId) -> GraphResult<Vec<StateId>> {
        let mut bfs = Bfs::new(&self.topology, self.node(from)?);
        let mut reachable = Vec::new();
        while let Some(node) = bfs.next(&self.topology) {
            reachable.push(self.topology[node]);
        }
        Ok(reachable)
    }

    /// States without any selectable outgoing edge.
    pub fn dead_ends(&self) -> Vec<StateId> {
        self.topology
            .node_indices()
            .filter(|&node| self.topology.edges(node).next().is_none())
            .map(|node| self.topology[node])
            .collect()
    }

    /// Groups of mutually reachable states.
    pub fn strongly_connected_components(&self) -> Vec<Vec<StateId>> {
        kosaraju_scc(&self.topology)
            .into_iter()
            .map(|component| {
                let mut states: Vec<StateId> =
                    component.into_iter().map(|node| self.topology[node]).collect();
                states.sort();
                states
            })
            .collect()
    }

    /// Whether every state can reach every other state.
    pub fn is_strongly_connected(&self) -> bool {
        self.topology.node_count() > 0 && kosaraju_scc(&self.topology).len() == 1
    }

    /// Fewest edges leading from `from` to `to`, `None` if `to` is unreachable.
    pub fn shortest_edge_sequence(
        &self,
        from: StateId,
        to: StateId,
    ) -> GraphResult<Option<Vec<EdgeId>>> {
        let start = self.node(from)?;
        let goal = self.node(to)?;

        let mut predecessor: HashMap<NodeIndex, (NodeIndex, EdgeId)> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        let mut visited = vec![false; self.topology.node_count()];
        visited[start.index()] = true;

        while let Some(node) = queue.pop_front() {
            if node == goal {
                let mut sequence = Vec::new();
                let mut current = goal;
                while let Some(&(previous, edge)) = predecessor.get(&current) {
                    sequence.push(edge);
                    current = previous;
                }
                sequence.reverse();
                return Ok(Some(sequence));
            }
            // Creation order of the edges decides ties.
            let mut outgoing: Vec<_> = self.topology.edges(node).collect();
            outgoing.sort_by_key(|edge| *edge.weight());
            for edge in outgoing {
                let target = edge.target();
                if !visited[target.index()] {
                    visited[target.index()] = true;
                    predecessor.insert(target, (node, *edge.weight()));
                    queue.push_back(target);
                }
            }
        }
        Ok(None)
    }

    /// Structural diagnostics of the graph.
    pub fn analyze(&self) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        for selector in self.graph.node_selectors() {
            if selector.states().is_empty() {
                warnings.push(ValidationWarning {
                    message: format!("Node selector '{}' has no state", selector.name()),
                    edge: None,
                    state: None,
                    suggestion: Some("Remove the selector or add states to it".to_string()),
                });
            }
        }

        for edge in self.graph.edges().iter().filter(|edge| edge.weight() == 0) {
            warnings.push(ValidationWarning {
                message: format!("Edge '{}' has weight 0 and is never selected", edge.name()),
                edge: Some(edge.name().to_string()),
                state: None,
                suggestion: None,
            });
        }

        for state in self.dead_ends() {
            warnings.push(ValidationWarning {
                message: "State has no selectable outgoing edge".to_string(),
                edge: None,
                state: self.state_name(state),
                suggestion: Some("Add an edge leaving this state".to_string()),
            });
        }

        if let Some(root) = self.graph.states().first() {
            if let Ok(reachable) = self.reachable_states(root.id()) {
                for state in self.graph.states() {
                    if !reachable.contains(&state.id()) {
                        warnings.push(ValidationWarning {
                            message: format!("State is unreachable from '{}'", root.name()),
                            edge: None,
                            state: Some(state.name().to_string()),
                            suggestion: None,
                        });
                    }
                }
            }
        }

        warnings
    }

    fn state_name(&self, state: StateId) -> Option<String> {
        self.graph.state(state).ok().map(|state| state.name().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::EdgeDefinition;
    use crate::testing::{interval_graph, state_id, AcceptAll};

    fn chain() -> ConstraintGraph {
        let mut graph = interval_graph(
            &[("free", 0.0, 1.0), ("grasped", 1.0, 2.0), ("placed", 2.0, 3.0)],
            AcceptAll::factory(),
        );
        let free = state_id(&graph, "free");
        let grasped = state_id(&graph, "grasped");
        let placed = state_id(&graph, "placed");
        graph.create_edge(EdgeDefinition::new("grasp", free, grasped)).unwrap();
        graph.create_edge(EdgeDefinition::new("place", grasped, placed)).unwrap();
        graph.create_edge(EdgeDefinition::new("shortcut", free, placed).weight(0)).unwrap();
        graph
    }

    #[test]
    fn test_reachability() {
        let graph = chain();
        let analyzer = TopologyAnalyzer::new(&graph);
        let free = state_id(&graph, "free");
        let placed = state_id(&graph, "placed");

        assert_eq!(analyzer.reachable_states(free).unwrap().len(), 3);
        assert_eq!(analyzer.reachable_states(placed).unwrap(), vec![placed]);
        assert!(analyzer.reachable_states(StateId(9)).is_err());
    }

    #[test]
    fn test_dead_ends_and_connectivity() {
        let mut graph = chain();
        let analyzer = TopologyAnalyzer::new(&graph);
        assert_eq!(analyzer.dead_ends(), vec![state_id(&graph, "placed")]);
        assert!(!analyzer.is_strongly_connected());
        assert_eq!(analyzer.strongly_connected_components().len(), 3);

        let free = state_id(&graph, "free");
        let placed = state_id(&graph, "placed");
        graph.create_edge(EdgeDefinition::new("release", placed, free)).unwrap();
        let analyzer = TopologyAnalyzer::new(&graph);
        assert!(analyzer.dead_ends().is_empty());
        assert!(analyzer.is_strongly_connected());
    }

    #[test]
    fn test_shortest_edge_sequence_skips_unselectable_edges() {
        let graph = chain();
        let analyzer = TopologyAnalyzer::new(&graph);
        let free = state_id(&graph, "free");
        let placed = state_id(&graph, "placed");

        let sequence = analyzer.shortest_edge_sequence(free, placed).unwrap().unwrap();
        let names: Vec<&str> = sequence
            .iter()
            .map(|&edge| graph.edge(edge).unwrap().name())
            .collect();
        assert_eq!(names, vec!["grasp", "place"]);

        assert_eq!(analyzer.shortest_edge_sequence(free, free).unwrap(), Some(vec![]));
        assert_eq!(analyzer.shortest_edge_sequence(placed, free).unwrap(), None);
    }

    #[test]
    fn test_analyze_reports_structure() {
        let mut graph = chain();
        graph.create_node_selector("unused").unwrap();
        let warnings = TopologyAnalyzer::new(&graph).analyze();

        assert!(warnings.iter().any(|w| w.message.contains("'unused'")));
        assert!(warnings.iter().any(|w| w.edge.as_deref() == Some("shortcut")));
        assert!(warnings
            .iter()
            .any(|w| w.state.as_deref() == Some("placed") && w.suggestion.is_some()));
        assert!(!warnings.iter().any(|w| w.message.contains("unreachable")));
    }
}
