//! Graph export for inspection.
//!
//! Constraint functions are opaque, so a serialized graph records their
//! names only and cannot be turned back into a [`ConstraintGraph`].

use crate::core::error::{EdgeId, StateId};
use crate::graph::edge::EdgeKind;
use crate::graph::settings::GraphSettings;
use crate::graph::structure::ConstraintGraph;
use crate::validation::validator::Obstacle;
use serde::{Deserialize, Serialize};

/// Serializable representation of a node selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedSelector {
    /// Selector name
    pub name: String,
    /// Names of its states, in classification order
    pub states: Vec<String>,
}

/// Serializable representation of a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedState {
    /// State ID
    pub id: StateId,
    /// State name
    pub name: String,
    /// Membership constraint names
    pub constraints: Vec<String>,
}

/// Serializable representation of an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedEdge {
    /// Edge ID
    pub id: EdgeId,
    /// Edge name
    pub name: String,
    /// Kind of motion
    pub kind: EdgeKind,
    /// Source state name
    pub from: String,
    /// Target state name
    pub to: String,
    /// Name of the state the motion lies in
    pub state: String,
    /// Selection weight
    pub weight: u32,
    /// Path constraint names
    pub path_constraints: Vec<String>,
}

/// Serializable representation of a complete graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedGraph {
    /// Format version
    pub version: String,
    /// Graph name
    pub name: String,
    /// Robot name
    pub robot: String,
    /// Projection settings
    pub settings: GraphSettings,
    /// Global constraint names
    pub global_constraints: Vec<String>,
    /// Node selectors in declaration order
    pub selectors: Vec<SerializedSelector>,
    /// All states
    pub states: Vec<SerializedState>,
    /// All edges
    pub edges: Vec<SerializedEdge>,
    /// Registered obstacles
    pub obstacles: Vec<Obstacle>,
}

impl SerializedGraph {
    /// Current format version.
    pub const VERSION: &'static str = "1.0.0";

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to compact JSON (no whitespace).
    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<&ConstraintGraph> for SerializedGraph {
    fn from(graph: &ConstraintGraph) -> Self {
        let state_name = |id: StateId| {
            graph
                .state(id)
                .map(|state| state.name().to_string())
                .unwrap_or_else(|_| id.to_string())
        };

        Self {
            version: Self::VERSION.to_string(),
            name: graph.name().to_string(),
            robot: graph.robot().name().to_string(),
            settings: *graph.settings(),
            global_constraints: graph
                .global_constraints()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            selectors: graph
                .node_selectors()
                .map(|selector| SerializedSelector {
                    name: selector.name().to_string(),
                    states: selector.states().iter().map(|&id| state_name(id)).collect(),
                })
                .collect(),
            states: graph
                .states()
                .iter()
                .map(|state| SerializedState {
                    id: state.id(),
                    name: state.name().to_string(),
                    constraints: state.constraints().iter().map(|c| c.name().to_string()).collect(),
                })
                .collect(),
            edges: graph
                .edges()
                .iter()
                .map(|edge| SerializedEdge {
                    id: edge.id(),
                    name: edge.name().to_string(),
                    kind: edge.kind(),
                    from: state_name(edge.from()),
                    to: state_name(edge.to()),
                    state: state_name(edge.state()),
                    weight: edge.weight(),
                    path_constraints: edge
                        .path_constraints()
                        .iter()
                        .map(|c| c.name().to_string())
                        .collect(),
                })
                .collect(),
            obstacles: graph.obstacles(),
        }
    }
}

impl ConstraintGraph {
    /// Export the topology as pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        SerializedGraph::from(self).to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::EdgeDefinition;
    use crate::testing::{interval_graph, locked, q, state_id, AcceptAll};

    #[test]
    fn test_serialize_graph() {
        let mut graph = interval_graph(&[("free", 0.0, 1.0), ("grasped", 1.0, 2.0)], AcceptAll::factory());
        let free = state_id(&graph, "free");
        let grasped = state_id(&graph, "grasped");
        graph.add_global_constraint(locked("on-floor", 1, 0.0));
        graph
            .create_edge(
                EdgeDefinition::new("grasp", free, grasped)
                    .kind(EdgeKind::Grasp)
                    .path_constraint(locked("height", 1, 0.0)),
            )
            .unwrap();
        graph.add_obstacle(Obstacle::new("table", q(&[0.0, 0.0]), q(&[1.0, 0.1])));

        let json = graph.to_json().unwrap();
        assert!(json.contains("\"grasp\""));
        assert!(json.contains("on-floor"));

        let deserialized = SerializedGraph::from_json(&json).unwrap();
        assert_eq!(deserialized.version, SerializedGraph::VERSION);
        assert_eq!(deserialized.selectors[0].states, vec!["free", "grasped"]);
        assert_eq!(deserialized.edges[0].to, "grasped");
        assert_eq!(deserialized.edges[0].kind, EdgeKind::Grasp);
        assert_eq!(deserialized.edges[0].path_constraints, vec!["height"]);
        assert_eq!(deserialized.obstacles.len(), 1);
        assert_eq!(deserialized, SerializedGraph::from(&graph));

        let compact = deserialized.to_json_compact().unwrap();
        assert!(!compact.contains('\n'));
        assert_eq!(SerializedGraph::from_json(&compact).unwrap(), deserialized);
    }
}
