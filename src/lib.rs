//! # graspgraph - Constraint graphs for manipulation planning
//!
//! graspgraph models a manipulation problem as a constraint graph: states are
//! classes of configurations sharing grasp and placement constraints, edges
//! are the legal motions between them. It validates candidate paths against
//! both geometry and the graph.
//!
//! ## Features
//!
//! - **Constraint graph**: node selectors, states and weighted edges stored in arenas
//! - **Deterministic classification**: configurations map to the first matching state
//! - **Graph-aware validation**: truncated paths are checked against the states they join
//! - **Foliation support**: leaf-preserving projectors built from parametric constraints
//! - **Grasp constraints**: grasp, pre-grasp and complement constraints from handles
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use graspgraph::prelude::*;
//! use std::sync::Arc;
//!
//! let robot: Arc<dyn Robot> = Arc::new(CartesianRobot::new("planar", 2));
//! let mut graph = ConstraintGraph::new("pick", robot, DiscretizedCollisionValidator::factory(0.01));
//!
//! let gripper = graph.create_node_selector("gripper")?;
//! let free = graph.create_state(gripper, "free", free_constraints)?;
//! let grasped = graph.create_state(gripper, "grasped", grasp_constraints)?;
//! let grasp = graph.create_edge(EdgeDefinition::new("grasp", free, grasped).kind(EdgeKind::Grasp))?;
//!
//! let graph = Arc::new(graph);
//! let mut validator = GraphPathValidator::new(
//!     Box::new(DiscretizedCollisionValidator::new(0.01)),
//!     graph.clone(),
//! );
//! validator.add_obstacle(Obstacle::new("table", lower, upper));
//!
//! let constraints = graph.edge_constraints(grasp, &start)?;
//! let path = Path::from(AtomicPath::straight(start, goal, TimeRange::new(0.0, 1.0)).with_constraints(constraints));
//! let outcome = validator.validate(&path, false)?;
//! println!("{}", outcome.report.summary());
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`core`]: Configurations, constraints, paths, robot model, handles and errors
//! - [`graph`]: Constraint graph structure, settings, topology analysis and export
//! - [`validation`]: Base path validators and the graph-aware validator

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod graph;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use graspgraph::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::types::{Configuration, TimeRange, Transform3};

    // Constraints
    pub use crate::core::constraint::{
        AffineFunction, ConfigProjector, DifferentiableFunction, NumericalConstraint,
    };

    // Paths
    pub use crate::core::path::{AtomicPath, Path, PathVector, Segment, SegmentConstraints, StraightSegment};

    // Robot and grasps
    pub use crate::core::robot::{CartesianJoint, CartesianRobot, Robot};
    pub use crate::core::handle::{Gripper, Handle};

    // Errors
    pub use crate::core::error::{
        ConstraintError, EdgeId, GraphError, GraspGraphError, NodeSelectorId, ObstacleId,
        PathValidationFailure, PathValidationReport, StateId, ValidationError, ValidationWarning,
    };

    // Graph
    pub use crate::graph::structure::{ConstraintGraph, NodeSelector, State};
    pub use crate::graph::edge::{Edge, EdgeDefinition, EdgeKind};
    pub use crate::graph::settings::GraphSettings;
    pub use crate::graph::topology::TopologyAnalyzer;
    pub use crate::graph::serialization::SerializedGraph;

    // Validation
    pub use crate::validation::validator::{
        DiscretizedCollisionValidator, Obstacle, PathValidation, PathValidator, ValidatorFactory,
    };
    pub use crate::validation::graph_path::{CrossingPolicy, GraphPathValidator, GraphValidationOptions};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "graspgraph");
    }

    /// Gantry gripper on coordinates 0..3, free box on coordinates 3..6.
    fn pick_and_place() -> (Arc<ConstraintGraph>, EdgeId) {
        let robot: Arc<dyn Robot> = Arc::new(
            CartesianRobot::new("gantry+box", 6)
                .with_joint("gantry", CartesianJoint::free_translation(0))
                .with_joint("box", CartesianJoint::free_translation(3)),
        );
        let gripper = Gripper::new("gripper", "gantry", Transform3::identity());
        let handle = Handle::new("box/handle", Transform3::identity(), "box");
        let grasp = handle.create_grasp(&gripper, robot.clone());

        let mut graph = ConstraintGraph::new("pick-and-place", robot, DiscretizedCollisionValidator::factory(0.1));
        let selector = graph.create_node_selector("gripper").unwrap();
        let grasped = graph
            .create_state(selector, "grasped", vec![NumericalConstraint::new(grasp.clone())])
            .unwrap();
        let free = graph.create_state(selector, "free", Vec::new()).unwrap();

        graph.create_edge(EdgeDefinition::new("transit", free, free)).unwrap();
        graph
            .create_edge(EdgeDefinition::new("grasp", free, grasped).kind(EdgeKind::Grasp))
            .unwrap();
        let transfer = graph
            .create_edge(
                EdgeDefinition::new("transfer", grasped, grasped)
                    .kind(EdgeKind::Transfer)
                    .path_constraint(NumericalConstraint::new(grasp)),
            )
            .unwrap();
        (Arc::new(graph), transfer)
    }

    #[test]
    fn test_grasp_classification() {
        let (graph, _) = pick_and_place();
        let together = Configuration::new(vec![0.2, 0.0, 0.1, 0.2, 0.0, 0.1]);
        let apart = Configuration::new(vec![0.2, 0.0, 0.1, 1.0, 0.0, 0.0]);

        let grasped = graph.state_by_name("grasped").unwrap().id();
        assert_eq!(graph.get_state(&together).unwrap(), grasped);
        assert_ne!(graph.get_state(&apart).unwrap(), grasped);
        assert!(!TopologyAnalyzer::new(&graph).is_strongly_connected());
    }

    #[test]
    fn test_transfer_truncated_by_obstacle() {
        let (graph, transfer) = pick_and_place();
        let mut validator = GraphPathValidator::new(
            Box::new(DiscretizedCollisionValidator::new(0.1)),
            graph.clone(),
        );
        validator.add_obstacle(Obstacle::new(
            "shelf",
            Configuration::new(vec![0.5, -1.0, -1.0, -10.0, -10.0, -10.0]),
            Configuration::new(vec![0.6, 1.0, 1.0, 10.0, 10.0, 10.0]),
        ));

        let start = Configuration::new(vec![0.0; 6]);
        let goal = Configuration::new(vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        let constraints = graph.edge_constraints(transfer, &start).unwrap();
        let path = Path::from(
            AtomicPath::straight(start, goal, TimeRange::new(0.0, 1.0)).with_constraints(constraints),
        );

        let outcome = validator.validate(&path, false).unwrap();
        assert!(!outcome.valid);
        assert!((outcome.valid_part.time_range().end - 0.4).abs() < 1e-9);
        assert!(outcome.report.summary().contains("failed"));
    }
}
