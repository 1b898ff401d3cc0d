//! Graph module for managing constraint graphs.
//!
//! A constraint graph is a directed graph whose nodes are states (classes of
//! configurations sharing grasp and placement constraints) and whose edges
//! are legal motions between them.

pub mod structure;
pub mod edge;
pub mod settings;
pub mod topology;
pub mod serialization;

// Re-export commonly used types
pub use structure::{ConstraintGraph, NodeSelector, State};
pub use edge::{Edge, EdgeDefinition, EdgeKind};
pub use settings::GraphSettings;
pub use topology::TopologyAnalyzer;
pub use serialization::SerializedGraph;
