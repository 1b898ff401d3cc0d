//! Core types and traits for graspgraph.
//!
//! This module contains the foundational types the constraint graph and the
//! validators are built from:
//! - Configurations, time ranges and placements
//! - Differentiable constraints and the configuration projector
//! - Trajectory primitives (atomic and composite paths)
//! - The robot model seam and grasp-constraint factories
//! - Error types and validation reports

pub mod types;
pub mod error;
pub mod constraint;
pub mod path;
pub mod robot;
pub mod handle;

// Re-export commonly used types
pub use types::{Configuration, TimeRange, Transform3};
pub use error::{ConstraintError, GraphError, GraspGraphError, ValidationError};
pub use constraint::{ConfigProjector, DifferentiableFunction, NumericalConstraint};
pub use path::{AtomicPath, Path, PathVector, Segment, SegmentConstraints};
pub use robot::Robot;
pub use handle::{Gripper, Handle};
