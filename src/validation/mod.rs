//! Validation module for planned paths.
//!
//! Base validators check geometric validity of a path; the graph-aware
//! validator additionally checks that truncated paths stay consistent with
//! the constraint graph.

pub mod validator;
pub mod graph_path;

pub use validator::{
    DiscretizedCollisionValidator, Obstacle, PathValidation, PathValidator, ValidatorFactory,
};
pub use graph_path::{CrossingPolicy, GraphPathValidator, GraphValidationOptions};
