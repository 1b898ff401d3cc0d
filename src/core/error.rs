//! Error types for graspgraph.
//!
//! Uses thiserror for structured errors with context. The taxonomy follows
//! the three failure classes of path validation:
//! - fatal errors abort a call and are returned as `Err`
//! - expected validation failures are reported through [`PathValidationReport`]
//! - recoverable classification ambiguity becomes a [`ValidationWarning`]

use crate::core::types::Configuration;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Index of a state in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub usize);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state#{}", self.0)
    }
}

/// Index of an edge in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub usize);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "edge#{}", self.0)
    }
}

/// Index of a node selector in its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeSelectorId(pub usize);

impl fmt::Display for NodeSelectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "selector#{}", self.0)
    }
}

/// Unique identifier for an obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObstacleId(pub Uuid);

impl ObstacleId {
    /// Create a new random obstacle ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObstacleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObstacleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Top-level error type for graspgraph.
#[derive(Error, Debug)]
pub enum GraspGraphError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Constraint error: {0}")]
    Constraint(#[from] ConstraintError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Settings error: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors related to the constraint graph topology and classification.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphError {
    #[error("Node selector '{0}' not found")]
    NodeSelectorNotFound(String),

    #[error("Node selector '{0}' already exists")]
    DuplicateNodeSelector(String),

    #[error("Node selector {0} not found")]
    UnknownNodeSelector(NodeSelectorId),

    #[error("State {0} not found")]
    StateNotFound(StateId),

    #[error("Edge {0} not found")]
    EdgeNotFound(EdgeId),

    #[error("No state contains configuration {configuration}")]
    ClassificationFailure { configuration: Configuration },

    #[error("State '{state}' has no selectable outgoing edge")]
    NoOutgoingEdge { state: String },

    #[error("Configuration has {got} coordinates, robot expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Invalid setting '{name}': {reason}")]
    InvalidSetting { name: String, reason: String },

    #[error("Constraint error while building '{name}': {error}")]
    Constraint { name: String, error: String },
}

/// Errors raised while evaluating constraints or projecting configurations.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstraintError {
    #[error("Function '{function}' expects {expected} coordinates, got {got}")]
    DimensionMismatch {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("Function '{function}' has {expected} outputs but a right-hand side of length {got}")]
    RightHandSideMismatch {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("Function '{function}' cannot be evaluated: {reason}")]
    EvaluationFailure { function: String, reason: String },

    #[error("Projection '{projector}' did not converge after {iterations} iterations (squared error {error:e})")]
    ProjectionFailure {
        projector: String,
        iterations: usize,
        error: f64,
    },

    #[error("Path cannot be evaluated at parameter {parameter}")]
    OutOfRange { parameter: f64 },
}

/// Fatal errors from path validation.
///
/// Expected failures (collisions, truncations, state crossings) are never
/// reported through this type.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Segment references {0}, which is not part of the constraint graph")]
    UnknownEdge(EdgeId),

    #[error("Path has {got} coordinates, robot expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Base validator '{validator}' failed: {error}")]
    Validator { validator: String, error: String },
}

impl From<GraphError> for ValidationError {
    fn from(error: GraphError) -> Self {
        match error {
            GraphError::EdgeNotFound(edge) => ValidationError::UnknownEdge(edge),
            GraphError::DimensionMismatch { expected, got } => {
                ValidationError::DimensionMismatch { expected, got }
            }
            other => ValidationError::Validator {
                validator: "graph".to_string(),
                error: other.to_string(),
            },
        }
    }
}

/// Result type alias for graspgraph operations.
pub type GraspGraphResult<T> = Result<T, GraspGraphError>;

/// Result type alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type alias for constraint operations.
pub type ConstraintResult<T> = Result<T, ConstraintError>;

/// Result type alias for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// ============================================================================
// Validation Report
// ============================================================================

/// Why a path, or part of it, was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PathValidationFailure {
    /// A sampled configuration lies inside an obstacle.
    Collision { obstacle: String, parameter: f64 },
    /// A configuration of the path cannot be evaluated or projected.
    Projection { parameter: f64, reason: String },
    /// The truncated part does not join the states of the original segment.
    StateCrossing {
        edge: Option<String>,
        expected: (String, String),
        found: (String, String),
    },
    /// An endpoint of the segment belongs to no state.
    Classification {
        edge: Option<String>,
        state: Option<String>,
        reason: String,
    },
}

impl PathValidationFailure {
    /// Path parameter at which the failure was detected, if it has one.
    pub fn parameter(&self) -> Option<f64> {
        match self {
            PathValidationFailure::Collision { parameter, .. }
            | PathValidationFailure::Projection { parameter, .. } => Some(*parameter),
            _ => None,
        }
    }
}

impl fmt::Display for PathValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathValidationFailure::Collision { obstacle, parameter } => {
                write!(f, "collision with '{}' at parameter {}", obstacle, parameter)
            }
            PathValidationFailure::Projection { parameter, reason } => {
                write!(f, "projection failed at parameter {}: {}", parameter, reason)
            }
            PathValidationFailure::StateCrossing {
                edge,
                expected,
                found,
            } => write!(
                f,
                "edge {} expected {} -> {}, truncated part goes {} -> {}",
                edge.as_deref().unwrap_or("<default>"),
                expected.0,
                expected.1,
                found.0,
                found.1
            ),
            PathValidationFailure::Classification { edge, state, reason } => write!(
                f,
                "classification failed on edge {} (state {}): {}",
                edge.as_deref().unwrap_or("<default>"),
                state.as_deref().unwrap_or("<none>"),
                reason
            ),
        }
    }
}

/// Non-fatal diagnostic emitted during validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    /// Warning message.
    pub message: String,
    /// Edge that triggered the warning, if applicable.
    pub edge: Option<String>,
    /// State that triggered the warning, if applicable.
    pub state: Option<String>,
    /// Suggestion for addressing the warning.
    pub suggestion: Option<String>,
}

/// Report accumulated while validating a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathValidationReport {
    /// Whether the path was accepted in full.
    pub success: bool,
    /// Failures found, in traversal order.
    pub failures: Vec<PathValidationFailure>,
    /// Diagnostics that did not abort validation.
    pub warnings: Vec<ValidationWarning>,
}

impl PathValidationReport {
    /// Create a new empty report (success).
    pub fn new() -> Self {
        Self {
            success: true,
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add a failure to the report.
    pub fn add_failure(&mut self, failure: PathValidationFailure) {
        self.success = false;
        self.failures.push(failure);
    }

    /// Add a warning to the report.
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: PathValidationReport) {
        self.success &= other.success;
        self.failures.extend(other.failures);
        self.warnings.extend(other.warnings);
    }

    /// Parameter of the first failure that carries one.
    pub fn first_failure_parameter(&self) -> Option<f64> {
        self.failures.iter().find_map(PathValidationFailure::parameter)
    }

    /// Get a human-readable summary.
    pub fn summary(&self) -> String {
        if self.success {
            if self.warnings.is_empty() {
                "✓ Path is valid".to_string()
            } else {
                format!("✓ Path is valid with {} warning(s)", self.warnings.len())
            }
        } else {
            format!(
                "✗ Path validation failed with {} failure(s)",
                self.failures.len()
            )
        }
    }

    /// Get detailed failure messages.
    pub fn detailed_failures(&self) -> Vec<String> {
        self.failures
            .iter()
            .enumerate()
            .map(|(i, failure)| format!("{}. {}", i + 1, failure))
            .collect()
    }
}

impl Default for PathValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obstacle_id_display() {
        let id = ObstacleId::new();
        assert_eq!(format!("{}", id).len(), 8);
    }

    #[test]
    fn test_report_collects_failures() {
        let mut report = PathValidationReport::new();
        assert!(report.success);

        report.add_failure(PathValidationFailure::StateCrossing {
            edge: Some("transit".to_string()),
            expected: ("free".to_string(), "free".to_string()),
            found: ("free".to_string(), "grasped".to_string()),
        });
        report.add_failure(PathValidationFailure::Collision {
            obstacle: "table".to_string(),
            parameter: 0.25,
        });

        assert!(!report.success);
        assert_eq!(report.first_failure_parameter(), Some(0.25));
        assert!(report.summary().contains("2 failure"));
        assert!(report.detailed_failures()[0].starts_with("1. edge transit"));
    }

    #[test]
    fn test_merge_keeps_failure() {
        let mut ok = PathValidationReport::new();
        let mut failed = PathValidationReport::new();
        failed.add_failure(PathValidationFailure::Projection {
            parameter: 1.0,
            reason: "diverged".to_string(),
        });

        ok.merge(failed);
        assert!(!ok.success);
        assert_eq!(ok.failures.len(), 1);
    }

    #[test]
    fn test_graph_error_converts_to_validation_error() {
        let error: ValidationError = GraphError::EdgeNotFound(EdgeId(3)).into();
        assert_eq!(error, ValidationError::UnknownEdge(EdgeId(3)));

        let error: ValidationError = GraphError::DimensionMismatch { expected: 2, got: 3 }.into();
        assert!(matches!(error, ValidationError::DimensionMismatch { expected: 2, got: 3 }));
    }
}
