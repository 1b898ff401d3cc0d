//! Graph-aware path validation.
//!
//! [`GraphPathValidator`] splits a path into its atomic segments, hands each
//! one to the validator of the edge it was planned along (or to the default
//! validator), and checks that whatever part survives still joins the states
//! the segment was meant to join.

use crate::core::error::{
    GraphError, PathValidationFailure, PathValidationReport, StateId, ValidationError,
    ValidationResult, ValidationWarning,
};
use crate::core::path::{AtomicPath, Path, PathVector};
use crate::core::types::Configuration;
use crate::graph::edge::Edge;
use crate::graph::structure::ConstraintGraph;
use crate::validation::validator::{Obstacle, PathValidation, PathValidator};
use log::{debug, log_enabled, warn, Level};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What to keep when a truncated segment ends up in other states than the
/// segment it was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingPolicy {
    /// Keep nothing: zero-length part at the traversal start.
    #[default]
    ZeroLength,
    /// Keep the part returned by the base validator.
    KeepRawPrefix,
}

/// Options for graph-aware validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphValidationOptions {
    /// Recovery on state crossing.
    pub crossing_policy: CrossingPolicy,
    /// Reject paths whose configuration size differs from the robot's.
    pub check_dimensions: bool,
}

impl Default for GraphValidationOptions {
    fn default() -> Self {
        Self {
            crossing_policy: CrossingPolicy::default(),
            check_dimensions: true,
        }
    }
}

impl GraphValidationOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the crossing policy.
    pub fn with_crossing_policy(mut self, policy: CrossingPolicy) -> Self {
        self.crossing_policy = policy;
        self
    }

    /// Enable or disable the dimension check.
    pub fn with_dimension_check(mut self, check: bool) -> Self {
        self.check_dimensions = check;
        self
    }
}

/// Path validator aware of the constraint graph.
pub struct GraphPathValidator {
    default: Box<dyn PathValidator>,
    graph: Arc<ConstraintGraph>,
    options: GraphValidationOptions,
}

impl GraphPathValidator {
    /// Validate untagged segments with `default` and edge segments with the
    /// validators of `graph`.
    pub fn new(default: Box<dyn PathValidator>, graph: Arc<ConstraintGraph>) -> Self {
        Self {
            default,
            graph,
            options: GraphValidationOptions::default(),
        }
    }

    /// Set the options (builder style).
    pub fn with_options(mut self, options: GraphValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// The graph paths are checked against.
    pub fn graph(&self) -> &Arc<ConstraintGraph> {
        &self.graph
    }

    /// Current options.
    pub fn options(&self) -> &GraphValidationOptions {
        &self.options
    }

    fn validate_path(&self, path: &Path, reverse: bool) -> ValidationResult<PathValidation> {
        match path {
            Path::Atomic(atomic) => self.validate_atomic(atomic, path, reverse),
            Path::Composite(vector) => self.validate_composite(vector, reverse),
        }
    }

    /// Greedy: the first segment not fully valid ends the traversal.
    fn validate_composite(
        &self,
        vector: &PathVector,
        reverse: bool,
    ) -> ValidationResult<PathValidation> {
        let paths = vector.paths();
        let mut report = PathValidationReport::new();
        let order: Vec<usize> = if reverse {
            (0..paths.len()).rev().collect()
        } else {
            (0..paths.len()).collect()
        };

        for rank in order {
            let outcome = self.validate_path(&paths[rank], reverse)?;
            report.merge(outcome.report);
            if outcome.valid {
                continue;
            }

            debug!(
                "Segment {} of {} is not fully valid, stopping traversal",
                rank,
                paths.len()
            );
            let mut valid_part = PathVector::new(vector.config_size());
            if reverse {
                valid_part.append(outcome.valid_part);
                for later in &paths[rank + 1..] {
                    valid_part.append(later.clone());
                }
            } else {
                for earlier in &paths[..rank] {
                    valid_part.append(earlier.clone());
                }
                valid_part.append(outcome.valid_part);
            }
            return Ok(PathValidation::truncated(valid_part.into(), report));
        }

        Ok(PathValidation {
            valid: true,
            valid_part: Path::Composite(vector.clone()),
            report,
        })
    }

    fn validate_atomic(
        &self,
        atomic: &AtomicPath,
        path: &Path,
        reverse: bool,
    ) -> ValidationResult<PathValidation> {
        let edge = match atomic.edge() {
            Some(id) => Some(self.graph.edge(id)?),
            None => None,
        };

        let outcome = match edge {
            Some(edge) => {
                let validator = self.graph.edge_path_validator(edge.id())?;
                validator.validate(path, reverse)?
            }
            None => self.default.validate(path, reverse)?,
        };

        // A fully accepted segment is trusted to stay on its edge.
        if outcome.valid {
            return Ok(outcome);
        }
        self.reconcile(path, edge, outcome, reverse)
    }

    /// Check that the truncated part joins the same states as `original`.
    fn reconcile(
        &self,
        original: &Path,
        edge: Option<&Edge>,
        outcome: PathValidation,
        reverse: bool,
    ) -> ValidationResult<PathValidation> {
        let PathValidation {
            valid_part,
            mut report,
            ..
        } = outcome;
        let edge_name = edge.map(|edge| edge.name().to_string());
        let fallback = original.traversal_start(reverse);

        let truncated_range = valid_part.time_range();
        let original_range = original.time_range();
        let endpoints = [
            (&valid_part, truncated_range.start),
            (&valid_part, truncated_range.end),
            (original, original_range.start),
            (original, original_range.end),
        ];

        let mut configurations: Vec<Configuration> = Vec::with_capacity(endpoints.len());
        for (path, t) in endpoints {
            match path.eval(t) {
                Ok(q) => configurations.push(q),
                Err(error) => {
                    debug!(
                        "Cannot evaluate segment of edge {} at {}: {}",
                        edge_name.as_deref().unwrap_or("<default>"),
                        t,
                        error
                    );
                    report.add_failure(PathValidationFailure::Projection {
                        parameter: t,
                        reason: error.to_string(),
                    });
                    return Ok(PathValidation::truncated(fallback, report));
                }
            }
        }

        let mut states: Vec<StateId> = Vec::with_capacity(configurations.len());
        for q in &configurations {
            match self.graph.get_state(q) {
                Ok(state) => states.push(state),
                Err(error @ GraphError::ClassificationFailure { .. }) => {
                    let state_name = edge
                        .and_then(|edge| self.graph.state(edge.state()).ok())
                        .map(|state| state.name().to_string());
                    warn!(
                        "Configuration {} on edge {} belongs to no state (edge lies in state {}). \
                         The state tolerance may be tighter than what the path constraint enforces.",
                        q,
                        edge_name.as_deref().unwrap_or("<default>"),
                        state_name.as_deref().unwrap_or("<none>")
                    );
                    report.add_failure(PathValidationFailure::Classification {
                        edge: edge_name.clone(),
                        state: state_name.clone(),
                        reason: error.to_string(),
                    });
                    report.add_warning(ValidationWarning {
                        message: format!("Truncated segment reaches {} outside every state", q),
                        edge: edge_name,
                        state: state_name,
                        suggestion: Some(
                            "Lock every constraint of the state along the edge or relax the error threshold"
                                .to_string(),
                        ),
                    });
                    return Ok(PathValidation::truncated(fallback, report));
                }
                Err(error) => return Err(ValidationError::from(error)),
            }
        }

        let found = (states[0], states[1]);
        let expected = (states[2], states[3]);
        if found == expected {
            return Ok(PathValidation::truncated(valid_part, report));
        }

        report.add_failure(PathValidationFailure::StateCrossing {
            edge: edge_name.clone(),
            expected: (self.state_name(expected.0), self.state_name(expected.1)),
            found: (self.state_name(found.0), self.state_name(found.1)),
        });
        debug!(
            "Truncated segment of edge {} crosses states, applying {:?}",
            edge_name.as_deref().unwrap_or("<default>"),
            self.options.crossing_policy
        );
        let kept = match self.options.crossing_policy {
            CrossingPolicy::ZeroLength => fallback,
            CrossingPolicy::KeepRawPrefix => valid_part,
        };
        Ok(PathValidation::truncated(kept, report))
    }

    fn state_name(&self, state: StateId) -> String {
        self.graph
            .state(state)
            .map(|state| state.name().to_string())
            .unwrap_or_else(|_| state.to_string())
    }

    fn classify(&self, path: &Path, t: f64) -> String {
        path.eval(t)
            .ok()
            .and_then(|q| self.graph.get_state(&q).ok())
            .map(|state| self.state_name(state))
            .unwrap_or_else(|| "<unclassified>".to_string())
    }
}

impl PathValidator for GraphPathValidator {
    fn name(&self) -> &str {
        "graph"
    }

    fn validate(&self, path: &Path, reverse: bool) -> ValidationResult<PathValidation> {
        if self.options.check_dimensions {
            let expected = self.graph.robot().config_size();
            if path.config_size() != expected {
                return Err(ValidationError::DimensionMismatch {
                    expected,
                    got: path.config_size(),
                });
            }
        }

        let outcome = self.validate_path(path, reverse)?;

        if log_enabled!(Level::Debug) {
            let range = outcome.valid_part.time_range();
            debug!(
                "Valid part {} runs from '{}' to '{}' (valid: {})",
                range,
                self.classify(&outcome.valid_part, range.start),
                self.classify(&outcome.valid_part, range.end),
                outcome.valid
            );
        }
        Ok(outcome)
    }

    fn add_obstacle(&mut self, obstacle: Obstacle) {
        self.default.add_obstacle(obstacle.clone());
        self.graph.add_obstacle(obstacle);
    }
}
