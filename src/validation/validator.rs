//! Base path validators.
//!
//! A [`PathValidator`] checks a path and returns the longest valid part
//! starting at the traversal start. The graph-aware validator is itself a
//! `PathValidator` delegating to base validators for individual segments.

use crate::core::error::{
    ObstacleId, PathValidationFailure, PathValidationReport, ValidationResult,
};
use crate::core::path::Path;
use crate::core::types::{Configuration, TimeRange};
use crate::graph::edge::Edge;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sampling step used when a non-positive step is requested.
pub const DEFAULT_STEP: f64 = 0.01;

/// Smallest sampling step accepted by [`DiscretizedCollisionValidator`].
pub const MIN_STEP: f64 = 1e-6;

/// Upper bound on the samples taken along one path.
pub const MAX_SAMPLES: usize = 1_000_000;

/// Outcome of validating a path.
#[derive(Debug, Clone)]
pub struct PathValidation {
    /// Whether the whole path is valid.
    pub valid: bool,
    /// Longest valid part, starting at the traversal start.
    pub valid_part: Path,
    /// What was found along the way.
    pub report: PathValidationReport,
}

impl PathValidation {
    /// The whole path is valid.
    pub fn accepted(path: Path) -> Self {
        Self {
            valid: true,
            valid_part: path,
            report: PathValidationReport::new(),
        }
    }

    /// Only `valid_part` is valid.
    pub fn truncated(valid_part: Path, mut report: PathValidationReport) -> Self {
        report.success = false;
        Self {
            valid: false,
            valid_part,
            report,
        }
    }
}

/// Trait for path validators.
pub trait PathValidator: Send + Sync {
    /// Name of this validator, used in reports.
    fn name(&self) -> &str;

    /// Validate `path`, traversing it backwards when `reverse` is set.
    ///
    /// Returns `Err` only for fatal errors; invalid paths are reported with
    /// `valid == false`.
    fn validate(&self, path: &Path, reverse: bool) -> ValidationResult<PathValidation>;

    /// Register an obstacle checked by subsequent validations.
    fn add_obstacle(&mut self, obstacle: Obstacle);
}

/// Builds the dedicated validator of an edge.
pub type ValidatorFactory = Arc<dyn Fn(&Edge) -> Box<dyn PathValidator> + Send + Sync>;

/// Axis-aligned box of the configuration space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    /// Unique identifier.
    pub id: ObstacleId,
    /// Name used in reports.
    pub name: String,
    /// Lower corner.
    pub lower: Configuration,
    /// Upper corner.
    pub upper: Configuration,
}

impl Obstacle {
    /// Create an obstacle spanning `[lower, upper]`.
    pub fn new(name: impl Into<String>, lower: Configuration, upper: Configuration) -> Self {
        Self {
            id: ObstacleId::new(),
            name: name.into(),
            lower,
            upper,
        }
    }

    /// Whether `q` lies inside the box.
    pub fn contains(&self, q: &Configuration) -> bool {
        q.len() == self.lower.len()
            && q.len() == self.upper.len()
            && q
                .iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .all(|(x, (lo, hi))| x >= lo && x <= hi)
    }
}

/// Samples the path at a fixed step and stops at the first collision.
#[derive(Debug, Clone)]
pub struct DiscretizedCollisionValidator {
    name: String,
    step: f64,
    obstacles: Vec<Obstacle>,
}

impl DiscretizedCollisionValidator {
    /// Create a validator sampling every `step`, clamped to [`MIN_STEP`].
    pub fn new(step: f64) -> Self {
        Self {
            name: "discretized".to_string(),
            step: if step > 0.0 { step.max(MIN_STEP) } else { DEFAULT_STEP },
            obstacles: Vec::new(),
        }
    }

    /// Rename the validator.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add an obstacle (builder style).
    pub fn with_obstacle(mut self, obstacle: Obstacle) -> Self {
        self.obstacles.push(obstacle);
        self
    }

    /// Factory giving every edge its own validator with the same step.
    pub fn factory(step: f64) -> ValidatorFactory {
        Arc::new(move |edge: &Edge| {
            Box::new(DiscretizedCollisionValidator::new(step).with_name(edge.name()))
                as Box<dyn PathValidator>
        })
    }

    /// Sampling step.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Registered obstacles.
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    fn parameters(&self, range: TimeRange, reverse: bool) -> Vec<f64> {
        let step = self.step.max(range.length() / MAX_SAMPLES as f64);
        let count = ((range.length() / step).ceil().max(0.0) as usize).min(MAX_SAMPLES);
        (0..=count)
            .map(|k| {
                let offset = k as f64 * step;
                if reverse {
                    (range.end - offset).max(range.start)
                } else {
                    (range.start + offset).min(range.end)
                }
            })
            .collect()
    }
}

impl PathValidator for DiscretizedCollisionValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, path: &Path, reverse: bool) -> ValidationResult<PathValidation> {
        let range = path.time_range();
        let mut report = PathValidationReport::new();
        let mut last_valid = None;

        for t in self.parameters(range, reverse) {
            match path.eval(t) {
                Ok(q) => {
                    if let Some(obstacle) = self.obstacles.iter().find(|o| o.contains(&q)) {
                        report.add_failure(PathValidationFailure::Collision {
                            obstacle: obstacle.name.clone(),
                            parameter: t,
                        });
                        break;
                    }
                    last_valid = Some(t);
                }
                Err(error) => {
                    report.add_failure(PathValidationFailure::Projection {
                        parameter: t,
                        reason: error.to_string(),
                    });
                    break;
                }
            }
        }

        if report.success {
            return Ok(PathValidation::accepted(path.clone()));
        }
        let valid_part = match last_valid {
            None => path.traversal_start(reverse),
            Some(t) if reverse => path.extract(TimeRange::new(t, range.end)),
            Some(t) => path.extract(TimeRange::new(range.start, t)),
        };
        Ok(PathValidation::truncated(valid_part, report))
    }

    fn add_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
    }
}
