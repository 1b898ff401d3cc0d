//! Convergence settings shared by every projector a graph builds.

use crate::core::error::{GraphError, GraphResult, GraspGraphResult};
use serde::{Deserialize, Serialize};

/// Default iteration bound of configuration projection.
pub const DEFAULT_MAX_ITERATIONS: usize = 40;

/// Default error threshold of configuration projection.
pub const DEFAULT_ERROR_THRESHOLD: f64 = 1e-4;

/// Projection settings of a constraint graph.
///
/// Can be loaded from TOML:
///
/// ```toml
/// max_iterations = 60
/// error_threshold = 1e-5
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Maximal number of projection iterations.
    pub max_iterations: usize,
    /// Residual norm under which a constraint is satisfied.
    pub error_threshold: f64,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
        }
    }
}

impl GraphSettings {
    /// Create default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration bound.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Set the error threshold.
    pub fn with_error_threshold(mut self, threshold: f64) -> Self {
        self.error_threshold = threshold;
        self
    }

    /// Parse and validate settings from a TOML document.
    pub fn from_toml_str(source: &str) -> GraspGraphResult<Self> {
        let settings: GraphSettings = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check that both values are usable.
    pub fn validate(&self) -> GraphResult<()> {
        if self.max_iterations == 0 {
            return Err(GraphError::InvalidSetting {
                name: "max_iterations".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.error_threshold.is_finite() && self.error_threshold > 0.0) {
            return Err(GraphError::InvalidSetting {
                name: "error_threshold".to_string(),
                reason: format!("must be a positive number, got {}", self.error_threshold),
            });
        }
        Ok(())
    }
}
