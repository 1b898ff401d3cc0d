//! Shared fixtures for unit tests.

use crate::core::constraint::{check_input, AffineFunction, DifferentiableFunction, NumericalConstraint};
use crate::core::error::{
    ConstraintResult, PathValidationFailure, PathValidationReport, StateId, ValidationError,
    ValidationResult,
};
use crate::core::path::{AtomicPath, Path};
use crate::core::robot::{CartesianRobot, Robot};
use crate::core::types::{Configuration, TimeRange};
use crate::graph::edge::Edge;
use crate::graph::structure::ConstraintGraph;
use crate::validation::validator::{Obstacle, PathValidation, PathValidator, ValidatorFactory};
use std::sync::Arc;

/// Route `log` output through the test harness.
pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn planar_robot() -> Arc<dyn Robot> {
    Arc::new(CartesianRobot::new("planar", 2))
}

pub(crate) fn q(values: &[f64]) -> Configuration {
    Configuration::new(values.to_vec())
}

pub(crate) fn line(from: &[f64], to: &[f64], range: TimeRange) -> AtomicPath {
    AtomicPath::straight(q(from), q(to), range)
}

/// Zero inside `[lower, upper]` along one coordinate, distance outside.
#[derive(Debug)]
pub(crate) struct IntervalFunction {
    name: String,
    input_size: usize,
    index: usize,
    lower: f64,
    upper: f64,
}

impl DifferentiableFunction for IntervalFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        1
    }

    fn value(&self, q: &Configuration) -> ConstraintResult<Vec<f64>> {
        check_input(self, q)?;
        let x = q[self.index];
        let distance = if x < self.lower {
            self.lower - x
        } else if x > self.upper {
            x - self.upper
        } else {
            0.0
        };
        Ok(vec![distance])
    }
}

pub(crate) fn interval(name: &str, index: usize, lower: f64, upper: f64) -> NumericalConstraint {
    NumericalConstraint::new(Arc::new(IntervalFunction {
        name: name.to_string(),
        input_size: 2,
        index,
        lower,
        upper,
    }))
}

pub(crate) fn locked(name: &str, index: usize, target: f64) -> NumericalConstraint {
    NumericalConstraint::new(Arc::new(AffineFunction::coordinate(name, 2, index, target)))
}

/// Planar graph with one selector whose states are intervals of `x`.
pub(crate) fn interval_graph(
    regions: &[(&str, f64, f64)],
    factory: ValidatorFactory,
) -> ConstraintGraph {
    let mut graph = ConstraintGraph::new("fixture", planar_robot(), factory);
    let selector = graph.create_node_selector("main").unwrap();
    for (name, lower, upper) in regions {
        graph
            .create_state(selector, *name, vec![interval(name, 0, *lower, *upper)])
            .unwrap();
    }
    graph
}

pub(crate) fn state_id(graph: &ConstraintGraph, name: &str) -> StateId {
    graph.state_by_name(name).unwrap().id()
}

/// Accepts every path.
#[derive(Debug, Default)]
pub(crate) struct AcceptAll {
    pub obstacles: Vec<Obstacle>,
}

impl AcceptAll {
    pub(crate) fn factory() -> ValidatorFactory {
        Arc::new(|_: &Edge| Box::new(AcceptAll::default()) as Box<dyn PathValidator>)
    }
}

impl PathValidator for AcceptAll {
    fn name(&self) -> &str {
        "accept-all"
    }

    fn validate(&self, path: &Path, _reverse: bool) -> ValidationResult<PathValidation> {
        Ok(PathValidation::accepted(path.clone()))
    }

    fn add_obstacle(&mut self, obstacle: Obstacle) {
        self.obstacles.push(obstacle);
    }
}

/// Keeps only the first `fraction` of every path, in traversal order.
#[derive(Debug)]
pub(crate) struct TruncateAt {
    pub fraction: f64,
}

impl TruncateAt {
    pub(crate) fn factory(fraction: f64) -> ValidatorFactory {
        Arc::new(move |_: &Edge| Box::new(TruncateAt { fraction }) as Box<dyn PathValidator>)
    }
}

impl PathValidator for TruncateAt {
    fn name(&self) -> &str {
        "truncate"
    }

    fn validate(&self, path: &Path, reverse: bool) -> ValidationResult<PathValidation> {
        if self.fraction >= 1.0 {
            return Ok(PathValidation::accepted(path.clone()));
        }
        let range = path.time_range();
        let cut = range.length() * self.fraction;
        let part = if reverse {
            TimeRange::new(range.end - cut, range.end)
        } else {
            TimeRange::new(range.start, range.start + cut)
        };
        let mut report = PathValidationReport::new();
        report.add_failure(PathValidationFailure::Collision {
            obstacle: "fixture".to_string(),
            parameter: part.traversal_end(reverse),
        });
        Ok(PathValidation::truncated(path.extract(part), report))
    }

    fn add_obstacle(&mut self, _obstacle: Obstacle) {}
}

/// Fails every call.
#[derive(Debug)]
pub(crate) struct Broken;

impl PathValidator for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn validate(&self, _path: &Path, _reverse: bool) -> ValidationResult<PathValidation> {
        Err(ValidationError::Validator {
            validator: "broken".to_string(),
            error: "collision model not loaded".to_string(),
        })
    }

    fn add_obstacle(&mut self, _obstacle: Obstacle) {}
}
