//! Trajectory primitives.
//!
//! A [`Path`] is either an [`AtomicPath`] (one homogeneous segment) or a
//! [`PathVector`] (an ordered sequence of paths laid end to end). Atomic
//! paths carry the [`SegmentConstraints`] under which they were generated;
//! evaluating them projects the raw segment sample onto those constraints.

use crate::core::constraint::ConfigProjector;
use crate::core::error::{ConstraintError, ConstraintResult, EdgeId};
use crate::core::types::{Configuration, TimeRange, TIME_EPSILON};
use std::fmt;
use std::sync::Arc;

/// A continuous, non-decomposable motion.
pub trait Segment: Send + Sync + fmt::Debug {
    /// Parameter interval.
    fn time_range(&self) -> TimeRange;

    /// Number of configuration coordinates.
    fn config_size(&self) -> usize;

    /// Configuration at `t` before any projection, `None` outside the range.
    fn sample(&self, t: f64) -> Option<Configuration>;

    /// Sub-segment over `range`, keeping the original parametrization.
    fn extract(&self, range: TimeRange) -> Arc<dyn Segment>;
}

/// Linear interpolation between two configurations.
#[derive(Debug, Clone, PartialEq)]
pub struct StraightSegment {
    initial: Configuration,
    end: Configuration,
    range: TimeRange,
}

impl StraightSegment {
    /// Create a segment going from `initial` to `end` over `range`.
    pub fn new(initial: Configuration, end: Configuration, range: TimeRange) -> Self {
        Self {
            initial,
            end,
            range,
        }
    }
}

impl Segment for StraightSegment {
    fn time_range(&self) -> TimeRange {
        self.range
    }

    fn config_size(&self) -> usize {
        self.initial.len()
    }

    fn sample(&self, t: f64) -> Option<Configuration> {
        if !self.range.contains(t) {
            return None;
        }
        if self.range.is_zero_length() {
            return Some(self.initial.clone());
        }
        let alpha = ((t - self.range.start) / self.range.length()).clamp(0.0, 1.0);
        Some(self.initial.interpolate(&self.end, alpha))
    }

    fn extract(&self, range: TimeRange) -> Arc<dyn Segment> {
        let initial = self.sample(range.start).unwrap_or_else(|| self.initial.clone());
        let end = self.sample(range.end).unwrap_or_else(|| self.end.clone());
        Arc::new(StraightSegment::new(initial, end, range))
    }
}

/// Constraint set a segment was generated under.
#[derive(Debug, Clone)]
pub enum SegmentConstraints {
    /// Not tied to a graph edge; validated by the default validator.
    Default {
        /// Optional projector applied on evaluation.
        projector: Option<Arc<ConfigProjector>>,
    },
    /// Generated along `edge`; the projector keeps the motion on its leaf.
    Edge {
        /// Edge the segment traverses.
        edge: EdgeId,
        /// Path constraint of the edge, right-hand side set for the leaf.
        projector: Arc<ConfigProjector>,
    },
}

impl SegmentConstraints {
    /// No constraint at all.
    pub fn none() -> Self {
        SegmentConstraints::Default { projector: None }
    }

    /// Edge the segment was generated along, if any.
    pub fn edge(&self) -> Option<EdgeId> {
        match self {
            SegmentConstraints::Edge { edge, .. } => Some(*edge),
            SegmentConstraints::Default { .. } => None,
        }
    }

    /// Projector applied on evaluation, if any.
    pub fn projector(&self) -> Option<&ConfigProjector> {
        match self {
            SegmentConstraints::Default { projector } => projector.as_deref(),
            SegmentConstraints::Edge { projector, .. } => Some(projector),
        }
    }
}

impl Default for SegmentConstraints {
    fn default() -> Self {
        Self::none()
    }
}

/// One segment with its constraints.
#[derive(Debug, Clone)]
pub struct AtomicPath {
    segment: Arc<dyn Segment>,
    constraints: SegmentConstraints,
}

impl AtomicPath {
    /// Wrap an unconstrained segment.
    pub fn new(segment: Arc<dyn Segment>) -> Self {
        Self {
            segment,
            constraints: SegmentConstraints::none(),
        }
    }

    /// Straight segment from `initial` to `end` over `range`.
    pub fn straight(initial: Configuration, end: Configuration, range: TimeRange) -> Self {
        Self::new(Arc::new(StraightSegment::new(initial, end, range)))
    }

    /// Attach the constraints the segment was generated under.
    pub fn with_constraints(mut self, constraints: SegmentConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Constraints of the segment.
    pub fn constraints(&self) -> &SegmentConstraints {
        &self.constraints
    }

    /// Edge the segment was generated along, if any.
    pub fn edge(&self) -> Option<EdgeId> {
        self.constraints.edge()
    }

    /// Underlying segment.
    pub fn segment(&self) -> &Arc<dyn Segment> {
        &self.segment
    }

    /// Parameter interval.
    pub fn time_range(&self) -> TimeRange {
        self.segment.time_range()
    }

    /// Number of configuration coordinates.
    pub fn config_size(&self) -> usize {
        self.segment.config_size()
    }

    /// Configuration at `t`, projected onto the segment constraints.
    pub fn eval(&self, t: f64) -> ConstraintResult<Configuration> {
        let q = self
            .segment
            .sample(t)
            .ok_or(ConstraintError::OutOfRange { parameter: t })?;
        match self.constraints.projector() {
            Some(projector) if !projector.is_empty() => projector.project(&q),
            _ => Ok(q),
        }
    }

    /// Sub-path over `range` with the same constraints.
    pub fn extract(&self, range: TimeRange) -> AtomicPath {
        AtomicPath {
            segment: self.segment.extract(range),
            constraints: self.constraints.clone(),
        }
    }
}

/// Ordered sequence of paths traversed end to end.
///
/// The parameter of a path vector starts at the first parameter of its first
/// path and runs through the concatenated lengths of all paths.
#[derive(Debug, Clone, Default)]
pub struct PathVector {
    paths: Vec<Path>,
    config_size: usize,
}

impl PathVector {
    /// Create an empty path vector.
    pub fn new(config_size: usize) -> Self {
        Self {
            paths: Vec::new(),
            config_size,
        }
    }

    /// Append a path (builder style).
    pub fn with(mut self, path: impl Into<Path>) -> Self {
        self.append(path);
        self
    }

    /// Append a path.
    pub fn append(&mut self, path: impl Into<Path>) {
        self.paths.push(path.into());
    }

    /// Number of direct sub-paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the vector has no sub-path.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Direct sub-paths in order.
    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    /// Sub-path at `rank`.
    pub fn path_at_rank(&self, rank: usize) -> Option<&Path> {
        self.paths.get(rank)
    }

    /// Number of configuration coordinates.
    pub fn config_size(&self) -> usize {
        self.config_size
    }

    /// Parameter interval.
    pub fn time_range(&self) -> TimeRange {
        match self.paths.first() {
            Some(first) => {
                let start = first.time_range().start;
                let length: f64 = self.paths.iter().map(Path::length).sum();
                TimeRange::new(start, start + length)
            }
            None => TimeRange::at(0.0),
        }
    }

    /// Rank of the sub-path containing `t` and the matching local parameter.
    fn locate(&self, t: f64) -> Option<(usize, f64)> {
        let range = self.time_range();
        if !range.contains(t) {
            return None;
        }
        let mut offset = range.start;
        for (rank, path) in self.paths.iter().enumerate() {
            let local = path.time_range();
            let global_end = offset + local.length();
            if t <= global_end + TIME_EPSILON {
                let local_t = (local.start + (t - offset)).clamp(local.start, local.end);
                return Some((rank, local_t));
            }
            offset = global_end;
        }
        None
    }

    /// Configuration at `t`.
    pub fn eval(&self, t: f64) -> ConstraintResult<Configuration> {
        let (rank, local) = self
            .locate(t)
            .ok_or(ConstraintError::OutOfRange { parameter: t })?;
        self.paths[rank].eval(local)
    }

    /// Sub-path vector over `range`.
    pub fn extract(&self, range: TimeRange) -> PathVector {
        let mut extracted = PathVector::new(self.config_size);
        if range.is_zero_length() {
            if let Some((rank, local)) = self.locate(range.start) {
                extracted.append(self.paths[rank].extract(TimeRange::at(local)));
            }
            return extracted;
        }

        let mut offset = self.time_range().start;
        for path in &self.paths {
            let local = path.time_range();
            let global = TimeRange::new(offset, offset + local.length());
            offset = global.end;

            let start = global.start.max(range.start);
            let end = global.end.min(range.end);
            if end - start > TIME_EPSILON {
                extracted.append(path.extract(TimeRange::new(
                    local.start + (start - global.start),
                    local.start + (end - global.start),
                )));
            }
        }
        extracted
    }
}

/// A trajectory: atomic or composite.
#[derive(Debug, Clone)]
pub enum Path {
    /// One homogeneous segment.
    Atomic(AtomicPath),
    /// Ordered sequence of paths.
    Composite(PathVector),
}

impl Path {
    /// Parameter interval.
    pub fn time_range(&self) -> TimeRange {
        match self {
            Path::Atomic(path) => path.time_range(),
            Path::Composite(path) => path.time_range(),
        }
    }

    /// Length of the parameter interval.
    pub fn length(&self) -> f64 {
        self.time_range().length()
    }

    /// Number of configuration coordinates.
    pub fn config_size(&self) -> usize {
        match self {
            Path::Atomic(path) => path.config_size(),
            Path::Composite(path) => path.config_size(),
        }
    }

    /// Configuration at `t`.
    pub fn eval(&self, t: f64) -> ConstraintResult<Configuration> {
        match self {
            Path::Atomic(path) => path.eval(t),
            Path::Composite(path) => path.eval(t),
        }
    }

    /// Configuration at the first parameter.
    pub fn initial(&self) -> ConstraintResult<Configuration> {
        self.eval(self.time_range().start)
    }

    /// Configuration at the last parameter.
    pub fn end(&self) -> ConstraintResult<Configuration> {
        self.eval(self.time_range().end)
    }

    /// Sub-path over `range`.
    pub fn extract(&self, range: TimeRange) -> Path {
        match self {
            Path::Atomic(path) => Path::Atomic(path.extract(range)),
            Path::Composite(path) => Path::Composite(path.extract(range)),
        }
    }

    /// Zero-length path at the parameter where a traversal in the given
    /// direction begins.
    pub fn traversal_start(&self, reverse: bool) -> Path {
        self.extract(TimeRange::at(self.time_range().traversal_start(reverse)))
    }

    /// Whether this is a path vector.
    pub fn is_composite(&self) -> bool {
        matches!(self, Path::Composite(_))
    }
}

impl From<AtomicPath> for Path {
    fn from(path: AtomicPath) -> Self {
        Path::Atomic(path)
    }
}

impl From<PathVector> for Path {
    fn from(path: PathVector) -> Self {
        Path::Composite(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constraint::{AffineFunction, NumericalConstraint};

    fn line(from: f64, to: f64, range: TimeRange) -> AtomicPath {
        AtomicPath::straight(
            Configuration::new(vec![from, 0.0]),
            Configuration::new(vec![to, 0.0]),
            range,
        )
    }

    #[test]
    fn test_straight_segment_eval_and_extract() {
        let path = line(0.0, 2.0, TimeRange::new(0.0, 1.0));
        assert_eq!(path.eval(0.5).unwrap()[0], 1.0);
        assert!(matches!(path.eval(1.5), Err(ConstraintError::OutOfRange { .. })));

        assert_eq!(path.segment().time_range(), TimeRange::new(0.0, 1.0));
        assert_eq!(path.segment().config_size(), 2);

        let head = path.extract(TimeRange::new(0.0, 0.5));
        assert_eq!(head.time_range(), TimeRange::new(0.0, 0.5));
        assert_eq!(head.eval(0.5).unwrap()[0], 1.0);
        assert_eq!(head.eval(0.25).unwrap()[0], 0.5);
    }

    #[test]
    fn test_constrained_eval_projects() {
        let height = Arc::new(AffineFunction::coordinate("height", 2, 1, 0.3));
        let projector = ConfigProjector::new("flat", 20, 1e-9).with(NumericalConstraint::new(height));
        let path = line(0.0, 1.0, TimeRange::new(0.0, 1.0)).with_constraints(
            SegmentConstraints::Default {
                projector: Some(Arc::new(projector)),
            },
        );

        let q = path.eval(0.5).unwrap();
        assert!((q[1] - 0.3).abs() < 1e-9);
        assert_eq!(path.edge(), None);
    }

    #[test]
    fn test_path_vector_time_layout() {
        let vector = PathVector::new(2)
            .with(line(0.0, 1.0, TimeRange::new(0.0, 1.0)))
            .with(line(1.0, 3.0, TimeRange::new(0.0, 2.0)));

        assert_eq!(vector.time_range(), TimeRange::new(0.0, 3.0));
        assert_eq!(vector.eval(0.5).unwrap()[0], 0.5);
        assert_eq!(vector.eval(2.0).unwrap()[0], 2.0);
        assert_eq!(vector.eval(3.0).unwrap()[0], 3.0);

        let second = vector.path_at_rank(1).unwrap();
        assert_eq!(second.time_range(), TimeRange::new(0.0, 2.0));
        assert!(vector.path_at_rank(2).is_none());
    }

    #[test]
    fn test_path_vector_extract() {
        let vector = PathVector::new(2)
            .with(line(0.0, 1.0, TimeRange::new(0.0, 1.0)))
            .with(line(1.0, 3.0, TimeRange::new(0.0, 2.0)));

        let middle = vector.extract(TimeRange::new(0.5, 2.0));
        assert_eq!(middle.len(), 2);
        assert_eq!(middle.time_range(), TimeRange::new(0.5, 2.0));
        assert_eq!(middle.eval(0.5).unwrap()[0], 0.5);
        assert_eq!(middle.eval(2.0).unwrap()[0], 2.0);

        let point = vector.extract(TimeRange::at(2.0));
        assert_eq!(point.len(), 1);
        assert!(point.time_range().is_zero_length());
    }

    #[test]
    fn test_traversal_start() {
        let path = Path::from(line(0.0, 2.0, TimeRange::new(1.0, 2.0)));
        assert_eq!(path.traversal_start(false).time_range(), TimeRange::at(1.0));
        assert_eq!(path.traversal_start(true).time_range(), TimeRange::at(2.0));
        assert_eq!(path.traversal_start(true).initial().unwrap()[0], 2.0);
    }
}
