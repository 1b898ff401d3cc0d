//! Differentiable constraints and configuration projection.
//!
//! A [`DifferentiableFunction`] maps a configuration to a residual vector.
//! A [`NumericalConstraint`] pairs it with a right-hand side; parametric
//! constraints take their right-hand side from a configuration, which selects
//! one leaf of the foliation. A [`ConfigProjector`] stacks constraints and
//! corrects configurations onto their intersection.

use crate::core::error::{ConstraintError, ConstraintResult};
use crate::core::types::Configuration;
use std::fmt;
use std::sync::Arc;

/// Step used by the finite-difference Jacobian.
const FINITE_DIFFERENCE_STEP: f64 = 1e-7;

/// Damping added to the normal equations of the projection.
const PROJECTION_DAMPING: f64 = 1e-10;

/// A vector-valued function of the configuration.
pub trait DifferentiableFunction: Send + Sync + fmt::Debug {
    /// Name used in reports and diagnostics.
    fn name(&self) -> &str;

    /// Number of configuration coordinates the function reads.
    fn input_size(&self) -> usize;

    /// Number of residual coordinates produced.
    fn output_size(&self) -> usize;

    /// Evaluate the function.
    fn value(&self, q: &Configuration) -> ConstraintResult<Vec<f64>>;

    /// Jacobian as `output_size` rows of `input_size` columns.
    ///
    /// Defaults to central finite differences.
    fn jacobian(&self, q: &Configuration) -> ConstraintResult<Vec<Vec<f64>>> {
        let mut jacobian = vec![vec![0.0; q.len()]; self.output_size()];
        let mut probe = q.clone();
        for j in 0..q.len() {
            let origin = probe[j];
            probe[j] = origin + FINITE_DIFFERENCE_STEP;
            let plus = self.value(&probe)?;
            probe[j] = origin - FINITE_DIFFERENCE_STEP;
            let minus = self.value(&probe)?;
            probe[j] = origin;
            for (i, row) in jacobian.iter_mut().enumerate() {
                row[j] = (plus[i] - minus[i]) / (2.0 * FINITE_DIFFERENCE_STEP);
            }
        }
        Ok(jacobian)
    }
}

/// `f(q) = A q + b`.
#[derive(Debug, Clone)]
pub struct AffineFunction {
    name: String,
    matrix: Vec<Vec<f64>>,
    offset: Vec<f64>,
    input_size: usize,
}

impl AffineFunction {
    /// Create from the rows of `A` and the offset `b`.
    pub fn new(name: impl Into<String>, matrix: Vec<Vec<f64>>, offset: Vec<f64>) -> Self {
        let input_size = matrix.first().map(Vec::len).unwrap_or(0);
        Self {
            name: name.into(),
            matrix,
            offset,
            input_size,
        }
    }

    /// `f(q) = q[index] - target`, a single locked coordinate.
    ///
    /// # Panics
    ///
    /// Panics if `index >= input_size`.
    pub fn coordinate(
        name: impl Into<String>,
        input_size: usize,
        index: usize,
        target: f64,
    ) -> Self {
        assert!(
            index < input_size,
            "coordinate {} out of range for {} inputs",
            index,
            input_size
        );
        let mut row = vec![0.0; input_size];
        row[index] = 1.0;
        Self::new(name, vec![row], vec![-target])
    }
}

impl DifferentiableFunction for AffineFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.matrix.len()
    }

    fn value(&self, q: &Configuration) -> ConstraintResult<Vec<f64>> {
        check_input(self, q)?;
        Ok(self
            .matrix
            .iter()
            .zip(self.offset.iter())
            .map(|(row, b)| row.iter().zip(q.iter()).map(|(a, x)| a * x).sum::<f64>() + b)
            .collect())
    }

    fn jacobian(&self, q: &Configuration) -> ConstraintResult<Vec<Vec<f64>>> {
        check_input(self, q)?;
        Ok(self.matrix.clone())
    }
}

/// Fail with `DimensionMismatch` if `q` does not fit `function`.
pub fn check_input(function: &dyn DifferentiableFunction, q: &Configuration) -> ConstraintResult<()> {
    if function.input_size() != q.len() {
        return Err(ConstraintError::DimensionMismatch {
            function: function.name().to_string(),
            expected: function.input_size(),
            got: q.len(),
        });
    }
    Ok(())
}

/// A function together with the right-hand side it must equal.
#[derive(Debug, Clone)]
pub struct NumericalConstraint {
    function: Arc<dyn DifferentiableFunction>,
    right_hand_side: Vec<f64>,
    parametric: bool,
}

impl NumericalConstraint {
    /// `f(q) = 0`.
    pub fn new(function: Arc<dyn DifferentiableFunction>) -> Self {
        let right_hand_side = vec![0.0; function.output_size()];
        Self {
            function,
            right_hand_side,
            parametric: false,
        }
    }

    /// `f(q) = f(q0)` where `q0` is supplied later through
    /// [`NumericalConstraint::right_hand_side_from`].
    pub fn parametric(function: Arc<dyn DifferentiableFunction>) -> Self {
        Self {
            parametric: true,
            ..Self::new(function)
        }
    }

    /// Set an explicit right-hand side.
    pub fn with_right_hand_side(mut self, right_hand_side: Vec<f64>) -> Self {
        self.right_hand_side = right_hand_side;
        self
    }

    /// The underlying function.
    pub fn function(&self) -> &Arc<dyn DifferentiableFunction> {
        &self.function
    }

    /// Name of the underlying function.
    pub fn name(&self) -> &str {
        self.function.name()
    }

    /// Current right-hand side.
    pub fn right_hand_side(&self) -> &[f64] {
        &self.right_hand_side
    }

    /// Whether the right-hand side follows the leaf of a configuration.
    pub fn is_parametric(&self) -> bool {
        self.parametric
    }

    /// `f(q) - rhs`.
    ///
    /// Fails with `RightHandSideMismatch` unless the right-hand side has one
    /// entry per function output.
    pub fn residual(&self, q: &Configuration) -> ConstraintResult<Vec<f64>> {
        let value = self.function.value(q)?;
        if value.len() != self.right_hand_side.len() {
            return Err(ConstraintError::RightHandSideMismatch {
                function: self.function.name().to_string(),
                expected: value.len(),
                got: self.right_hand_side.len(),
            });
        }
        Ok(value
            .iter()
            .zip(self.right_hand_side.iter())
            .map(|(v, r)| v - r)
            .collect())
    }

    /// Select the leaf through `q`. No-op for non-parametric constraints.
    pub fn right_hand_side_from(&mut self, q: &Configuration) -> ConstraintResult<()> {
        if self.parametric {
            self.right_hand_side = self.function.value(q)?;
        }
        Ok(())
    }
}

/// Stack of numerical constraints with a bounded projection routine.
#[derive(Debug, Clone)]
pub struct ConfigProjector {
    name: String,
    constraints: Vec<NumericalConstraint>,
    max_iterations: usize,
    error_threshold: f64,
}

impl ConfigProjector {
    /// Create an empty projector.
    pub fn new(name: impl Into<String>, max_iterations: usize, error_threshold: f64) -> Self {
        Self {
            name: name.into(),
            constraints: Vec::new(),
            max_iterations,
            error_threshold,
        }
    }

    /// Add a constraint (builder style).
    pub fn with(mut self, constraint: NumericalConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Add a constraint.
    pub fn add(&mut self, constraint: NumericalConstraint) {
        self.constraints.push(constraint);
    }

    /// Add several constraints.
    pub fn extend(&mut self, constraints: impl IntoIterator<Item = NumericalConstraint>) {
        self.constraints.extend(constraints);
    }

    /// Projector name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All stacked constraints.
    pub fn constraints(&self) -> &[NumericalConstraint] {
        &self.constraints
    }

    /// Number of stacked constraints.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Whether no constraint is stacked.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Iteration bound of [`ConfigProjector::project`].
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Norm below which a configuration satisfies the projector.
    pub fn error_threshold(&self) -> f64 {
        self.error_threshold
    }

    /// Update the right-hand side of every parametric constraint from `q`.
    pub fn update_right_hand_side(&mut self, q: &Configuration) -> ConstraintResult<()> {
        for constraint in &mut self.constraints {
            constraint.right_hand_side_from(q)?;
        }
        Ok(())
    }

    /// Stacked residual of all constraints.
    pub fn residual(&self, q: &Configuration) -> ConstraintResult<Vec<f64>> {
        let mut residual = Vec::new();
        for constraint in &self.constraints {
            residual.extend(constraint.residual(q)?);
        }
        Ok(residual)
    }

    /// Squared norm of the stacked residual.
    pub fn squared_error(&self, q: &Configuration) -> ConstraintResult<f64> {
        Ok(self.residual(q)?.iter().map(|r| r * r).sum())
    }

    /// Whether `q` satisfies every constraint within the threshold.
    pub fn is_satisfied(&self, q: &Configuration) -> ConstraintResult<bool> {
        Ok(self.squared_error(q)? <= self.error_threshold * self.error_threshold)
    }

    /// Project `q` onto the constraints with damped Gauss-Newton steps.
    pub fn project(&self, q: &Configuration) -> ConstraintResult<Configuration> {
        let threshold = self.error_threshold * self.error_threshold;
        let mut current = q.clone();

        for _ in 0..self.max_iterations {
            let residual = self.residual(&current)?;
            let error: f64 = residual.iter().map(|r| r * r).sum();
            if error <= threshold {
                return Ok(current);
            }

            let jacobian = self.jacobian(&current)?;
            let step = match least_norm_step(&jacobian, &residual) {
                Some(step) => step,
                None => break,
            };
            for (x, dx) in current.as_mut_slice().iter_mut().zip(step.iter()) {
                *x -= dx;
            }
        }

        let error = self.squared_error(&current)?;
        if error <= threshold {
            return Ok(current);
        }
        Err(ConstraintError::ProjectionFailure {
            projector: self.name.clone(),
            iterations: self.max_iterations,
            error,
        })
    }

    fn jacobian(&self, q: &Configuration) -> ConstraintResult<Vec<Vec<f64>>> {
        let mut jacobian = Vec::new();
        for constraint in &self.constraints {
            jacobian.extend(constraint.function().jacobian(q)?);
        }
        Ok(jacobian)
    }
}

/// `J^T (J J^T + λI)^-1 r`.
fn least_norm_step(jacobian: &[Vec<f64>], residual: &[f64]) -> Option<Vec<f64>> {
    let rows = jacobian.len();
    let cols = jacobian.first().map(Vec::len).unwrap_or(0);

    let mut normal = vec![vec![0.0; rows]; rows];
    for i in 0..rows {
        for j in 0..rows {
            normal[i][j] = (0..cols).map(|k| jacobian[i][k] * jacobian[j][k]).sum();
        }
        normal[i][i] += PROJECTION_DAMPING;
    }

    let y = solve_linear(normal, residual.to_vec())?;
    Some(
        (0..cols)
            .map(|k| (0..rows).map(|i| jacobian[i][k] * y[i]).sum())
            .collect(),
    )
}

/// Gaussian elimination with partial pivoting.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < f64::EPSILON {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane(target: f64) -> Arc<dyn DifferentiableFunction> {
        Arc::new(AffineFunction::coordinate("height", 2, 1, target))
    }

    #[test]
    fn test_affine_value_and_dimension_check() {
        let f = AffineFunction::new("sum", vec![vec![1.0, 1.0]], vec![-1.0]);
        assert_eq!(f.value(&Configuration::new(vec![0.25, 0.75])).unwrap(), vec![0.0]);

        let result = f.value(&Configuration::new(vec![1.0]));
        assert!(matches!(result, Err(ConstraintError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_finite_difference_jacobian_matches_affine() {
        #[derive(Debug)]
        struct Wrapped(AffineFunction);

        impl DifferentiableFunction for Wrapped {
            fn name(&self) -> &str {
                self.0.name()
            }
            fn input_size(&self) -> usize {
                self.0.input_size()
            }
            fn output_size(&self) -> usize {
                self.0.output_size()
            }
            fn value(&self, q: &Configuration) -> ConstraintResult<Vec<f64>> {
                self.0.value(q)
            }
        }

        let f = Wrapped(AffineFunction::new("f", vec![vec![2.0, -1.0]], vec![0.0]));
        let jacobian = f.jacobian(&Configuration::new(vec![0.3, 0.4])).unwrap();
        assert!((jacobian[0][0] - 2.0).abs() < 1e-6);
        assert!((jacobian[0][1] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_projection_converges() {
        let projector = ConfigProjector::new("on-table", 20, 1e-8)
            .with(NumericalConstraint::new(plane(0.5)));

        let projected = projector.project(&Configuration::new(vec![0.2, 3.0])).unwrap();
        assert!((projected[1] - 0.5).abs() < 1e-8);
        // Least-norm step leaves free coordinates untouched.
        assert!((projected[0] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_projection_failure_is_bounded() {
        let projector = ConfigProjector::new("contradiction", 5, 1e-8)
            .with(NumericalConstraint::new(plane(0.0)))
            .with(NumericalConstraint::new(plane(1.0)));

        let result = projector.project(&Configuration::new(vec![0.0, 0.0]));
        assert!(matches!(
            result,
            Err(ConstraintError::ProjectionFailure { iterations: 5, .. })
        ));
    }

    #[test]
    fn test_parametric_constraint_follows_leaf() {
        let mut projector = ConfigProjector::new("leaf", 20, 1e-8)
            .with(NumericalConstraint::parametric(plane(0.0)));

        projector
            .update_right_hand_side(&Configuration::new(vec![0.0, 0.7]))
            .unwrap();
        assert!(projector.is_satisfied(&Configuration::new(vec![5.0, 0.7])).unwrap());
        assert!(!projector.is_satisfied(&Configuration::new(vec![5.0, 0.6])).unwrap());
    }

    #[test]
    fn test_parametric_flag_and_right_hand_side() {
        let mut constraint = NumericalConstraint::parametric(plane(0.0));
        assert!(constraint.is_parametric());
        assert_eq!(constraint.right_hand_side(), &[0.0]);

        constraint
            .right_hand_side_from(&Configuration::new(vec![1.0, 0.25]))
            .unwrap();
        assert_eq!(constraint.right_hand_side(), &[0.25]);

        let mut fixed = NumericalConstraint::new(plane(0.0)).with_right_hand_side(vec![0.5]);
        assert!(!fixed.is_parametric());
        fixed.right_hand_side_from(&Configuration::new(vec![1.0, 0.25])).unwrap();
        assert_eq!(fixed.right_hand_side(), &[0.5]);
    }

    #[test]
    fn test_short_right_hand_side_is_rejected() {
        let function = Arc::new(AffineFunction::new(
            "point",
            vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            vec![0.0, 0.0],
        ));
        let constraint = NumericalConstraint::new(function).with_right_hand_side(vec![0.0]);
        let q = Configuration::new(vec![0.0, 5.0]);

        assert_eq!(
            constraint.residual(&q),
            Err(ConstraintError::RightHandSideMismatch {
                function: "point".to_string(),
                expected: 2,
                got: 1,
            })
        );

        let mut projector = ConfigProjector::new("point", 10, 1e-6);
        projector.add(constraint);
        assert_eq!(projector.len(), 1);
        assert!(projector.is_satisfied(&q).is_err());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_coordinate_index_out_of_range_panics() {
        AffineFunction::coordinate("bad", 2, 2, 0.0);
    }

    #[test]
    fn test_empty_projector_accepts_everything() {
        let projector = ConfigProjector::new("empty", 10, 1e-4);
        let q = Configuration::new(vec![1.0, 2.0]);
        assert!(projector.is_satisfied(&q).unwrap());
        assert_eq!(projector.project(&q).unwrap(), q);
    }
}
