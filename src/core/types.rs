//! Core value types shared by the graph and the validators.
//!
//! - [`Configuration`]: a point of the robot configuration space
//! - [`TimeRange`]: the parameter interval of a trajectory
//! - [`Transform3`]: a rigid-body placement used by grasp constraints

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// Tolerance used when comparing path parameters.
pub const TIME_EPSILON: f64 = 1e-12;

/// A robot configuration.
///
/// Configurations are plain vectors: the meaning of each coordinate is owned
/// by the robot model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(pub Vec<f64>);

impl Configuration {
    /// Create a configuration from its coordinates.
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// Create the zero configuration of the given size.
    pub fn zeros(size: usize) -> Self {
        Self(vec![0.0; size])
    }

    /// Number of coordinates.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the configuration has no coordinates.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the coordinates.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Borrow the coordinates mutably.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.0
    }

    /// Iterate over the coordinates.
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.0.iter()
    }

    /// Linear interpolation towards `other`, `alpha` in [0, 1].
    pub fn interpolate(&self, other: &Configuration, alpha: f64) -> Configuration {
        Configuration(
            self.0
                .iter()
                .zip(other.0.iter())
                .map(|(a, b)| a + alpha * (b - a))
                .collect(),
        )
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Configuration) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

impl From<Vec<f64>> for Configuration {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl Index<usize> for Configuration {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl IndexMut<usize> for Configuration {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.0[index]
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

/// Closed parameter interval `[start, end]` of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    /// First parameter.
    pub start: f64,
    /// Last parameter.
    pub end: f64,
}

impl TimeRange {
    /// Create a new range.
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// A zero-length range at `t`.
    pub fn at(t: f64) -> Self {
        Self { start: t, end: t }
    }

    /// Length of the interval.
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// Whether the interval is reduced to a single parameter.
    pub fn is_zero_length(&self) -> bool {
        self.length().abs() <= TIME_EPSILON
    }

    /// Whether `t` lies in the interval (with tolerance).
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start - TIME_EPSILON && t <= self.end + TIME_EPSILON
    }

    /// Parameter at which a traversal in the given direction begins.
    pub fn traversal_start(&self, reverse: bool) -> f64 {
        if reverse {
            self.end
        } else {
            self.start
        }
    }

    /// Parameter at which a traversal in the given direction ends.
    pub fn traversal_end(&self, reverse: bool) -> f64 {
        if reverse {
            self.start
        } else {
            self.end
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Rigid-body placement: rotation matrix and translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3 {
    /// Row-major rotation matrix.
    pub rotation: [[f64; 3]; 3],
    /// Translation vector.
    pub translation: [f64; 3],
}

impl Transform3 {
    /// The identity placement.
    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }

    /// A pure translation.
    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            translation: [x, y, z],
            ..Self::identity()
        }
    }

    /// A rotation of `angle` radians around the z axis.
    pub fn from_rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            rotation: [[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0; 3],
        }
    }

    /// Replace the translation.
    pub fn with_translation(mut self, x: f64, y: f64, z: f64) -> Self {
        self.translation = [x, y, z];
        self
    }

    /// `self * other`.
    pub fn compose(&self, other: &Transform3) -> Transform3 {
        let mut rotation = [[0.0; 3]; 3];
        for (i, row) in rotation.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = (0..3).map(|k| self.rotation[i][k] * other.rotation[k][j]).sum();
            }
        }
        let moved = self.rotate(&other.translation);
        Transform3 {
            rotation,
            translation: [
                moved[0] + self.translation[0],
                moved[1] + self.translation[1],
                moved[2] + self.translation[2],
            ],
        }
    }

    /// Inverse placement.
    pub fn inverse(&self) -> Transform3 {
        let mut rotation = [[0.0; 3]; 3];
        for (i, row) in rotation.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = self.rotation[j][i];
            }
        }
        let t = self.translation;
        let translation = [
            -(rotation[0][0] * t[0] + rotation[0][1] * t[1] + rotation[0][2] * t[2]),
            -(rotation[1][0] * t[0] + rotation[1][1] * t[1] + rotation[1][2] * t[2]),
            -(rotation[2][0] * t[0] + rotation[2][1] * t[1] + rotation[2][2] * t[2]),
        ];
        Transform3 {
            rotation,
            translation,
        }
    }

    fn rotate(&self, v: &[f64; 3]) -> [f64; 3] {
        let r = &self.rotation;
        [
            r[0][0] * v[0] + r[0][1] * v[1] + r[0][2] * v[2],
            r[1][0] * v[0] + r[1][1] * v[1] + r[1][2] * v[2],
            r[2][0] * v[0] + r[2][1] * v[1] + r[2][2] * v[2],
        ]
    }

    /// Logarithm of the rotation: axis scaled by angle.
    pub fn log_rotation(&self) -> [f64; 3] {
        let r = &self.rotation;
        let trace = r[0][0] + r[1][1] + r[2][2];
        let cos_theta = ((trace - 1.0) / 2.0).clamp(-1.0, 1.0);
        let theta = cos_theta.acos();
        let skew = [r[2][1] - r[1][2], r[0][2] - r[2][0], r[1][0] - r[0][1]];

        if theta < 1e-9 {
            return [0.5 * skew[0], 0.5 * skew[1], 0.5 * skew[2]];
        }
        if std::f64::consts::PI - theta < 1e-6 {
            // Axis from the symmetric part, sign from the residual skew part.
            let diag = [r[0][0], r[1][1], r[2][2]];
            let k = (0..3)
                .max_by(|&a, &b| diag[a].total_cmp(&diag[b]))
                .unwrap_or(0);
            let mut axis = [0.0; 3];
            let pivot = ((diag[k] + 1.0) / 2.0).max(0.0).sqrt();
            axis[k] = pivot;
            for (j, value) in axis.iter_mut().enumerate() {
                if j != k && pivot > 0.0 {
                    *value = (r[k][j] + r[j][k]) / (4.0 * pivot);
                }
            }
            if skew[k] < 0.0 {
                axis.iter_mut().for_each(|a| *a = -*a);
            }
            return [axis[0] * theta, axis[1] * theta, axis[2] * theta];
        }
        let scale = theta / (2.0 * theta.sin());
        [scale * skew[0], scale * skew[1], scale * skew[2]]
    }
}

impl Default for Transform3 {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_interpolate() {
        let a = Configuration::new(vec![0.0, 2.0]);
        let b = Configuration::new(vec![1.0, 4.0]);

        assert_eq!(a.interpolate(&b, 0.5), Configuration::new(vec![0.5, 3.0]));
        assert!((a.distance(&b) - 5.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(format!("{}", a), "(0, 2)");
    }

    #[test]
    fn test_time_range_traversal() {
        let range = TimeRange::new(1.0, 3.0);
        assert_eq!(range.traversal_start(false), 1.0);
        assert_eq!(range.traversal_start(true), 3.0);
        assert_eq!(range.length(), 2.0);
        assert!(TimeRange::at(2.0).is_zero_length());
        assert!(range.contains(3.0));
        assert!(!range.contains(3.5));
    }

    #[test]
    fn test_transform_inverse_composes_to_identity() {
        let t = Transform3::from_rotation_z(0.7).with_translation(1.0, -2.0, 0.5);
        let id = t.compose(&t.inverse());

        for i in 0..3 {
            assert!(id.translation[i].abs() < 1e-12);
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((id.rotation[i][j] - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_log_rotation() {
        let log = Transform3::from_rotation_z(0.3).log_rotation();
        assert!(log[0].abs() < 1e-12);
        assert!(log[1].abs() < 1e-12);
        assert!((log[2] - 0.3).abs() < 1e-9);

        let half_turn = Transform3::from_rotation_z(std::f64::consts::PI).log_rotation();
        assert!((half_turn[2].abs() - std::f64::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn test_log_rotation_half_turn_about_diagonal() {
        // 2 n n^T - I with n = (1, 1, 0) / sqrt(2)
        let mut t = Transform3::identity();
        t.rotation = [[0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]];

        let log = t.log_rotation();
        let expected = std::f64::consts::PI / 2.0_f64.sqrt();
        assert!((log[0].abs() - expected).abs() < 1e-6);
        assert!((log[1].abs() - expected).abs() < 1e-6);
        assert!(log[0] * log[1] > 0.0);
        assert!(log[2].abs() < 1e-9);
    }
}
