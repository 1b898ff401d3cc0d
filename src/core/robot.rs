//! Robot model seam.
//!
//! The graph only needs the configuration size; grasp constraints also need
//! the placement of named joints. Full kinematic models live outside this
//! crate and plug in through [`Robot`].

use crate::core::types::{Configuration, Transform3};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kinematic model of the (composite) robot being planned for.
pub trait Robot: Send + Sync + fmt::Debug {
    /// Robot name.
    fn name(&self) -> &str;

    /// Number of configuration coordinates.
    fn config_size(&self) -> usize;

    /// World placement of `joint` at configuration `q`, if the joint exists.
    fn joint_placement(&self, joint: &str, q: &Configuration) -> Option<Transform3>;
}

/// How a [`CartesianRobot`] joint reads the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartesianJoint {
    /// Placement of the joint at the zero configuration.
    pub origin: Transform3,
    /// Configuration coordinates driving the x, y and z translation.
    pub translation: [Option<usize>; 3],
    /// Configuration coordinate driving a rotation around z.
    pub yaw: Option<usize>,
}

impl CartesianJoint {
    /// A joint translated by three consecutive coordinates starting at `first`.
    pub fn free_translation(first: usize) -> Self {
        Self {
            origin: Transform3::identity(),
            translation: [Some(first), Some(first + 1), Some(first + 2)],
            yaw: None,
        }
    }

    /// A fixed joint.
    pub fn fixed(origin: Transform3) -> Self {
        Self {
            origin,
            translation: [None; 3],
            yaw: None,
        }
    }

    /// Add a yaw coordinate.
    pub fn with_yaw(mut self, index: usize) -> Self {
        self.yaw = Some(index);
        self
    }
}

/// Robot whose joints are driven directly by configuration coordinates.
///
/// Enough to author grasp constraints for gantry-style grippers and free
/// objects; anything with a real kinematic chain implements [`Robot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartesianRobot {
    name: String,
    config_size: usize,
    joints: IndexMap<String, CartesianJoint>,
}

impl CartesianRobot {
    /// Create a robot without joints.
    pub fn new(name: impl Into<String>, config_size: usize) -> Self {
        Self {
            name: name.into(),
            config_size,
            joints: IndexMap::new(),
        }
    }

    /// Add a joint (builder style).
    pub fn with_joint(mut self, name: impl Into<String>, joint: CartesianJoint) -> Self {
        self.joints.insert(name.into(), joint);
        self
    }

    /// Joint names in declaration order.
    pub fn joint_names(&self) -> impl Iterator<Item = &str> {
        self.joints.keys().map(String::as_str)
    }
}

impl Robot for CartesianRobot {
    fn name(&self) -> &str {
        &self.name
    }

    fn config_size(&self) -> usize {
        self.config_size
    }

    fn joint_placement(&self, joint: &str, q: &Configuration) -> Option<Transform3> {
        let model = self.joints.get(joint)?;
        let read = |index: Option<usize>| -> Option<f64> {
            match index {
                Some(i) => q.as_slice().get(i).copied(),
                None => Some(0.0),
            }
        };

        let x = read(model.translation[0])?;
        let y = read(model.translation[1])?;
        let z = read(model.translation[2])?;
        let yaw = read(model.yaw)?;

        let motion = Transform3::from_rotation_z(yaw).with_translation(x, y, z);
        Some(model.origin.compose(&motion))
    }
}
