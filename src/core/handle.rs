//! Handles, grippers and the grasp constraints they generate.
//!
//! A [`Handle`] is the part of an object meant to be grasped. Paired with a
//! [`Gripper`] it produces constraints on their relative placement. These are
//! pure constraint factories, consumed when authoring edge constraint sets.

use crate::core::constraint::{check_input, DifferentiableFunction};
use crate::core::error::{ConstraintError, ConstraintResult};
use crate::core::robot::Robot;
use crate::core::types::{Configuration, Transform3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Grasping frame attached to a robot joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gripper {
    /// Gripper name.
    pub name: String,
    /// Joint holding the gripper.
    pub joint: String,
    /// Placement of the gripper frame in the joint frame.
    pub local_position: Transform3,
}

impl Gripper {
    /// Create a gripper.
    pub fn new(name: impl Into<String>, joint: impl Into<String>, local_position: Transform3) -> Self {
        Self {
            name: name.into(),
            joint: joint.into(),
            local_position,
        }
    }
}

/// Part of an object that is aimed at being grasped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handle {
    name: String,
    local_position: Transform3,
    joint: String,
}

impl Handle {
    /// Create a handle placed at `local_position` in the frame of `joint`.
    pub fn new(name: impl Into<String>, local_position: Transform3, joint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            local_position,
            joint: joint.into(),
        }
    }

    /// Get name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Get joint to which the handle is linked.
    pub fn joint(&self) -> &str {
        &self.joint
    }

    /// Set joint to which the handle is linked.
    pub fn set_joint(&mut self, joint: impl Into<String>) {
        self.joint = joint.into();
    }

    /// Get local position in joint frame.
    pub fn local_position(&self) -> &Transform3 {
        &self.local_position
    }

    /// Constraint of a gripper grasping this handle.
    ///
    /// All 6 degrees of freedom of the relative placement are constrained.
    pub fn create_grasp(
        &self,
        gripper: &Gripper,
        robot: Arc<dyn Robot>,
    ) -> Arc<dyn DifferentiableFunction> {
        Arc::new(RelativePlacement::new(
            format!("{}_grasps_{}", gripper.name, self.name),
            robot,
            gripper.clone(),
            self.clone(),
            [true; 6],
            0.0,
        ))
    }

    /// Constraint of a gripper approaching this handle.
    ///
    /// Only 5 degrees of freedom are constrained: translation along the
    /// x-axis of the gripper is free.
    pub fn create_pre_grasp(
        &self,
        gripper: &Gripper,
        robot: Arc<dyn Robot>,
    ) -> Arc<dyn DifferentiableFunction> {
        Arc::new(RelativePlacement::new(
            format!("{}_pregrasps_{}", gripper.name, self.name),
            robot,
            gripper.clone(),
            self.clone(),
            [false, true, true, true, true, true],
            0.0,
        ))
    }

    /// Constraint on the axis left free by [`Handle::create_pre_grasp`].
    ///
    /// Only the x-axis translation is constrained, to `shift`.
    pub fn create_pre_grasp_complement(
        &self,
        gripper: &Gripper,
        shift: f64,
        robot: Arc<dyn Robot>,
    ) -> Arc<dyn DifferentiableFunction> {
        Arc::new(RelativePlacement::new(
            format!("{}_pregrasps_{}/complement", gripper.name, self.name),
            robot,
            gripper.clone(),
            self.clone(),
            [true, false, false, false, false, false],
            shift,
        ))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Handle '{}' on joint '{}' at {:?}",
            self.name, self.joint, self.local_position.translation
        )
    }
}

/// Selected coordinates of `log(gripper^-1 * handle)`.
///
/// Output layout: translation x, y, z then rotation log x, y, z, keeping
/// only the entries enabled in the mask. `shift` is subtracted from x.
#[derive(Debug)]
struct RelativePlacement {
    name: String,
    robot: Arc<dyn Robot>,
    gripper: Gripper,
    handle: Handle,
    mask: [bool; 6],
    shift: f64,
}

impl RelativePlacement {
    fn new(
        name: String,
        robot: Arc<dyn Robot>,
        gripper: Gripper,
        handle: Handle,
        mask: [bool; 6],
        shift: f64,
    ) -> Self {
        Self {
            name,
            robot,
            gripper,
            handle,
            mask,
            shift,
        }
    }

    fn placement(&self, joint: &str, local: &Transform3, q: &Configuration) -> ConstraintResult<Transform3> {
        self.robot
            .joint_placement(joint, q)
            .map(|placement| placement.compose(local))
            .ok_or_else(|| ConstraintError::EvaluationFailure {
                function: self.name.clone(),
                reason: format!("robot '{}' has no joint '{}'", self.robot.name(), joint),
            })
    }
}

impl DifferentiableFunction for RelativePlacement {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_size(&self) -> usize {
        self.robot.config_size()
    }

    fn output_size(&self) -> usize {
        self.mask.iter().filter(|&&enabled| enabled).count()
    }

    fn value(&self, q: &Configuration) -> ConstraintResult<Vec<f64>> {
        check_input(self, q)?;
        let gripper = self.placement(&self.gripper.joint, &self.gripper.local_position, q)?;
        let handle = self.placement(&self.handle.joint, &self.handle.local_position, q)?;
        let relative = gripper.inverse().compose(&handle);

        let log = relative.log_rotation();
        let full = [
            relative.translation[0] - self.shift,
            relative.translation[1],
            relative.translation[2],
            log[0],
            log[1],
            log[2],
        ];
        Ok(full
            .iter()
            .zip(self.mask.iter())
            .filter(|(_, enabled)| **enabled)
            .map(|(value, _)| *value)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::robot::{CartesianJoint, CartesianRobot};

    fn setup() -> (Arc<dyn Robot>, Gripper, Handle) {
        // q = [gripper x, y, z, object x, y, z]
        let robot: Arc<dyn Robot> = Arc::new(
            CartesianRobot::new("scene", 6)
                .with_joint("tool", CartesianJoint::free_translation(0))
                .with_joint("box", CartesianJoint::free_translation(3)),
        );
        let gripper = Gripper::new("left", "tool", Transform3::identity());
        let handle = Handle::new("box/top", Transform3::from_translation(0.0, 0.0, 0.1), "box");
        (robot, gripper, handle)
    }

    #[test]
    fn test_grasp_is_zero_when_frames_coincide() {
        let (robot, gripper, handle) = setup();
        let grasp = handle.create_grasp(&gripper, robot);

        assert_eq!(grasp.output_size(), 6);
        let q = Configuration::new(vec![1.0, 2.0, 0.6, 1.0, 2.0, 0.5]);
        let value = grasp.value(&q).unwrap();
        assert!(value.iter().all(|v| v.abs() < 1e-12));
    }

    #[test]
    fn test_pre_grasp_leaves_x_free() {
        let (robot, gripper, handle) = setup();
        let pre_grasp = handle.create_pre_grasp(&gripper, robot.clone());
        let complement = handle.create_pre_grasp_complement(&gripper, 0.2, robot);

        assert_eq!(pre_grasp.output_size(), 5);
        assert_eq!(complement.output_size(), 1);

        // Gripper 0.2 behind the handle along x.
        let q = Configuration::new(vec![0.8, 2.0, 0.6, 1.0, 2.0, 0.5]);
        assert!(pre_grasp.value(&q).unwrap().iter().all(|v| v.abs() < 1e-12));
        assert!(complement.value(&q).unwrap()[0].abs() < 1e-12);

        let q = Configuration::new(vec![0.5, 2.0, 0.6, 1.0, 2.0, 0.5]);
        assert!(pre_grasp.value(&q).unwrap().iter().all(|v| v.abs() < 1e-12));
        assert!((complement.value(&q).unwrap()[0] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_missing_joint_fails_evaluation() {
        let (robot, gripper, mut handle) = setup();
        handle.set_joint("nowhere");
        let grasp = handle.create_grasp(&gripper, robot);

        let result = grasp.value(&Configuration::zeros(6));
        assert!(matches!(result, Err(ConstraintError::EvaluationFailure { .. })));
    }

    #[test]
    fn test_handle_accessors() {
        let (_, _, mut handle) = setup();
        handle.set_name("box/side");
        assert_eq!(handle.name(), "box/side");
        assert_eq!(handle.joint(), "box");
        assert_eq!(handle.local_position().translation, [0.0, 0.0, 0.1]);
        assert!(handle.to_string().contains("box/side"));
    }
}
