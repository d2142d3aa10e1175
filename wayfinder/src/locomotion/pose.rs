use cgmath::{InnerSpace, Quaternion, Rad, Rotation3, Vector3, Zero, vec3};
use serde::Serialize;

/// Position (feet), orientation and velocity of the avatar.
///
/// Only `LocomotionController` hands out mutable access; everything else sees
/// copies.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AvatarPose {
    pub position: Vector3<f32>,
    pub orientation: Quaternion<f32>,
    pub velocity: Vector3<f32>,
}

impl AvatarPose {
    pub fn at(position: Vector3<f32>) -> Self {
        Self {
            position,
            orientation: Quaternion::new(1.0, 0.0, 0.0, 0.0),
            velocity: Vector3::zero(),
        }
    }

    pub fn forward(&self) -> Vector3<f32> {
        self.orientation * vec3(0.0, 0.0, -1.0)
    }

    pub fn right(&self) -> Vector3<f32> {
        self.orientation * vec3(1.0, 0.0, 0.0)
    }

    /// Forward direction projected on the ground plane. Falls back to -Z when
    /// the avatar looks straight up or down.
    pub fn flat_forward(&self) -> Vector3<f32> {
        flatten(self.forward()).unwrap_or(vec3(0.0, 0.0, -1.0))
    }

    pub fn flat_right(&self) -> Vector3<f32> {
        flatten(self.right()).unwrap_or(vec3(1.0, 0.0, 0.0))
    }

    /// Rotate around world up by `angle` radians (positive turns left).
    pub fn yaw(&mut self, angle: f32) {
        let turn = Quaternion::from_angle_y(Rad(angle));
        self.orientation = (turn * self.orientation).normalize();
    }

    pub fn is_finite(&self) -> bool {
        let finite = |v: Vector3<f32>| v.x.is_finite() && v.y.is_finite() && v.z.is_finite();
        finite(self.position) && finite(self.velocity)
    }
}

impl Default for AvatarPose {
    fn default() -> Self {
        Self::at(Vector3::zero())
    }
}

fn flatten(v: Vector3<f32>) -> Option<Vector3<f32>> {
    let flat = vec3(v.x, 0.0, v.z);
    let length = flat.magnitude();
    (length > 1e-4).then(|| flat / length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn approx(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).magnitude() < 1e-5
    }

    #[test]
    fn test_identity_basis() {
        let pose = AvatarPose::default();
        assert!(approx(pose.forward(), vec3(0.0, 0.0, -1.0)));
        assert!(approx(pose.right(), vec3(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_yaw_left_quarter_turn() {
        let mut pose = AvatarPose::default();
        pose.yaw(FRAC_PI_2);
        assert!(approx(pose.forward(), vec3(-1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_flat_forward_ignores_pitch() {
        let mut pose = AvatarPose::default();
        pose.orientation = Quaternion::from_angle_x(Rad(0.5));
        let flat = pose.flat_forward();
        assert!(approx(flat, vec3(0.0, 0.0, -1.0)));
    }
}
