use cgmath::{Vector3, vec3};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CAPSULE_HEIGHT: f32 = 1.8;
pub const DEFAULT_CAPSULE_RADIUS: f32 = 0.3;

const MIN_CAPSULE_HEIGHT: f32 = 0.2;
const MIN_CAPSULE_RADIUS: f32 = 0.05;

/// Capsule bound attached to the avatar for floor and wall contact.
///
/// The avatar position is the capsule's base; `vertical_offset` lifts the
/// capsule centre above it. Dimensions are always positive and the radius
/// never exceeds half the height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionEnvelope {
    height: f32,
    radius: f32,
    vertical_offset: f32,
}

impl CollisionEnvelope {
    /// Build an envelope, clamping out-of-range dimensions instead of
    /// rejecting them.
    pub fn new(height: f32, radius: f32) -> Self {
        let height = if height.is_nan() {
            DEFAULT_CAPSULE_HEIGHT
        } else {
            height.clamp(MIN_CAPSULE_HEIGHT, f32::MAX)
        };
        let max_radius = height / 2.0;
        let radius = if radius.is_nan() {
            DEFAULT_CAPSULE_RADIUS.min(max_radius)
        } else {
            radius.clamp(MIN_CAPSULE_RADIUS, max_radius)
        };

        Self {
            height,
            radius,
            vertical_offset: height / 2.0,
        }
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn vertical_offset(&self) -> f32 {
        self.vertical_offset
    }

    pub fn center(&self, position: Vector3<f32>) -> Vector3<f32> {
        position + vec3(0.0, self.vertical_offset, 0.0)
    }

    pub fn top(&self, position: Vector3<f32>) -> Vector3<f32> {
        position + vec3(0.0, self.height, 0.0)
    }
}

impl Default for CollisionEnvelope {
    fn default() -> Self {
        Self::new(DEFAULT_CAPSULE_HEIGHT, DEFAULT_CAPSULE_RADIUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_envelope() {
        let envelope = CollisionEnvelope::default();
        assert_eq!(envelope.height(), 1.8);
        assert_eq!(envelope.radius(), 0.3);
        assert_eq!(envelope.vertical_offset(), 0.9);
    }

    #[test]
    fn test_radius_is_clamped_to_half_height() {
        let envelope = CollisionEnvelope::new(1.0, 2.0);
        assert_eq!(envelope.radius(), 0.5);
    }

    #[test]
    fn test_non_positive_dimensions_are_clamped() {
        let envelope = CollisionEnvelope::new(-3.0, 0.0);
        assert!(envelope.height() > 0.0);
        assert!(envelope.radius() > 0.0);
        assert!(envelope.radius() <= envelope.height() / 2.0);
    }

    #[test]
    fn test_nan_dimensions_fall_back_to_defaults() {
        let envelope = CollisionEnvelope::new(f32::NAN, f32::NAN);
        assert_eq!(envelope.height(), DEFAULT_CAPSULE_HEIGHT);
        assert_eq!(envelope.radius(), DEFAULT_CAPSULE_RADIUS);
    }

    #[test]
    fn test_center_and_top() {
        let envelope = CollisionEnvelope::new(2.0, 0.4);
        let feet = vec3(1.0, 0.5, -1.0);
        assert_eq!(envelope.center(feet), vec3(1.0, 1.5, -1.0));
        assert_eq!(envelope.top(feet), vec3(1.0, 2.5, -1.0));
    }
}
