use cgmath::{InnerSpace, Vector3, vec3};

use crate::host::{SceneHost, SurfaceHit};

/// Minimum `normal . up` for a landing surface to count as floor.
pub const MAX_LANDING_SLOPE_COS: f32 = 0.7;

/// Ballistic parameters for the aiming arc.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArcParams {
    pub initial_power: f32,
    pub gravity: f32,
    pub samples: usize,
    /// Simulated flight time covered by the samples, in seconds.
    pub flight_time: f32,
    pub max_distance: f32,
}

/// Sampled aiming arc and the surface it came down on, if any.
#[derive(Clone, Debug, PartialEq)]
pub struct ArcTrajectory {
    pub points: Vec<Vector3<f32>>,
    pub hit: Option<SurfaceHit>,
    pub is_valid: bool,
}

impl ArcTrajectory {
    /// Sample the arc from `origin` along `direction` and hit-test every
    /// segment against the scene. Sampling stops at the first surface or
    /// once the arc leaves `max_distance`.
    pub fn calculate(
        origin: Vector3<f32>,
        direction: Vector3<f32>,
        params: &ArcParams,
        host: &dyn SceneHost,
    ) -> Self {
        let samples = params.samples.max(1);
        let mut points = Vec::with_capacity(samples + 1);
        points.push(origin);

        let length = direction.magnitude();
        if !length.is_finite() || length <= f32::EPSILON || !is_finite(origin) {
            return Self::miss(points);
        }

        let velocity = direction / length * params.initial_power;
        let time_step = params.flight_time / samples as f32;

        for i in 1..=samples {
            let previous = points[points.len() - 1];
            let next = position_at(origin, velocity, params.gravity, i as f32 * time_step);

            let segment = next - previous;
            let segment_length = segment.magnitude();
            if segment_length > f32::EPSILON {
                if let Some(hit) = host.hit_test(previous, segment / segment_length, segment_length) {
                    points.push(hit.point);
                    let is_valid = is_valid_landing(&hit, origin, params.max_distance);
                    return Self {
                        points,
                        hit: Some(hit),
                        is_valid,
                    };
                }
            }

            points.push(next);
            if (next - origin).magnitude() > params.max_distance {
                break;
            }
        }

        Self::miss(points)
    }

    fn miss(points: Vec<Vector3<f32>>) -> Self {
        Self {
            points,
            hit: None,
            is_valid: false,
        }
    }

    pub fn landing(&self) -> Option<Vector3<f32>> {
        self.hit.map(|hit| hit.point)
    }

    pub fn arc_length(&self) -> f32 {
        self.points
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).magnitude())
            .sum()
    }
}

fn position_at(origin: Vector3<f32>, velocity: Vector3<f32>, gravity: f32, t: f32) -> Vector3<f32> {
    origin + velocity * t - vec3(0.0, 0.5 * gravity * t * t, 0.0)
}

/// A landing is usable when the surface is navigable, close to level,
/// inside `max_distance` of the aim origin, and has finite coordinates.
pub fn is_valid_landing(hit: &SurfaceHit, origin: Vector3<f32>, max_distance: f32) -> bool {
    if !is_finite(hit.point) || !is_finite(hit.normal) {
        return false;
    }
    if !hit.navigable {
        return false;
    }
    if hit.normal.dot(vec3(0.0, 1.0, 0.0)) <= MAX_LANDING_SLOPE_COS {
        return false;
    }
    (hit.point - origin).magnitude() <= max_distance
}

fn is_finite(v: Vector3<f32>) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::FlatWorld;

    fn params() -> ArcParams {
        ArcParams {
            initial_power: 8.0,
            gravity: 9.81,
            samples: 20,
            flight_time: 2.0,
            max_distance: 10.0,
        }
    }

    #[test]
    fn test_straight_down_lands_below_origin() {
        let world = FlatWorld::new(0.0);
        let origin = vec3(2.0, 5.0, -3.0);
        let arc = ArcTrajectory::calculate(origin, vec3(0.0, -1.0, 0.0), &params(), &world);

        assert!(arc.is_valid);
        let landing = arc.landing().unwrap();
        assert!((landing - vec3(2.0, 0.0, -3.0)).magnitude() < 1e-4);
    }

    #[test]
    fn test_forward_arc_comes_down_ahead() {
        let world = FlatWorld::new(0.0);
        let origin = vec3(0.0, 1.8, 0.0);
        let direction = vec3(0.0, 0.2, -1.0).normalize();
        let mut params = params();
        params.initial_power = 4.0;
        let arc = ArcTrajectory::calculate(origin, direction, &params, &world);

        let landing = arc.landing().unwrap();
        assert!(landing.z < 0.0);
        assert!(landing.y.abs() < 1e-4);
        assert!(arc.points.len() > 2);
        assert!(arc.arc_length() > 0.0);
    }

    #[test]
    fn test_landing_beyond_max_distance_is_invalid() {
        let world = FlatWorld::new(0.0);
        let origin = vec3(0.0, 1.8, 0.0);
        let direction = vec3(0.0, 1.0, -1.0).normalize();
        let mut params = params();
        params.max_distance = 3.0;
        let arc = ArcTrajectory::calculate(origin, direction, &params, &world);

        assert!(!arc.is_valid);
        let too_far = arc.points.iter().any(|p| (p - origin).magnitude() > 3.0);
        assert!(too_far || arc.hit.is_none());
    }

    #[test]
    fn test_steep_or_blocked_surfaces_are_rejected() {
        let origin = vec3(0.0, 2.0, 0.0);
        let steep = SurfaceHit {
            point: vec3(0.0, 0.0, -1.0),
            normal: vec3(1.0, 0.5, 0.0).normalize(),
            distance: 2.0,
            navigable: true,
        };
        assert!(!is_valid_landing(&steep, origin, 10.0));

        let water = SurfaceHit {
            normal: vec3(0.0, 1.0, 0.0),
            navigable: false,
            ..steep
        };
        assert!(!is_valid_landing(&water, origin, 10.0));

        let floor = SurfaceHit {
            navigable: true,
            ..water
        };
        assert!(is_valid_landing(&floor, origin, 10.0));
    }

    #[test]
    fn test_zero_direction_misses() {
        let world = FlatWorld::new(0.0);
        let arc = ArcTrajectory::calculate(vec3(0.0, 1.0, 0.0), vec3(0.0, 0.0, 0.0), &params(), &world);
        assert!(arc.hit.is_none());
        assert!(!arc.is_valid);
        assert_eq!(arc.arc_length(), 0.0);
    }
}
