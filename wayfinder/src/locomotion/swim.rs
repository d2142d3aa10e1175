// Buoyancy model for the Swim mode.
//
// Depth is measured downward from the water plane, so it is negative above
// the surface.

use cgmath::{Vector3, Zero, vec3};

use crate::input::MovementIntent;

/// Depth over which buoyancy ramps from zero to its full strength.
pub const BUOYANCY_RAMP_DEPTH: f32 = 2.0;
/// Band below the surface in which surface tension acts.
pub const SURFACE_TENSION_BAND: f32 = 0.2;
/// Per-frame velocity retention with no horizontal input.
pub const SWIM_DRAG: f32 = 0.9;
/// Fraction of swim speed applied to a pointer-picked heading.
pub const POINTER_SWIM_FACTOR: f32 = 0.5;

/// Upward buoyancy at `depth`, before time scaling.
pub fn buoyancy_lift(depth: f32, force: f32) -> f32 {
    let strength = (depth / BUOYANCY_RAMP_DEPTH).clamp(0.0, 1.0);
    force * strength
}

/// Extra lift that resists sinking right under the surface.
pub fn surface_tension_lift(depth: f32, tension: f32) -> f32 {
    if depth >= SURFACE_TENSION_BAND {
        return 0.0;
    }
    let factor = ((SURFACE_TENSION_BAND - depth) / SURFACE_TENSION_BAND).clamp(0.0, 1.0);
    tension * factor
}

#[derive(Clone, Copy, Debug)]
pub struct SwimState {
    pub velocity: Vector3<f32>,
    pub buoyancy: Vector3<f32>,
}

impl Default for SwimState {
    fn default() -> Self {
        Self {
            velocity: Vector3::zero(),
            buoyancy: Vector3::zero(),
        }
    }
}

pub struct SwimStep<'a> {
    pub intent: &'a MovementIntent,
    /// World-space direction of `intent`.
    pub direction: Vector3<f32>,
    pub pointer_heading: Option<Vector3<f32>>,
    pub depth: f32,
    pub swim_speed: f32,
    pub buoyancy_force: f32,
    pub surface_tension: f32,
    pub time_scale: f32,
}

impl SwimState {
    /// Advance the swim velocities by one frame and return the displacement
    /// to apply.
    pub fn step(&mut self, step: SwimStep<'_>) -> Vector3<f32> {
        if !step.intent.is_zero() {
            self.velocity = step.direction * step.swim_speed;
        } else if let Some(heading) = step.pointer_heading {
            self.velocity = heading * (step.swim_speed * POINTER_SWIM_FACTOR);
        } else {
            self.velocity *= SWIM_DRAG;
        }

        let lift = buoyancy_lift(step.depth, step.buoyancy_force)
            + surface_tension_lift(step.depth, step.surface_tension);
        self.buoyancy = vec3(0.0, lift * step.time_scale, 0.0);

        (self.velocity + self.buoyancy) * step.time_scale
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
