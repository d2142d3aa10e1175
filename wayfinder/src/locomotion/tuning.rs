use std::f32::consts::{FRAC_PI_2, FRAC_PI_6, PI};
use std::ops::RangeInclusive;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

pub const MOVEMENT_SPEED_RANGE: RangeInclusive<f32> = 0.01..=1.0;
pub const SWIM_SPEED_RANGE: RangeInclusive<f32> = 0.1..=5.0;
pub const BUOYANCY_FORCE_RANGE: RangeInclusive<f32> = 0.0..=10.0;
pub const SURFACE_TENSION_RANGE: RangeInclusive<f32> = 0.0..=10.0;
pub const SNAP_TURN_RANGE: RangeInclusive<f32> = (PI / 12.0)..=FRAC_PI_2;

pub const FLY_SPEED_FACTOR: f32 = 3.0;

/// Clamp `value` into `range`. NaN yields `None` so callers can keep the
/// previous value.
pub fn clamp_to(value: f32, range: &RangeInclusive<f32>) -> Option<f32> {
    if value.is_nan() {
        None
    } else {
        Some(value.clamp(*range.start(), *range.end()))
    }
}

/// Runtime tunables read once per frame by the locomotion controller.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tuning {
    pub movement_speed: f32,
    pub swim_speed: f32,
    pub buoyancy_force: f32,
    pub surface_tension: f32,
    pub snap_turn_angle: f32,
    pub water_level: Option<f32>,
    pub max_depth: f32,
    pub surface_epsilon: f32,
}

impl Tuning {
    pub fn walk_speed(&self) -> f32 {
        self.movement_speed
    }

    pub fn fly_speed(&self) -> f32 {
        self.movement_speed * FLY_SPEED_FACTOR
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            movement_speed: 0.1,
            swim_speed: 0.1,
            buoyancy_force: 1.0,
            surface_tension: 0.5,
            snap_turn_angle: FRAC_PI_6,
            water_level: None,
            max_depth: 10.0,
            surface_epsilon: 0.1,
        }
    }
}

/// Shared handle to the tunables.
///
/// Settings panels and the frame loop hold clones of the same handle. Every
/// setter writes a single field under the lock; the frame loop takes one
/// snapshot per frame.
#[derive(Clone, Debug, Default)]
pub struct TuningHandle(Arc<RwLock<Tuning>>);

impl TuningHandle {
    pub fn new(tuning: Tuning) -> Self {
        Self(Arc::new(RwLock::new(tuning)))
    }

    pub fn snapshot(&self) -> Tuning {
        *self.0.read()
    }

    fn set_clamped(
        &self,
        value: f32,
        range: &RangeInclusive<f32>,
        field: impl FnOnce(&mut Tuning) -> &mut f32,
    ) -> f32 {
        let mut tuning = self.0.write();
        let slot = field(&mut tuning);
        if let Some(clamped) = clamp_to(value, range) {
            *slot = clamped;
        }
        *slot
    }

    /// Returns the value actually stored.
    pub fn set_movement_speed(&self, speed: f32) -> f32 {
        self.set_clamped(speed, &MOVEMENT_SPEED_RANGE, |t| &mut t.movement_speed)
    }

    pub fn set_swim_speed(&self, speed: f32) -> f32 {
        self.set_clamped(speed, &SWIM_SPEED_RANGE, |t| &mut t.swim_speed)
    }

    pub fn set_buoyancy_force(&self, force: f32) -> f32 {
        self.set_clamped(force, &BUOYANCY_FORCE_RANGE, |t| &mut t.buoyancy_force)
    }

    pub fn set_surface_tension(&self, tension: f32) -> f32 {
        self.set_clamped(tension, &SURFACE_TENSION_RANGE, |t| &mut t.surface_tension)
    }

    pub fn set_snap_turn_angle(&self, angle: f32) -> f32 {
        self.set_clamped(angle, &SNAP_TURN_RANGE, |t| &mut t.snap_turn_angle)
    }

    /// `None` or a non-finite level removes the water plane.
    pub fn set_water_level(&self, level: Option<f32>) {
        self.0.write().water_level = level.filter(|l| l.is_finite());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_speed_is_clamped() {
        let tuning = TuningHandle::default();
        assert_eq!(tuning.set_movement_speed(5.0), 1.0);
        assert_eq!(tuning.set_movement_speed(-1.0), 0.01);
        assert_eq!(tuning.set_movement_speed(0.5), 0.5);
        assert_eq!(tuning.snapshot().movement_speed, 0.5);
    }

    #[test]
    fn test_nan_keeps_previous_value() {
        let tuning = TuningHandle::default();
        tuning.set_swim_speed(2.0);
        assert_eq!(tuning.set_swim_speed(f32::NAN), 2.0);
    }

    #[test]
    fn test_swim_and_buoyancy_ranges() {
        let tuning = TuningHandle::default();
        assert_eq!(tuning.set_swim_speed(0.0), 0.1);
        assert_eq!(tuning.set_swim_speed(50.0), 5.0);
        assert_eq!(tuning.set_buoyancy_force(-3.0), 0.0);
        assert_eq!(tuning.set_buoyancy_force(30.0), 10.0);
    }

    #[test]
    fn test_snap_turn_angle_range() {
        let tuning = TuningHandle::default();
        assert_eq!(tuning.set_snap_turn_angle(0.0), PI / 12.0);
        assert_eq!(tuning.set_snap_turn_angle(PI), FRAC_PI_2);
    }

    #[test]
    fn test_clones_share_state() {
        let tuning = TuningHandle::default();
        let panel = tuning.clone();
        panel.set_movement_speed(0.2);
        assert_eq!(tuning.snapshot().movement_speed, 0.2);
    }

    #[test]
    fn test_fly_is_faster_than_walk() {
        let tuning = Tuning::default();
        assert!(tuning.fly_speed() > tuning.walk_speed());
    }
}
