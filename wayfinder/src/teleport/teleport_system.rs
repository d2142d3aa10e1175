use cgmath::{InnerSpace, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::HostError;
use crate::host::SceneHost;

use super::preview::TeleportPreview;
use super::trajectory::{ArcParams, ArcTrajectory};

/// Configuration for the teleport system
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleportConfig {
    pub enabled: bool,
    pub max_distance: f32,
    /// Minimum lift of the preview curve above the straight line.
    pub arc_height: f32,
    pub initial_power: f32,
    pub gravity: f32,
    pub arc_samples: usize,
    pub flight_time: f32,
    pub fade_duration_ms: u64,
    pub trigger_threshold: f32,
}

impl Default for TeleportConfig {
    fn default() -> Self {
        TeleportConfig {
            enabled: false,
            max_distance: 10.0,
            arc_height: 2.0,
            initial_power: 8.0,
            gravity: 9.81,
            arc_samples: 20,
            flight_time: 2.0,
            fade_duration_ms: 300,
            trigger_threshold: 0.5,
        }
    }
}

impl TeleportConfig {
    pub fn arc_params(&self) -> ArcParams {
        ArcParams {
            initial_power: self.initial_power,
            gravity: self.gravity,
            samples: self.arc_samples,
            flight_time: self.flight_time,
            max_distance: self.max_distance,
        }
    }

    /// Pull every value back into a usable range.
    pub fn normalized(mut self) -> Self {
        let defaults = TeleportConfig::default();
        let positive = |value: f32, fallback: f32| {
            if value.is_finite() && value > 0.0 { value } else { fallback }
        };
        self.max_distance = positive(self.max_distance, defaults.max_distance);
        self.initial_power = positive(self.initial_power, defaults.initial_power);
        self.gravity = positive(self.gravity, defaults.gravity);
        self.flight_time = positive(self.flight_time, defaults.flight_time);
        self.arc_height = if self.arc_height.is_finite() {
            self.arc_height.max(0.0)
        } else {
            defaults.arc_height
        };
        self.arc_samples = self.arc_samples.clamp(1, 256);
        self.trigger_threshold = if self.trigger_threshold.is_finite() {
            self.trigger_threshold.clamp(0.05, 1.0)
        } else {
            defaults.trigger_threshold
        };
        self
    }
}

/// The aim currently being evaluated.
#[derive(Clone, Debug, PartialEq)]
pub struct TeleportTarget {
    pub origin: Vector3<f32>,
    pub direction: Vector3<f32>,
    pub arc_points: Vec<Vector3<f32>>,
    /// Surface point the arc came down on, valid or not.
    pub landing: Option<Vector3<f32>>,
    pub normal: Option<Vector3<f32>>,
    /// Straight-line distance from the origin to the landing point.
    pub distance: f32,
    pub is_valid: bool,
}

impl TeleportTarget {
    fn from_trajectory(origin: Vector3<f32>, direction: Vector3<f32>, arc: ArcTrajectory) -> Self {
        let landing = arc.landing();
        let distance = landing.map_or(0.0, |point| (point - origin).magnitude());
        Self {
            origin,
            direction,
            landing,
            normal: arc.hit.map(|hit| hit.normal),
            distance,
            is_valid: arc.is_valid,
            arc_points: arc.points,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TeleportPhase {
    Idle,
    Aiming { target: TeleportTarget },
    /// The jump has been committed; the fade overlay is running.
    Executing { started_ms: u64 },
}

/// Aim, validate, preview and execute flow for discrete repositioning.
///
/// The system never moves the avatar itself: `execute` hands the landing
/// point back to the caller, which commits it through the locomotion
/// controller.
pub struct TeleportSystem {
    config: TeleportConfig,
    phase: TeleportPhase,
    preview: TeleportPreview,
}

impl TeleportSystem {
    pub fn new(config: TeleportConfig) -> Self {
        TeleportSystem {
            config: config.normalized(),
            phase: TeleportPhase::Idle,
            preview: TeleportPreview::default(),
        }
    }

    pub fn with_default_config() -> Self {
        Self::new(TeleportConfig::default())
    }

    pub fn config(&self) -> &TeleportConfig {
        &self.config
    }

    pub fn phase(&self) -> &TeleportPhase {
        &self.phase
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn is_aiming(&self) -> bool {
        matches!(self.phase, TeleportPhase::Aiming { .. })
    }

    pub fn is_executing(&self) -> bool {
        matches!(self.phase, TeleportPhase::Executing { .. })
    }

    pub fn target(&self) -> Option<&TeleportTarget> {
        match &self.phase {
            TeleportPhase::Aiming { target } => Some(target),
            _ => None,
        }
    }

    /// Disabling while aiming drops the aim.
    pub fn set_enabled(&mut self, enabled: bool, host: &mut dyn SceneHost) {
        self.config.enabled = enabled;
        if !enabled {
            self.cancel(host);
        }
    }

    /// Enter Aiming and evaluate the first arc. Returns false when disabled or
    /// when an aim or jump is already in progress.
    pub fn start_aim(
        &mut self,
        origin: Vector3<f32>,
        direction: Vector3<f32>,
        host: &mut dyn SceneHost,
    ) -> bool {
        if !self.config.enabled || !matches!(self.phase, TeleportPhase::Idle) {
            return false;
        }

        let target = self.evaluate(origin, direction, host);
        engine::teleport_log!(debug, valid = target.is_valid, "aim started");
        self.phase = TeleportPhase::Aiming { target };
        true
    }

    /// Recompute the arc for a new aim. Ignored outside Aiming.
    pub fn update_aim(
        &mut self,
        direction: Vector3<f32>,
        origin: Vector3<f32>,
        host: &mut dyn SceneHost,
    ) -> Option<&TeleportTarget> {
        if !self.is_aiming() {
            return None;
        }

        let evaluated = self.evaluate(origin, direction, host);
        engine::teleport_log!(trace, valid = evaluated.is_valid, landing = ?evaluated.landing, "aim updated");
        match &mut self.phase {
            TeleportPhase::Aiming { target } => {
                *target = evaluated;
                Some(target)
            }
            _ => None,
        }
    }

    fn evaluate(
        &mut self,
        origin: Vector3<f32>,
        direction: Vector3<f32>,
        host: &mut dyn SceneHost,
    ) -> TeleportTarget {
        let arc = ArcTrajectory::calculate(origin, direction, &self.config.arc_params(), &*host);
        let target = TeleportTarget::from_trajectory(origin, direction, arc);
        self.preview.show_target(&target, self.config.arc_height, host);
        target
    }

    /// Commit the current aim. Returns the landing point only when the last
    /// evaluated target was valid; otherwise nothing changes.
    pub fn execute(&mut self, now_ms: u64, host: &mut dyn SceneHost) -> Option<Vector3<f32>> {
        let landing = match &self.phase {
            TeleportPhase::Aiming { target } if target.is_valid => target.landing,
            TeleportPhase::Aiming { .. } => {
                engine::teleport_log!(debug, "execute ignored: no valid target");
                return None;
            }
            TeleportPhase::Executing { .. } => {
                engine::teleport_log!(debug, "execute ignored: teleport already running");
                return None;
            }
            TeleportPhase::Idle => return None,
        }?;

        self.preview.hide_aim(host);
        if self.config.fade_duration_ms > 0 {
            self.preview.set_fade(1.0, host);
            self.phase = TeleportPhase::Executing { started_ms: now_ms };
        } else {
            self.phase = TeleportPhase::Idle;
        }

        engine::teleport_log!(info, ?landing, "teleport executed");
        Some(landing)
    }

    /// Drop an aim in progress. Safe to call in any phase; a running jump is
    /// not interrupted.
    pub fn cancel(&mut self, host: &mut dyn SceneHost) -> bool {
        if !self.is_aiming() {
            return false;
        }
        self.preview.hide_aim(host);
        self.phase = TeleportPhase::Idle;
        engine::teleport_log!(info, "teleport cancelled");
        true
    }

    /// Advance the fade after a jump. Returns true on the frame it finishes.
    pub fn update(&mut self, now_ms: u64, host: &mut dyn SceneHost) -> bool {
        let TeleportPhase::Executing { started_ms } = self.phase else {
            return false;
        };

        let duration = self.config.fade_duration_ms.max(1) as f32;
        let progress = now_ms.saturating_sub(started_ms) as f32 / duration;
        if progress >= 1.0 {
            self.preview.set_fade(0.0, host);
            self.phase = TeleportPhase::Idle;
            return true;
        }

        self.preview.set_fade(1.0 - progress, host);
        false
    }

    pub fn dispose(&mut self, host: &mut dyn SceneHost) -> Vec<HostError> {
        self.phase = TeleportPhase::Idle;
        self.preview.release(host)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerEdge {
    Pressed,
    Released,
}

/// Turns an analogue trigger into press and release edges.
#[derive(Clone, Debug)]
pub struct TeleportTrigger {
    threshold: f32,
    was_pressed: bool,
}

impl TeleportTrigger {
    pub fn new(threshold: f32) -> Self {
        TeleportTrigger {
            threshold,
            was_pressed: false,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.was_pressed
    }

    pub fn update(&mut self, value: f32) -> Option<TriggerEdge> {
        let is_pressed = value.is_finite() && value >= self.threshold;
        let edge = match (self.was_pressed, is_pressed) {
            (false, true) => Some(TriggerEdge::Pressed),
            (true, false) => Some(TriggerEdge::Released),
            _ => None,
        };
        self.was_pressed = is_pressed;
        edge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::FlatWorld;
    use cgmath::vec3;

    fn enabled_system() -> TeleportSystem {
        TeleportSystem::new(TeleportConfig {
            enabled: true,
            ..TeleportConfig::default()
        })
    }

    fn down() -> Vector3<f32> {
        vec3(0.0, -1.0, 0.0)
    }

    #[test]
    fn test_disabled_system_does_not_aim() {
        let mut world = FlatWorld::new(0.0);
        let mut teleport = TeleportSystem::with_default_config();
        assert!(!teleport.start_aim(vec3(0.0, 5.0, 0.0), down(), &mut world));
        assert_eq!(teleport.phase(), &TeleportPhase::Idle);
    }

    #[test]
    fn test_aim_execute_and_fade() {
        let mut world = FlatWorld::new(0.0);
        let mut teleport = enabled_system();

        assert!(teleport.start_aim(vec3(0.0, 5.0, 0.0), down(), &mut world));
        let target = teleport.update_aim(down(), vec3(1.0, 5.0, 1.0), &mut world).unwrap();
        assert!(target.is_valid);

        let landing = teleport.execute(1_000, &mut world).unwrap();
        assert!((landing.y).abs() < 1e-4);
        assert!(teleport.is_executing());

        // Re-entrant execute while the fade runs.
        assert_eq!(teleport.execute(1_010, &mut world), None);

        assert!(!teleport.update(1_150, &mut world));
        assert!(teleport.update(1_300, &mut world));
        assert_eq!(teleport.phase(), &TeleportPhase::Idle);
    }

    #[test]
    fn test_invalid_target_execute_has_no_effect() {
        let mut world = FlatWorld::new(-50.0);
        let mut teleport = enabled_system();

        teleport.start_aim(vec3(0.0, 5.0, 0.0), down(), &mut world);
        assert!(!teleport.target().unwrap().is_valid);

        assert_eq!(teleport.execute(0, &mut world), None);
        assert!(teleport.is_aiming());
    }

    #[test]
    fn test_cancel_is_safe_in_every_phase() {
        let mut world = FlatWorld::new(0.0);
        let mut teleport = enabled_system();

        assert!(!teleport.cancel(&mut world));
        teleport.start_aim(vec3(0.0, 5.0, 0.0), down(), &mut world);
        assert!(teleport.cancel(&mut world));
        assert!(!teleport.cancel(&mut world));
        assert_eq!(teleport.phase(), &TeleportPhase::Idle);
    }

    #[test]
    fn test_update_aim_ignored_when_idle() {
        let mut world = FlatWorld::new(0.0);
        let mut teleport = enabled_system();
        assert!(teleport.update_aim(down(), vec3(0.0, 5.0, 0.0), &mut world).is_none());
    }

    #[test]
    fn test_zero_fade_returns_to_idle_immediately() {
        let mut world = FlatWorld::new(0.0);
        let mut teleport = TeleportSystem::new(TeleportConfig {
            enabled: true,
            fade_duration_ms: 0,
            ..TeleportConfig::default()
        });

        teleport.start_aim(vec3(0.0, 5.0, 0.0), down(), &mut world);
        assert!(teleport.execute(0, &mut world).is_some());
        assert_eq!(teleport.phase(), &TeleportPhase::Idle);
    }

    #[test]
    fn test_dispose_releases_visuals() {
        let mut world = FlatWorld::new(0.0);
        let mut teleport = enabled_system();
        teleport.start_aim(vec3(0.0, 5.0, 0.0), down(), &mut world);
        teleport.execute(0, &mut world);

        assert!(teleport.dispose(&mut world).is_empty());
        assert_eq!(world.live_visuals(), 0);
    }

    #[test]
    fn test_trigger_edges() {
        let mut trigger = TeleportTrigger::new(0.5);
        assert_eq!(trigger.update(0.2), None);
        assert_eq!(trigger.update(0.6), Some(TriggerEdge::Pressed));
        assert_eq!(trigger.update(0.9), None);
        assert_eq!(trigger.update(0.1), Some(TriggerEdge::Released));
        assert_eq!(trigger.update(f32::NAN), None);
    }
}
