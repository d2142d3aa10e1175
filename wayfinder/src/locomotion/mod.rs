//! Per-frame avatar movement.
//!
//! The controller owns the `AvatarPose` and the `LocomotionMode`. Each frame
//! it turns the input intent into a displacement for the active mode, hands
//! that to the host's collision resolution, and only then checks whether the
//! water plane was crossed. Teleports and exit shortcuts go through
//! [`LocomotionController::apply_teleport`], the one place a pose is replaced
//! wholesale.

mod mode;
mod pose;
pub mod swim;
mod tuning;

pub use mode::{LocomotionMode, ModeTransition, MovementMode};
pub use pose::AvatarPose;
pub use swim::{SwimState, buoyancy_lift, surface_tension_lift};
pub use tuning::{
    BUOYANCY_FORCE_RANGE, FLY_SPEED_FACTOR, MOVEMENT_SPEED_RANGE, SNAP_TURN_RANGE,
    SURFACE_TENSION_RANGE, SWIM_SPEED_RANGE, Tuning, TuningHandle, clamp_to,
};

use cgmath::{InnerSpace, Quaternion, Vector3, Zero, vec3};

use crate::collision::CollisionEnvelope;
use crate::host::SceneHost;
use crate::input::{MovementIntent, SnapDirection};
use crate::time::Time;
use swim::SwimStep;

/// Height above the water plane at which Swim is entered or left.
pub const SWIM_TRANSITION_OFFSET: f32 = 0.5;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameOutcome {
    pub pose_changed: bool,
    pub transition: Option<ModeTransition>,
}

pub struct LocomotionController {
    pose: AvatarPose,
    mode: LocomotionMode,
    envelope: CollisionEnvelope,
    tuning: TuningHandle,
    swim: SwimState,
}

impl LocomotionController {
    pub fn new(tuning: TuningHandle, start: Vector3<f32>) -> Self {
        Self {
            pose: AvatarPose::at(start),
            mode: LocomotionMode::Walk,
            envelope: CollisionEnvelope::default(),
            tuning,
            swim: SwimState::default(),
        }
    }

    pub fn pose(&self) -> &AvatarPose {
        &self.pose
    }

    pub fn mode(&self) -> LocomotionMode {
        self.mode
    }

    pub fn envelope(&self) -> &CollisionEnvelope {
        &self.envelope
    }

    pub fn tuning(&self) -> &TuningHandle {
        &self.tuning
    }

    pub fn swim_state(&self) -> &SwimState {
        &self.swim
    }

    /// Head tracking or mouse look from the host.
    pub fn set_orientation(&mut self, orientation: Quaternion<f32>) {
        let norm = orientation.magnitude();
        if norm.is_finite() && norm > f32::EPSILON {
            self.pose.orientation = orientation / norm;
        }
    }

    pub fn set_collision_capsule(&mut self, height: f32, radius: f32) -> CollisionEnvelope {
        self.envelope = CollisionEnvelope::new(height, radius);
        engine::locomotion_log!(
            debug,
            height = self.envelope.height(),
            radius = self.envelope.radius(),
            "collision capsule updated"
        );
        self.envelope
    }

    /// Integrate one frame of movement and resolve it through `host`.
    ///
    /// While swimming the height is clamped to `water + surface_epsilon` after
    /// the host resolves the move, and that cap sits below the exit height of
    /// `water + SWIM_TRANSITION_OFFSET`. Integration alone therefore never
    /// leaves Swim: exiting takes `apply_teleport` (a teleport or exit rail) or
    /// `force_exit_swim`.
    pub fn update(
        &mut self,
        time: &Time,
        intent: &MovementIntent,
        pointer_heading: Option<Vector3<f32>>,
        host: &mut dyn SceneHost,
    ) -> FrameOutcome {
        if !time.is_usable() {
            engine::locomotion_log!(trace, scale = time.time_scale, "skipping frame");
            return FrameOutcome::default();
        }

        let tuning = self.tuning.snapshot();
        let scale = time.time_scale;
        let origin = self.pose.position;

        // Aiming suspends player-driven motion; gravity and buoyancy keep acting.
        let (intent, pointer_heading) = if self.mode.is_aiming() {
            (MovementIntent::none(), None)
        } else {
            (*intent, pointer_heading)
        };

        let resolved = match self.mode.movement() {
            MovementMode::Walk => {
                let direction = self.ground_direction(&intent);
                let displacement = direction * (tuning.walk_speed() * scale);
                host.resolve_motion(origin, displacement, &self.envelope, true)
            }
            MovementMode::Fly => {
                let direction = (self.ground_direction(&intent) + vec3(0.0, intent.local.y, 0.0))
                    .normalize_or_zero();
                let displacement = direction * (tuning.fly_speed() * scale);
                host.resolve_motion(origin, displacement, &self.envelope, false)
            }
            MovementMode::Swim => {
                let water = tuning.water_level.unwrap_or(origin.y);
                let direction = (self.pose.forward() * intent.local.z
                    + self.pose.right() * intent.local.x
                    + vec3(0.0, intent.local.y, 0.0))
                .normalize_or_zero();
                let displacement = self.swim.step(SwimStep {
                    intent: &intent,
                    direction,
                    pointer_heading,
                    depth: water - origin.y,
                    swim_speed: tuning.swim_speed,
                    buoyancy_force: tuning.buoyancy_force,
                    surface_tension: tuning.surface_tension,
                    time_scale: scale,
                });
                let mut next = host.resolve_motion(origin, displacement, &self.envelope, false);
                next.y = next
                    .y
                    .min(water + tuning.surface_epsilon)
                    .max(water - tuning.max_depth);
                next
            }
        };

        if !is_finite(resolved) {
            engine::locomotion_log!(warn, ?resolved, "non-finite position from integration; frame dropped");
            return FrameOutcome::default();
        }

        self.pose.position = resolved;
        self.pose.velocity = (resolved - origin) / scale;

        FrameOutcome {
            pose_changed: resolved != origin,
            transition: self.check_water_transition(&tuning),
        }
    }

    fn ground_direction(&self, intent: &MovementIntent) -> Vector3<f32> {
        (self.pose.flat_forward() * intent.local.z + self.pose.flat_right() * intent.local.x)
            .normalize_or_zero()
    }

    fn check_water_transition(&mut self, tuning: &Tuning) -> Option<ModeTransition> {
        if self.mode.is_aiming() {
            return None;
        }

        let y = self.pose.position.y;
        let next = match (self.mode, tuning.water_level) {
            (LocomotionMode::Walk, Some(water)) if y < water + SWIM_TRANSITION_OFFSET => {
                LocomotionMode::Swim
            }
            (LocomotionMode::Swim, Some(water)) if y >= water + SWIM_TRANSITION_OFFSET => {
                LocomotionMode::Walk
            }
            (LocomotionMode::Swim, None) => LocomotionMode::Walk,
            _ => return None,
        };

        Some(self.transition_to(next))
    }

    fn transition_to(&mut self, next: LocomotionMode) -> ModeTransition {
        let transition = ModeTransition {
            from: self.mode,
            to: next,
        };
        if transition.from.is_swimming() != next.is_swimming() {
            self.swim.reset();
        }
        self.mode = next;
        engine::locomotion_log!(debug, from = %transition.from, to = %transition.to, "mode transition");
        transition
    }

    /// Enter or leave Fly. While aiming, the mode to resume is updated instead.
    pub fn toggle_fly_mode(&mut self, enabled: bool) -> Option<ModeTransition> {
        let current = self.mode.movement();
        let target = match (enabled, current) {
            (true, MovementMode::Fly) | (false, MovementMode::Walk) => return None,
            (false, MovementMode::Swim) => return None,
            (true, _) => MovementMode::Fly,
            (false, MovementMode::Fly) => MovementMode::Walk,
        };

        let next = if self.mode.is_aiming() {
            LocomotionMode::TeleportAiming { resume: target }
        } else {
            target.into()
        };
        Some(self.transition_to(next))
    }

    /// Returns false when an aim is already in progress.
    pub fn begin_teleport_aim(&mut self) -> bool {
        if self.mode.is_aiming() {
            return false;
        }
        let resume = self.mode.movement();
        self.transition_to(LocomotionMode::TeleportAiming { resume });
        true
    }

    pub fn end_teleport_aim(&mut self) -> Option<ModeTransition> {
        match self.mode {
            LocomotionMode::TeleportAiming { resume } => Some(self.transition_to(resume.into())),
            _ => None,
        }
    }

    /// Replace the avatar position. This is the only way anything outside the
    /// frame integration moves the avatar.
    pub fn apply_teleport(&mut self, position: Vector3<f32>) -> bool {
        if !is_finite(position) {
            engine::locomotion_log!(warn, ?position, "rejected non-finite teleport destination");
            return false;
        }
        self.pose.position = position;
        self.pose.velocity = Vector3::zero();
        self.swim.reset();

        let tuning = self.tuning.snapshot();
        self.check_water_transition(&tuning);
        true
    }

    pub fn force_exit_swim(&mut self) -> Option<ModeTransition> {
        match self.mode {
            LocomotionMode::Swim => Some(self.transition_to(LocomotionMode::Walk)),
            LocomotionMode::TeleportAiming {
                resume: MovementMode::Swim,
            } => Some(self.transition_to(LocomotionMode::TeleportAiming {
                resume: MovementMode::Walk,
            })),
            _ => None,
        }
    }

    pub fn snap_turn(&mut self, direction: SnapDirection) {
        let angle = self.tuning.snapshot().snap_turn_angle * direction.yaw_sign();
        self.pose.yaw(angle);
        engine::locomotion_log!(trace, angle, "snap turn");
    }
}

fn is_finite(v: Vector3<f32>) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

trait NormalizeOrZero {
    fn normalize_or_zero(self) -> Self;
}

impl NormalizeOrZero for Vector3<f32> {
    fn normalize_or_zero(self) -> Self {
        let length = self.magnitude();
        if length.is_finite() && length > f32::EPSILON {
            self / length
        } else {
            Vector3::zero()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{InputAggregator, Key};
    use crate::sim::FlatWorld;

    fn controller_at(y: f32, water: Option<f32>) -> LocomotionController {
        let tuning = TuningHandle::default();
        tuning.set_water_level(water);
        LocomotionController::new(tuning, vec3(0.0, y, 0.0))
    }

    fn frame() -> Time {
        Time::with_scale(1.0, 0)
    }

    fn forward_intent() -> MovementIntent {
        let mut input = InputAggregator::new();
        input.key_down(Key::Forward);
        input.intent()
    }

    #[test]
    fn test_walk_moves_along_forward() {
        let mut world = FlatWorld::new(0.0);
        let mut controller = controller_at(0.0, None);

        let outcome = controller.update(&frame(), &forward_intent(), None, &mut world);

        assert!(outcome.pose_changed);
        let position = controller.pose().position;
        assert!((position.z + 0.1).abs() < 1e-5);
        assert_eq!(position.y, 0.0);
    }

    #[test]
    fn test_time_scale_scales_displacement() {
        let mut world = FlatWorld::new(0.0);
        let mut controller = controller_at(0.0, None);

        controller.update(&Time::with_scale(2.0, 0), &forward_intent(), None, &mut world);
        assert!((controller.pose().position.z + 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_unusable_frame_is_skipped() {
        let mut world = FlatWorld::new(0.0);
        let mut controller = controller_at(0.0, None);

        let outcome =
            controller.update(&Time::with_scale(f32::NAN, 0), &forward_intent(), None, &mut world);
        assert_eq!(outcome, FrameOutcome::default());
        assert_eq!(controller.pose().position, vec3(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_fly_is_three_times_walk() {
        let mut world = FlatWorld::new(0.0);
        let mut controller = controller_at(0.0, None);
        controller.toggle_fly_mode(true);

        controller.update(&frame(), &forward_intent(), None, &mut world);
        assert!((controller.pose().position.z + 0.3).abs() < 1e-5);
        assert_eq!(controller.mode(), LocomotionMode::Fly);
    }

    #[test]
    fn test_fly_can_ascend() {
        let mut world = FlatWorld::new(0.0);
        let mut controller = controller_at(0.0, None);
        controller.toggle_fly_mode(true);

        let mut input = InputAggregator::new();
        input.key_down(Key::Ascend);
        controller.update(&frame(), &input.intent(), None, &mut world);
        assert!(controller.pose().position.y > 0.0);
    }

    #[test]
    fn test_walk_enters_swim_below_water() {
        let mut world = FlatWorld::new(-5.0);
        let mut controller = controller_at(0.0, Some(1.0));

        let outcome = controller.update(&frame(), &MovementIntent::none(), None, &mut world);
        let transition = outcome.transition.unwrap();
        assert_eq!(transition.from, LocomotionMode::Walk);
        assert_eq!(transition.to, LocomotionMode::Swim);
    }

    #[test]
    fn test_fly_ignores_water() {
        let mut world = FlatWorld::new(-5.0);
        let mut controller = controller_at(0.0, Some(1.0));
        controller.toggle_fly_mode(true);

        let outcome = controller.update(&frame(), &MovementIntent::none(), None, &mut world);
        assert!(outcome.transition.is_none());
        assert_eq!(controller.mode(), LocomotionMode::Fly);
    }

    #[test]
    fn test_swim_buoyancy_lifts_toward_surface() {
        let mut world = FlatWorld::new(-5.0);
        let mut controller = controller_at(0.0, Some(1.0));
        controller.tuning().set_buoyancy_force(5.0);
        controller.update(&frame(), &MovementIntent::none(), None, &mut world);
        assert!(controller.mode().is_swimming());

        controller.apply_teleport(vec3(0.0, 0.0, 0.0));
        assert!(controller.mode().is_swimming());
        controller.update(&frame(), &MovementIntent::none(), None, &mut world);

        let y = controller.pose().position.y;
        assert!(y > 0.0);
        assert!(y <= 1.0 + 0.1 + 1e-5);
    }

    #[test]
    fn test_swim_clamps_to_max_depth() {
        let mut world = FlatWorld::new(-100.0);
        let mut controller = controller_at(-50.0, Some(0.0));
        controller.tuning().set_buoyancy_force(0.0);

        controller.update(&frame(), &MovementIntent::none(), None, &mut world);
        controller.update(&frame(), &MovementIntent::none(), None, &mut world);
        assert_eq!(controller.pose().position.y, -10.0);
    }

    #[test]
    fn test_swimming_up_stays_in_swim_at_surface() {
        let mut world = FlatWorld::new(-5.0);
        let mut controller = controller_at(0.0, Some(1.0));
        controller.tuning().set_buoyancy_force(5.0);
        let mut input = InputAggregator::new();
        input.key_down(Key::Ascend);
        let ascend = input.intent();

        for _ in 0..200 {
            controller.update(&frame(), &ascend, None, &mut world);
        }

        assert!(controller.mode().is_swimming());
        assert!(controller.pose().position.y <= 1.0 + 0.1 + 1e-5);

        assert!(controller.force_exit_swim().is_some());
        assert_eq!(controller.mode(), LocomotionMode::Walk);
    }

    #[test]
    fn test_teleport_out_of_water_exits_swim() {
        let mut world = FlatWorld::new(-5.0);
        let mut controller = controller_at(0.0, Some(1.0));
        controller.update(&frame(), &MovementIntent::none(), None, &mut world);
        assert!(controller.mode().is_swimming());

        world.set_floor_height(3.0);
        controller.apply_teleport(vec3(0.0, 3.0, 0.0));
        assert_eq!(controller.mode(), LocomotionMode::Walk);

        controller.update(&frame(), &MovementIntent::none(), None, &mut world);
        assert_eq!(controller.pose().position.y, 3.0);
    }

    #[test]
    fn test_aim_suspends_and_resumes_mode() {
        let mut world = FlatWorld::new(0.0);
        let mut controller = controller_at(0.0, None);
        controller.toggle_fly_mode(true);

        assert!(controller.begin_teleport_aim());
        assert!(!controller.begin_teleport_aim());

        controller.update(&frame(), &forward_intent(), None, &mut world);
        assert_eq!(controller.pose().position, vec3(0.0, 0.0, 0.0));

        controller.end_teleport_aim();
        assert_eq!(controller.mode(), LocomotionMode::Fly);
    }

    #[test]
    fn test_apply_teleport_rejects_non_finite() {
        let mut controller = controller_at(0.0, None);
        assert!(!controller.apply_teleport(vec3(f32::INFINITY, 0.0, 0.0)));
        assert!(controller.apply_teleport(vec3(1.0, 2.0, 3.0)));
        assert_eq!(controller.pose().position, vec3(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_snap_turn_uses_configured_angle() {
        let mut controller = controller_at(0.0, None);
        controller.tuning().set_snap_turn_angle(std::f32::consts::FRAC_PI_2);
        controller.snap_turn(SnapDirection::Right);

        let forward = controller.pose().forward();
        assert!((forward - vec3(1.0, 0.0, 0.0)).magnitude() < 1e-5);
    }
}
