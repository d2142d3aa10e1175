//! Application-facing navigation facade.
//!
//! `NavigationSystem` owns the host scene and runs the per-frame pipeline in a
//! fixed order: input is reduced to an intent, snap turns are applied, the
//! locomotion controller integrates and resolves the move, the teleport fade
//! advances, and finally the comfort subsystem observes the new pose. Nothing
//! in here blocks or awaits.

use std::sync::Arc;

use cgmath::{Quaternion, Vector3};
use engine::Clock;
use serde::Serialize;

use crate::collision::CollisionEnvelope;
use crate::comfort::{ComfortContext, ComfortSystem};
use crate::config::WayfinderConfig;
use crate::events::{SubscriptionId, Subscribers};
use crate::host::SceneHost;
use crate::input::InputAggregator;
use crate::locomotion::{AvatarPose, FrameOutcome, LocomotionController, LocomotionMode, ModeTransition, TuningHandle};
use crate::session::SessionType;
use crate::teleport::{TeleportSystem, TeleportTarget, TeleportTrigger, TriggerEdge};
use crate::time::{FrameClock, Time};

/// Snapshot of the navigation mode and flags.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    pub mode: LocomotionMode,
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
    pub is_flying: bool,
    pub is_swimming: bool,
    pub movement_speed: f32,
    pub swim_speed: f32,
    pub buoyancy_force: f32,
    pub snap_turn_angle: f32,
    pub water_level: Option<f32>,
    pub capsule_height: f32,
    pub capsule_radius: f32,
    pub teleport_enabled: bool,
    pub teleport_aiming: bool,
    pub teleport_target_valid: bool,
    pub comfort_mode: bool,
    pub comfort_active: bool,
    pub exit_rails_visible: bool,
    pub immersive_session: Option<SessionType>,
}

/// What happened to the teleport flow on a trigger change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    AimStarted,
    Teleported,
    Cancelled,
}

pub struct NavigationSystem<H: SceneHost> {
    host: H,
    frames: FrameClock,
    tuning: TuningHandle,
    input: InputAggregator,
    locomotion: LocomotionController,
    teleport: TeleportSystem,
    trigger: TeleportTrigger,
    comfort: ComfortSystem,
    comfort_mode: bool,
    immersive: Option<SessionType>,
    pose_listeners: Subscribers<AvatarPose>,
    disposed: bool,
}

impl<H: SceneHost> NavigationSystem<H> {
    pub fn new(host: H, clock: Arc<dyn Clock>, config: &WayfinderConfig) -> Self {
        let config = config.clone().normalized();
        let tuning = TuningHandle::new(config.tuning());

        let mut locomotion = LocomotionController::new(tuning.clone(), config.locomotion.start());
        locomotion.set_collision_capsule(
            config.locomotion.capsule_height,
            config.locomotion.capsule_radius,
        );

        let comfort_mode = config.comfort.enabled;
        let mut input = InputAggregator::new();
        input.set_snap_turn_enabled(comfort_mode);

        let mut navigation = Self {
            host,
            frames: FrameClock::new(clock),
            tuning,
            input,
            locomotion,
            trigger: TeleportTrigger::new(config.teleport.trigger_threshold),
            teleport: TeleportSystem::new(config.teleport),
            comfort: ComfortSystem::new(config.comfort),
            comfort_mode,
            immersive: None,
            pose_listeners: Subscribers::new(),
            disposed: false,
        };
        navigation.host.set_vignette(comfort_mode);
        navigation
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn input(&self) -> &InputAggregator {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputAggregator {
        &mut self.input
    }

    pub fn locomotion(&self) -> &LocomotionController {
        &self.locomotion
    }

    pub fn teleport(&self) -> &TeleportSystem {
        &self.teleport
    }

    pub fn comfort(&self) -> &ComfortSystem {
        &self.comfort
    }

    /// Clone of the shared tunables, for settings panels outside the frame loop.
    pub fn tuning(&self) -> TuningHandle {
        self.tuning.clone()
    }

    pub fn pose(&self) -> &AvatarPose {
        self.locomotion.pose()
    }

    pub fn mode(&self) -> LocomotionMode {
        self.locomotion.mode()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Run one frame timed by the clock.
    pub fn update(&mut self) -> FrameOutcome {
        let time = self.frames.tick();
        self.update_with_time(&time)
    }

    pub fn update_with_time(&mut self, time: &Time) -> FrameOutcome {
        if self.disposed {
            return FrameOutcome::default();
        }

        if let Some(direction) = self.input.take_snap_turn() {
            self.locomotion.snap_turn(direction);
        }

        let intent = self.input.intent();
        let pointer = self.input.take_pointer_heading();
        let outcome = engine::profile!(
            "locomotion.update",
            self.locomotion.update(time, &intent, pointer, &mut self.host)
        );

        self.teleport.update(time.now_ms, &mut self.host);

        let context = ComfortContext {
            position: self.locomotion.pose().position,
            mode: self.locomotion.mode(),
            immersive: self.immersive.is_some(),
            surface_level: self.surface_level(),
            now_ms: time.now_ms,
        };
        self.comfort.update(&context, &mut self.host);

        if outcome.pose_changed || outcome.transition.is_some() {
            self.emit_pose();
        }
        outcome
    }

    /// Water level, or the avatar's own feet height when there is no water.
    fn surface_level(&self) -> f32 {
        self.tuning
            .snapshot()
            .water_level
            .unwrap_or(self.locomotion.pose().position.y)
    }

    fn emit_pose(&mut self) {
        let pose = *self.locomotion.pose();
        self.pose_listeners.emit(&pose);
    }

    pub fn on_pose_changed(&mut self, listener: impl FnMut(&AvatarPose) + Send + 'static) -> SubscriptionId {
        self.pose_listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.pose_listeners.unsubscribe(id)
    }

    pub fn set_orientation(&mut self, orientation: Quaternion<f32>) {
        self.locomotion.set_orientation(orientation);
    }

    pub fn toggle_fly_mode(&mut self, enabled: bool) -> Option<ModeTransition> {
        self.locomotion.toggle_fly_mode(enabled)
    }

    pub fn set_collision_capsule(&mut self, height: f32, radius: f32) -> CollisionEnvelope {
        self.locomotion.set_collision_capsule(height, radius)
    }

    /// Each setter returns the value actually stored after clamping.
    pub fn set_movement_speed(&mut self, speed: f32) -> f32 {
        self.tuning.set_movement_speed(speed)
    }

    pub fn set_swim_speed(&mut self, speed: f32) -> f32 {
        self.tuning.set_swim_speed(speed)
    }

    pub fn set_buoyancy_force(&mut self, force: f32) -> f32 {
        self.tuning.set_buoyancy_force(force)
    }

    pub fn set_surface_tension(&mut self, tension: f32) -> f32 {
        self.tuning.set_surface_tension(tension)
    }

    pub fn set_snap_turn_angle(&mut self, angle: f32) -> f32 {
        self.tuning.set_snap_turn_angle(angle)
    }

    pub fn set_water_level(&mut self, level: Option<f32>) {
        self.tuning.set_water_level(level);
    }

    pub fn set_teleport_mode(&mut self, enabled: bool) {
        self.teleport.set_enabled(enabled, &mut self.host);
        if !enabled {
            self.locomotion.end_teleport_aim();
        }
        engine::teleport_log!(debug, enabled, "teleport mode changed");
    }

    /// Where aiming starts: the top of the collision capsule.
    pub fn aim_origin(&self) -> Vector3<f32> {
        self.locomotion.envelope().top(self.locomotion.pose().position)
    }

    /// Start aiming along `direction`, or along the avatar's facing direction.
    pub fn start_teleport_aim(&mut self, direction: Option<Vector3<f32>>) -> bool {
        let origin = self.aim_origin();
        let direction = direction.unwrap_or_else(|| self.locomotion.pose().forward());
        if !self.teleport.start_aim(origin, direction, &mut self.host) {
            return false;
        }
        self.locomotion.begin_teleport_aim();
        true
    }

    pub fn update_teleport_aim(
        &mut self,
        direction: Vector3<f32>,
        origin: Vector3<f32>,
    ) -> Option<&TeleportTarget> {
        self.teleport.update_aim(direction, origin, &mut self.host)
    }

    /// Commit the current aim. False, with the pose untouched, unless the
    /// last evaluated target was valid.
    pub fn execute_teleport(&mut self) -> bool {
        let now_ms = self.frames.now_ms();
        let Some(landing) = self.teleport.execute(now_ms, &mut self.host) else {
            return false;
        };

        self.locomotion.end_teleport_aim();
        if !self.locomotion.apply_teleport(landing) {
            return false;
        }
        self.emit_pose();
        true
    }

    pub fn cancel_teleport(&mut self) -> bool {
        let cancelled = self.teleport.cancel(&mut self.host);
        self.locomotion.end_teleport_aim();
        cancelled
    }

    /// Analogue trigger value from the controller. A press starts aiming; the
    /// release executes a valid aim and cancels anything else.
    pub fn set_teleport_trigger(&mut self, value: f32) -> Option<TriggerOutcome> {
        match self.trigger.update(value)? {
            TriggerEdge::Pressed => self.start_teleport_aim(None).then_some(TriggerOutcome::AimStarted),
            TriggerEdge::Released => {
                if !self.teleport.is_aiming() {
                    return None;
                }
                if self.execute_teleport() {
                    Some(TriggerOutcome::Teleported)
                } else {
                    self.cancel_teleport();
                    Some(TriggerOutcome::Cancelled)
                }
            }
        }
    }

    /// Vignette, snap turning and comfort aids in one switch.
    pub fn set_comfort_mode(&mut self, enabled: bool) {
        self.comfort_mode = enabled;
        self.host.set_vignette(enabled);
        self.input.set_snap_turn_enabled(enabled);
        self.comfort.set_enabled(enabled, &mut self.host);
        engine::comfort_log!(info, enabled, "comfort mode changed");
    }

    pub fn set_exit_rails(&mut self, enabled: bool) {
        self.comfort.set_exit_rails(enabled, &mut self.host);
    }

    pub fn set_comfort_zone_radius(&mut self, radius: f32) -> f32 {
        self.comfort.set_comfort_zone_radius(radius)
    }

    /// Session type while an immersive session is running; counts towards
    /// comfort eligibility.
    pub fn set_immersive_session(&mut self, session: Option<SessionType>) {
        self.immersive = session;
    }

    /// Jump to the closest exit rail and leave the water.
    pub fn teleport_to_nearest_exit(&mut self) -> bool {
        let surface = self.surface_level();
        let Some(exit) = self.comfort.nearest_exit(self.locomotion.pose().position, surface) else {
            engine::comfort_log!(debug, "no exit rails available");
            return false;
        };
        if !self.locomotion.apply_teleport(exit) {
            return false;
        }
        self.locomotion.force_exit_swim();
        engine::comfort_log!(info, ?exit, "teleported to nearest exit");
        self.emit_pose();
        true
    }

    pub fn navigation_state(&self) -> NavigationState {
        let tuning = self.tuning.snapshot();
        let pose = self.locomotion.pose();
        let mode = self.locomotion.mode();
        let envelope = self.locomotion.envelope();
        NavigationState {
            mode,
            position: pose.position,
            velocity: pose.velocity,
            is_flying: mode.is_flying(),
            is_swimming: mode.is_swimming(),
            movement_speed: tuning.movement_speed,
            swim_speed: tuning.swim_speed,
            buoyancy_force: tuning.buoyancy_force,
            snap_turn_angle: tuning.snap_turn_angle,
            water_level: tuning.water_level,
            capsule_height: envelope.height(),
            capsule_radius: envelope.radius(),
            teleport_enabled: self.teleport.is_enabled(),
            teleport_aiming: self.teleport.is_aiming(),
            teleport_target_valid: self.teleport.target().is_some_and(|target| target.is_valid),
            comfort_mode: self.comfort_mode,
            comfort_active: self.comfort.is_active(),
            exit_rails_visible: self.comfort.rails_visible(),
            immersive_session: self.immersive,
        }
    }

    /// Release every host visual and drop listeners. Failures are logged and
    /// do not stop the remaining releases. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        let mut errors = self.teleport.dispose(&mut self.host);
        errors.extend(self.comfort.dispose(&mut self.host));
        for error in &errors {
            tracing::error!(error = %error, "failed to release navigation visual");
        }

        self.host.set_vignette(false);
        self.input.clear();
        self.pose_listeners.clear();
        tracing::debug!(failures = errors.len(), "navigation disposed");
    }
}
