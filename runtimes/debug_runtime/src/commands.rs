// Command processing for debug runtime
//
// HTTP handlers never touch the navigation system directly: they send a
// command to the frame loop and, where an answer is needed, wait on a oneshot
// reply. The frame loop drains the queue at the start of every frame.

use cgmath::{vec3, Vector3};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use wayfinder::session::SessionType;
use wayfinder::{NavigationState, NavigationSystem, SceneHost};

/// Commands that can be sent from HTTP handlers to the frame loop
#[derive(Debug)]
pub enum RuntimeCommand {
    /// Current navigation snapshot
    GetNavigation(oneshot::Sender<FrameSnapshot>),

    /// Apply an input change
    SetInput(InputPatch, oneshot::Sender<InputResult>),

    /// Aim and jump in one go
    Teleport(TeleportRequest, oneshot::Sender<TeleportResult>),

    /// Tell the navigation system whether an immersive session is running
    SetImmersive(Option<SessionType>),

    /// Stop the frame loop
    Shutdown,
}

/// Input channel modifications
#[derive(Debug, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum InputPatch {
    Key { key: String, pressed: bool },
    Thumbstick { x: f32, y: f32 },
    Trigger { value: f32 },
    Pointer { direction: [f32; 3] },
    FlyMode { enabled: bool },
    ComfortMode { enabled: bool },
    TeleportMode { enabled: bool },
    MovementSpeed { value: f32 },
    SwimSpeed { value: f32 },
    BuoyancyForce { value: f32 },
    SnapTurnAngle { value: f32 },
    WaterLevel { value: Option<f32> },
    CollisionCapsule { height: f32, radius: f32 },
    ExitRails { enabled: bool },
    NearestExit,
}

#[derive(Debug, Serialize)]
pub struct InputResult {
    pub applied: bool,
    /// Stored value for setters that clamp.
    pub value: Option<f32>,
}

impl InputResult {
    fn applied() -> Self {
        Self {
            applied: true,
            value: None,
        }
    }

    fn value(value: f32) -> Self {
        Self {
            applied: true,
            value: Some(value),
        }
    }

    fn flag(applied: bool) -> Self {
        Self {
            applied,
            value: None,
        }
    }
}

/// Request to aim and execute a teleport
#[derive(Debug, Deserialize)]
pub struct TeleportRequest {
    pub direction: [f32; 3],
    /// Defaults to the top of the avatar's collision capsule.
    pub origin: Option<[f32; 3]>,
}

#[derive(Debug, Serialize)]
pub struct TeleportResult {
    pub success: bool,
    pub valid_target: bool,
    pub landing: Option<[f32; 3]>,
    pub position: [f32; 3],
}

/// Navigation state plus frame bookkeeping
#[derive(Debug, Serialize, Clone)]
pub struct FrameSnapshot {
    pub frame_index: u64,
    pub total_ms: u64,
    pub navigation: NavigationState,
}

pub fn to_array(v: Vector3<f32>) -> [f32; 3] {
    [v.x, v.y, v.z]
}

pub fn from_array([x, y, z]: [f32; 3]) -> Vector3<f32> {
    vec3(x, y, z)
}

impl InputPatch {
    pub fn apply<H: SceneHost>(self, navigation: &mut NavigationSystem<H>) -> InputResult {
        match self {
            InputPatch::Key { key, pressed } => {
                InputResult::flag(navigation.input_mut().key_event(&key, pressed))
            }
            InputPatch::Thumbstick { x, y } => {
                navigation.input_mut().set_thumbstick(x, y);
                InputResult::applied()
            }
            InputPatch::Trigger { value } => {
                let outcome = navigation.set_teleport_trigger(value);
                InputResult::flag(outcome.is_some())
            }
            InputPatch::Pointer { direction } => {
                navigation.input_mut().pointer_pick(from_array(direction));
                InputResult::applied()
            }
            InputPatch::FlyMode { enabled } => {
                InputResult::flag(navigation.toggle_fly_mode(enabled).is_some())
            }
            InputPatch::ComfortMode { enabled } => {
                navigation.set_comfort_mode(enabled);
                InputResult::applied()
            }
            InputPatch::TeleportMode { enabled } => {
                navigation.set_teleport_mode(enabled);
                InputResult::applied()
            }
            InputPatch::MovementSpeed { value } => {
                InputResult::value(navigation.set_movement_speed(value))
            }
            InputPatch::SwimSpeed { value } => InputResult::value(navigation.set_swim_speed(value)),
            InputPatch::BuoyancyForce { value } => {
                InputResult::value(navigation.set_buoyancy_force(value))
            }
            InputPatch::SnapTurnAngle { value } => {
                InputResult::value(navigation.set_snap_turn_angle(value))
            }
            InputPatch::WaterLevel { value } => {
                navigation.set_water_level(value);
                InputResult::applied()
            }
            InputPatch::CollisionCapsule { height, radius } => {
                let envelope = navigation.set_collision_capsule(height, radius);
                InputResult::value(envelope.height())
            }
            InputPatch::ExitRails { enabled } => {
                navigation.set_exit_rails(enabled);
                InputResult::applied()
            }
            InputPatch::NearestExit => InputResult::flag(navigation.teleport_to_nearest_exit()),
        }
    }
}

impl TeleportRequest {
    pub fn apply<H: SceneHost>(self, navigation: &mut NavigationSystem<H>) -> TeleportResult {
        let direction = from_array(self.direction);
        let origin = self
            .origin
            .map(from_array)
            .unwrap_or_else(|| navigation.aim_origin());

        let started = navigation.start_teleport_aim(Some(direction));
        let (valid_target, landing) = navigation
            .update_teleport_aim(direction, origin)
            .map(|target| (target.is_valid, target.landing.map(to_array)))
            .unwrap_or((false, None));

        let success = started && navigation.execute_teleport();
        if started && !success {
            navigation.cancel_teleport();
        }

        TeleportResult {
            success,
            valid_target,
            landing,
            position: to_array(navigation.pose().position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::ManualClock;
    use std::sync::Arc;
    use cgmath::vec2;
    use wayfinder::sim::{FlatWorld, Pool};
    use wayfinder::WayfinderConfig;

    fn navigation() -> NavigationSystem<FlatWorld> {
        let mut config = WayfinderConfig::default();
        config.teleport.enabled = true;
        NavigationSystem::new(FlatWorld::new(0.0), Arc::new(ManualClock::new(0)), &config)
    }

    #[test]
    fn test_input_patch_parses_channels() {
        let patch: InputPatch =
            serde_json::from_str(r#"{"channel":"key","key":"w","pressed":true}"#).unwrap();
        assert!(matches!(patch, InputPatch::Key { pressed: true, .. }));

        let patch: InputPatch =
            serde_json::from_str(r#"{"channel":"water_level","value":null}"#).unwrap();
        assert!(matches!(patch, InputPatch::WaterLevel { value: None }));

        let patch: InputPatch = serde_json::from_str(r#"{"channel":"nearest_exit"}"#).unwrap();
        assert!(matches!(patch, InputPatch::NearestExit));
    }

    #[test]
    fn test_setters_report_clamped_value() {
        let mut nav = navigation();
        let result = InputPatch::MovementSpeed { value: 9.0 }.apply(&mut nav);
        assert_eq!(result.value, Some(1.0));

        let result = InputPatch::Key {
            key: "F13".to_string(),
            pressed: true,
        }
        .apply(&mut nav);
        assert!(!result.applied);
    }

    #[test]
    fn test_teleport_request_moves_avatar() {
        let mut nav = navigation();
        let result = TeleportRequest {
            direction: [0.0, -1.0, 0.0],
            origin: Some([3.0, 4.0, 1.0]),
        }
        .apply(&mut nav);

        assert!(result.success);
        assert!(result.valid_target);
        let [x, y, z] = result.position;
        assert!((x - 3.0).abs() < 1e-4);
        assert!(y.abs() < 1e-4);
        assert!((z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_invalid_teleport_request_is_cancelled() {
        let mut config = WayfinderConfig::default();
        config.teleport.enabled = true;
        let world = FlatWorld::new(0.0).with_pool(Pool {
            center: vec2(0.0, 0.0),
            radius: 3.0,
            floor: -4.0,
        });
        let mut nav = NavigationSystem::new(world, Arc::new(ManualClock::new(0)), &config);
        let result = TeleportRequest {
            direction: [0.0, -1.0, 0.0],
            origin: Some([0.0, 5.0, 0.0]),
        }
        .apply(&mut nav);

        assert!(!result.success);
        assert!(!result.valid_target);
        assert_eq!(result.position, [0.0, 0.0, 0.0]);
        assert!(!nav.teleport().is_aiming());
        assert!(!nav.mode().is_aiming());
    }
}
