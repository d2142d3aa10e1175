// End-to-end behaviour across the navigation and session components.

use std::sync::Arc;

use cgmath::{InnerSpace, vec3};
use engine::ManualClock;
use parking_lot::Mutex;

use wayfinder::comfort::{ComfortChange, ComfortConfig, ComfortContext, ComfortSystem};
use wayfinder::input::MovementIntent;
use wayfinder::locomotion::{LocomotionController, LocomotionMode, TuningHandle, buoyancy_lift};
use wayfinder::session::{AreaRegion, SessionConfig, SessionManager, SessionType};
use wayfinder::sim::{FlatWorld, SimulatedXrHost};
use wayfinder::time::Time;
use wayfinder::{NavigationSystem, WayfinderConfig};

fn one_frame(now_ms: u64) -> Time {
    Time::with_scale(1.0, now_ms)
}

fn teleport_enabled() -> WayfinderConfig {
    let mut config = WayfinderConfig::default();
    config.teleport.enabled = true;
    config
}

#[test]
fn test_buoyancy_lifts_swimmer_toward_surface() {
    let mut world = FlatWorld::new(-5.0);
    let tuning = TuningHandle::default();
    tuning.set_water_level(Some(1.0));
    tuning.set_buoyancy_force(5.0);
    let mut controller = LocomotionController::new(tuning, vec3(0.0, 0.0, 0.0));

    controller.update(&one_frame(0), &MovementIntent::none(), None, &mut world);
    assert_eq!(controller.mode(), LocomotionMode::Swim);
    controller.apply_teleport(vec3(0.0, 0.0, 0.0));

    controller.update(&one_frame(16), &MovementIntent::none(), None, &mut world);
    let y = controller.pose().position.y;
    assert!(y > 0.0);
    assert!(y <= 1.0 + 0.1 + 1e-5);
}

#[test]
fn test_buoyancy_is_monotonic_and_saturates() {
    let mut previous = 0.0;
    for step in 0..=40 {
        let depth = step as f32 * 0.05;
        let lift = buoyancy_lift(depth, 5.0);
        assert!(lift >= previous);
        previous = lift;
    }
    assert_eq!(buoyancy_lift(2.0, 5.0), 5.0);
    assert_eq!(buoyancy_lift(3.5, 5.0), 5.0);
    assert_eq!(buoyancy_lift(50.0, 5.0), 5.0);
}

#[test]
fn test_teleport_straight_down_lands_on_floor() {
    let clock = ManualClock::new(0);
    let mut nav = NavigationSystem::new(FlatWorld::new(0.0), Arc::new(clock), &teleport_enabled());

    assert!(nav.start_teleport_aim(None));
    let origin = vec3(2.0, 5.0, -3.0);
    let target = nav.update_teleport_aim(vec3(0.0, -1.0, 0.0), origin).cloned().unwrap();

    assert!(target.is_valid);
    let landing = target.landing.unwrap();
    assert!((landing - vec3(2.0, 0.0, -3.0)).magnitude() < 1e-4);

    assert!(nav.execute_teleport());
    assert!(nav.pose().position.y.abs() < 1e-4);
    assert_eq!(nav.mode(), LocomotionMode::Walk);
}

#[test]
fn test_invalid_aim_does_not_move_avatar() {
    let clock = ManualClock::new(0);
    let world = FlatWorld::new(0.0).with_pool(wayfinder::sim::Pool {
        center: cgmath::vec2(0.0, 0.0),
        radius: 3.0,
        floor: -4.0,
    });
    let mut nav = NavigationSystem::new(world, Arc::new(clock), &teleport_enabled());

    assert!(nav.start_teleport_aim(None));
    let before = *nav.pose();
    let target = nav
        .update_teleport_aim(vec3(0.0, -1.0, 0.0), vec3(0.0, 5.0, 0.0))
        .cloned()
        .unwrap();
    assert!(!target.is_valid);

    assert!(!nav.execute_teleport());
    assert_eq!(*nav.pose(), before);
    assert!(nav.teleport().is_aiming());
}

#[test]
fn test_execute_is_ignored_while_fading() {
    let clock = ManualClock::new(0);
    let mut nav = NavigationSystem::new(FlatWorld::new(0.0), Arc::new(clock.clone()), &teleport_enabled());

    nav.start_teleport_aim(None);
    nav.update_teleport_aim(vec3(0.0, -1.0, 0.0), vec3(1.0, 3.0, 0.0));
    assert!(nav.execute_teleport());
    assert!(nav.teleport().is_executing());

    assert!(!nav.start_teleport_aim(None));
    assert!(!nav.execute_teleport());

    clock.advance(400);
    nav.update_with_time(&one_frame(400));
    assert!(!nav.teleport().is_executing());
    assert!(nav.start_teleport_aim(None));
}

#[tokio::test]
async fn test_unsupported_device_stays_on_desktop() {
    let clock = ManualClock::new(0);
    let host = Arc::new(SimulatedXrHost::new(false, false));
    let mut manager = SessionManager::new(host, Arc::new(clock), SessionConfig::default());

    assert!(!manager.start_session(SessionType::Vr, None).await);
    assert!(!manager.is_session_active());
    assert!(manager.current_session_state().is_none());
}

#[test]
fn test_comfort_flickers_at_most_once_per_interval() {
    let mut world = FlatWorld::new(0.0);
    let config = ComfortConfig {
        enabled: true,
        comfort_zone_radius: 10.0,
        check_interval_ms: 1_000,
        ..ComfortConfig::default()
    };
    let mut comfort = ComfortSystem::new(config);
    let threshold = 10.0 * 0.8;

    let mut changes = Vec::new();
    let mut last_checked_x = None;
    for frame in 0..100u64 {
        let now_ms = frame * 50;
        // Crosses the threshold every 150 ms, well inside one check interval.
        let x = if (frame / 3) % 2 == 0 { threshold + 0.01 } else { threshold - 0.01 };
        let context = ComfortContext {
            position: vec3(x, 0.0, 0.0),
            mode: LocomotionMode::Fly,
            immersive: false,
            surface_level: 0.0,
            now_ms,
        };
        if now_ms % 1_000 == 0 {
            last_checked_x = Some(x);
        }
        if let Some(change) = comfort.update(&context, &mut world) {
            changes.push((now_ms, change));
        }

        let expected = last_checked_x.is_some_and(|checked: f32| checked > threshold);
        assert_eq!(comfort.is_active(), expected);
    }

    for window in changes.windows(2) {
        assert!(window[1].0 - window[0].0 >= 1_000);
    }
    assert_eq!(
        changes,
        vec![
            (0, ComfortChange::Activated),
            (2_000, ComfortChange::Deactivated),
            (3_000, ComfortChange::Activated),
        ]
    );
}

#[tokio::test]
async fn test_session_duration_and_idempotent_end() {
    let clock = ManualClock::new(1_700_000_000_000);
    let host = Arc::new(SimulatedXrHost::new(true, true));
    let mut manager = SessionManager::new(host, Arc::new(clock.clone()), SessionConfig::default());

    assert!(manager.start_session(SessionType::Ar, Some("tester".into())).await);
    let session_id = manager.active_session_metrics().unwrap().session_id.clone();

    clock.advance(42_123);
    manager.end_session().await;
    let archived = manager.session_metrics(&session_id).cloned().unwrap();
    assert_eq!(archived.duration, 42_123);
    assert_eq!(archived.end_time, Some(1_700_000_042_123));

    clock.advance(10_000);
    manager.end_session().await;
    assert_eq!(manager.session_metrics(&session_id), Some(&archived));
}

#[tokio::test]
async fn test_frame_loop_feeds_session_regions() {
    let clock = ManualClock::new(0);
    let mut config = WayfinderConfig::default();
    config.locomotion.movement_speed = 1.0;
    let mut nav = NavigationSystem::new(FlatWorld::new(0.0), Arc::new(clock.clone()), &config);

    let host = Arc::new(SimulatedXrHost::new(true, false));
    let mut manager = SessionManager::new(host, Arc::new(clock.clone()), SessionConfig::default());
    assert!(manager.start_session(SessionType::Vr, None).await);
    let manager = Arc::new(Mutex::new(manager));

    let listener = manager.clone();
    nav.on_pose_changed(move |pose| listener.lock().on_pose_changed(pose));
    nav.set_immersive_session(Some(SessionType::Vr));

    nav.input_mut().key_event("w", true);
    for frame in 0..8u64 {
        clock.advance(16);
        nav.update_with_time(&one_frame(frame * 16));
    }

    let manager = manager.lock();
    let metrics = manager.active_session_metrics().unwrap();
    assert_eq!(
        metrics.areas_visited,
        vec![AreaRegion::CentralArea, AreaRegion::SouthArea]
    );
    assert_eq!(nav.navigation_state().immersive_session, Some(SessionType::Vr));
}

