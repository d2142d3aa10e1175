//! Comfort aids for Swim, Fly and immersive sessions.
//!
//! Every `check_interval_ms` the horizontal distance between the avatar and
//! the configured centre is compared with 80% of the comfort radius. Past it,
//! the zone indicator and exit rails are shown and a single haptic pulse is
//! sent; inside it, they are hidden again. The check cadence is the only
//! hysteresis, so a boundary crossing can flip the aids at most once per
//! interval.

use std::f32::consts::TAU;

use cgmath::{InnerSpace, Vector3, vec2, vec3};
use serde::{Deserialize, Serialize};

use crate::error::HostError;
use crate::host::{SceneHost, Tint, VisualHandle, VisualKind, VisualUpdate};
use crate::locomotion::LocomotionMode;

/// Fraction of the comfort radius at which aids switch on.
pub const ACTIVATION_RATIO: f32 = 0.8;
/// Exit shortcut lands this far above the surface.
pub const EXIT_HEIGHT_ABOVE_SURFACE: f32 = 1.0;

const RAIL_TINT: Tint = Tint::new(0.0, 1.0, 1.0);
const ZONE_TINT: Tint = Tint::new(1.0, 1.0, 0.0);
const MIN_ZONE_RADIUS: f32 = 0.1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComfortConfig {
    pub enabled: bool,
    /// Comfort zone centre on the ground plane, as `[x, z]`.
    pub center: [f32; 2],
    pub comfort_zone_radius: f32,
    pub check_interval_ms: u64,
    pub exit_rails_enabled: bool,
    pub rail_count: usize,
    pub rail_distance: f32,
    pub rail_height: f32,
    pub haptic_pulse_ms: u32,
}

impl Default for ComfortConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            center: [0.0, 0.0],
            comfort_zone_radius: 10.0,
            check_interval_ms: 1000,
            exit_rails_enabled: true,
            rail_count: 8,
            rail_distance: 5.0,
            rail_height: 2.0,
            haptic_pulse_ms: 200,
        }
    }
}

impl ComfortConfig {
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        self.comfort_zone_radius = clamp_radius(self.comfort_zone_radius)
            .unwrap_or(defaults.comfort_zone_radius);
        if !self.rail_distance.is_finite() || self.rail_distance < 0.0 {
            self.rail_distance = defaults.rail_distance;
        }
        if !self.rail_height.is_finite() || self.rail_height <= 0.0 {
            self.rail_height = defaults.rail_height;
        }
        if !self.center.iter().all(|c| c.is_finite()) {
            self.center = defaults.center;
        }
        self
    }
}

fn clamp_radius(radius: f32) -> Option<f32> {
    radius.is_finite().then(|| radius.max(MIN_ZONE_RADIUS))
}

/// What the comfort subsystem needs to know about the current frame.
#[derive(Clone, Copy, Debug)]
pub struct ComfortContext {
    pub position: Vector3<f32>,
    pub mode: LocomotionMode,
    pub immersive: bool,
    /// Water level, or ground level when there is no water.
    pub surface_level: f32,
    pub now_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComfortChange {
    Activated,
    Deactivated,
}

pub struct ComfortSystem {
    config: ComfortConfig,
    active: bool,
    last_check_ms: Option<u64>,
    swimming: bool,
    rails: Vec<VisualHandle>,
    zone: Option<VisualHandle>,
    rails_visible: bool,
    zone_visible: bool,
    placed_surface: Option<f32>,
}

impl ComfortSystem {
    pub fn new(config: ComfortConfig) -> Self {
        Self {
            config: config.normalized(),
            active: false,
            last_check_ms: None,
            swimming: false,
            rails: Vec::new(),
            zone: None,
            rails_visible: false,
            zone_visible: false,
            placed_surface: None,
        }
    }

    pub fn config(&self) -> &ComfortConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn rails_visible(&self) -> bool {
        self.rails_visible
    }

    pub fn zone_visible(&self) -> bool {
        self.zone_visible
    }

    pub fn distance_from_center(&self, position: Vector3<f32>) -> f32 {
        let [cx, cz] = self.config.center;
        vec2(position.x - cx, position.z - cz).magnitude()
    }

    pub fn update(&mut self, context: &ComfortContext, host: &mut dyn SceneHost) -> Option<ComfortChange> {
        self.swimming = context.mode.is_swimming();
        self.place_visuals(context.surface_level, host);

        let eligible = self.config.enabled
            && (context.mode.is_swimming() || context.mode.is_flying() || context.immersive);

        let change = if !eligible {
            self.set_active(false, context.position, context.surface_level, host)
        } else if self
            .last_check_ms
            .is_some_and(|last| context.now_ms.saturating_sub(last) < self.config.check_interval_ms)
        {
            None
        } else {
            self.last_check_ms = Some(context.now_ms);
            let distance = self.distance_from_center(context.position);
            let outside = distance > self.config.comfort_zone_radius * ACTIVATION_RATIO;
            engine::comfort_log!(trace, distance, outside, "comfort check");
            self.set_active(outside, context.position, context.surface_level, host)
        };

        self.sync_rails(context.surface_level, host);
        change
    }

    fn set_active(
        &mut self,
        active: bool,
        position: Vector3<f32>,
        surface_level: f32,
        host: &mut dyn SceneHost,
    ) -> Option<ComfortChange> {
        if active == self.active {
            return None;
        }
        self.active = active;

        if active {
            let zone = self.zone_handle(host);
            host.update_visual(
                zone,
                VisualUpdate::Position(vec3(position.x, surface_level - 0.05, position.z)),
            );
            host.update_visual(zone, VisualUpdate::Visible(true));
            self.zone_visible = true;

            let pulsed = host.vibrate(self.config.haptic_pulse_ms);
            engine::comfort_log!(info, pulsed, "comfort aids activated");
            Some(ComfortChange::Activated)
        } else {
            if let Some(zone) = self.zone {
                host.update_visual(zone, VisualUpdate::Visible(false));
            }
            self.zone_visible = false;
            engine::comfort_log!(info, "comfort aids deactivated");
            Some(ComfortChange::Deactivated)
        }
    }

    fn zone_handle(&mut self, host: &mut dyn SceneHost) -> VisualHandle {
        if let Some(zone) = self.zone {
            return zone;
        }
        let zone = host.create_visual(VisualKind::ComfortZone);
        host.update_visual(zone, VisualUpdate::Tint(ZONE_TINT));
        host.update_visual(zone, VisualUpdate::Opacity(0.3));
        self.zone = Some(zone);
        zone
    }

    /// Rails follow the activation state, and are also shown while swimming
    /// with comfort enabled.
    fn sync_rails(&mut self, surface_level: f32, host: &mut dyn SceneHost) {
        let visible = self.config.exit_rails_enabled
            && (self.active || (self.swimming && self.config.enabled));

        if visible && self.rails.is_empty() {
            self.create_rails(surface_level, host);
        }
        if visible == self.rails_visible {
            return;
        }
        for rail in &self.rails {
            host.update_visual(*rail, VisualUpdate::Visible(visible));
        }
        self.rails_visible = visible && !self.rails.is_empty();
    }

    fn create_rails(&mut self, surface_level: f32, host: &mut dyn SceneHost) {
        for position in self.rail_positions(surface_level) {
            let rail = host.create_visual(VisualKind::ExitRail);
            host.update_visual(rail, VisualUpdate::Tint(RAIL_TINT));
            host.update_visual(rail, VisualUpdate::Position(position));
            host.update_visual(rail, VisualUpdate::Visible(false));
            self.rails.push(rail);
        }
        self.placed_surface = Some(surface_level);
    }

    fn place_visuals(&mut self, surface_level: f32, host: &mut dyn SceneHost) {
        if self.rails.is_empty() || self.placed_surface == Some(surface_level) {
            return;
        }
        let positions = self.rail_positions(surface_level);
        for (rail, position) in self.rails.iter().zip(positions) {
            host.update_visual(*rail, VisualUpdate::Position(position));
        }
        self.placed_surface = Some(surface_level);
    }

    /// Rail anchors evenly spaced on a circle around the comfort centre.
    pub fn rail_positions(&self, surface_level: f32) -> Vec<Vector3<f32>> {
        let [cx, cz] = self.config.center;
        let count = self.config.rail_count;
        let y = surface_level + self.config.rail_height / 2.0;
        (0..count)
            .map(|i| {
                let angle = i as f32 / count as f32 * TAU;
                vec3(
                    cx + angle.cos() * self.config.rail_distance,
                    y,
                    cz + angle.sin() * self.config.rail_distance,
                )
            })
            .collect()
    }

    /// Destination of the exit shortcut: the closest rail, lifted to just
    /// above the surface. `None` when rails are off or none are configured.
    pub fn nearest_exit(&self, position: Vector3<f32>, surface_level: f32) -> Option<Vector3<f32>> {
        if !self.config.exit_rails_enabled {
            return None;
        }
        self.rail_positions(surface_level)
            .into_iter()
            .map(|rail| ((rail - position).magnitude(), rail))
            .filter(|(distance, _)| distance.is_finite())
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, rail)| vec3(rail.x, surface_level + EXIT_HEIGHT_ABOVE_SURFACE, rail.z))
    }

    /// Turning comfort off hides every aid immediately.
    pub fn set_enabled(&mut self, enabled: bool, host: &mut dyn SceneHost) {
        self.config.enabled = enabled;
        self.last_check_ms = None;
        if !enabled {
            if self.active {
                self.active = false;
                engine::comfort_log!(info, "comfort aids deactivated");
            }
            if let Some(zone) = self.zone {
                host.update_visual(zone, VisualUpdate::Visible(false));
            }
            self.zone_visible = false;
        }
        let surface = self.placed_surface.unwrap_or(0.0);
        self.sync_rails(surface, host);
    }

    pub fn set_exit_rails(&mut self, enabled: bool, host: &mut dyn SceneHost) {
        self.config.exit_rails_enabled = enabled;
        let surface = self.placed_surface.unwrap_or(0.0);
        self.sync_rails(surface, host);
    }

    pub fn set_comfort_zone_radius(&mut self, radius: f32) -> f32 {
        if let Some(radius) = clamp_radius(radius) {
            self.config.comfort_zone_radius = radius;
        }
        self.config.comfort_zone_radius
    }

    /// Release every visual; a failing release does not stop the rest.
    pub fn dispose(&mut self, host: &mut dyn SceneHost) -> Vec<HostError> {
        self.active = false;
        self.rails_visible = false;
        self.zone_visible = false;
        self.placed_surface = None;
        self.rails
            .drain(..)
            .chain(self.zone.take())
            .filter_map(|handle| host.release_visual(handle).err())
            .collect()
    }
}
