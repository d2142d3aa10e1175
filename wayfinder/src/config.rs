use std::f32::consts::FRAC_PI_6;
use std::path::Path;

use anyhow::{Context, Result};
use cgmath::{Vector3, vec3};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::collision::{DEFAULT_CAPSULE_HEIGHT, DEFAULT_CAPSULE_RADIUS};
use crate::comfort::ComfortConfig;
use crate::locomotion::{
    BUOYANCY_FORCE_RANGE, MOVEMENT_SPEED_RANGE, SNAP_TURN_RANGE, SURFACE_TENSION_RANGE,
    SWIM_SPEED_RANGE, Tuning, clamp_to,
};
use crate::session::SessionConfig;
use crate::teleport::TeleportConfig;

/// Files tried, in order, when no explicit path is given.
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["wayfinder.toml", ".wayfinder.toml"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocomotionConfig {
    pub movement_speed: f32,
    pub snap_turn_angle: f32,
    pub capsule_height: f32,
    pub capsule_radius: f32,
    pub start_position: [f32; 3],
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            movement_speed: 0.1,
            snap_turn_angle: FRAC_PI_6,
            capsule_height: DEFAULT_CAPSULE_HEIGHT,
            capsule_radius: DEFAULT_CAPSULE_RADIUS,
            start_position: [0.0, 0.0, 0.0],
        }
    }
}

impl LocomotionConfig {
    pub fn start(&self) -> Vector3<f32> {
        let [x, y, z] = self.start_position;
        vec3(x, y, z)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwimConfig {
    /// Height of the water plane. No water when absent.
    pub water_level: Option<f32>,
    pub swim_speed: f32,
    pub buoyancy_force: f32,
    pub surface_tension: f32,
    pub max_depth: f32,
    pub surface_epsilon: f32,
}

impl Default for SwimConfig {
    fn default() -> Self {
        let tuning = Tuning::default();
        Self {
            water_level: None,
            swim_speed: tuning.swim_speed,
            buoyancy_force: tuning.buoyancy_force,
            surface_tension: tuning.surface_tension,
            max_depth: tuning.max_depth,
            surface_epsilon: tuning.surface_epsilon,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WayfinderConfig {
    pub locomotion: LocomotionConfig,
    pub swim: SwimConfig,
    pub teleport: TeleportConfig,
    pub comfort: ComfortConfig,
    pub session: SessionConfig,
}

impl WayfinderConfig {
    /// Load from `config_path`, or from the first default path that exists.
    /// No file at all yields the defaults. Values are clamped the same way
    /// the runtime setters clamp them.
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).await;
        }

        for path in DEFAULT_CONFIG_PATHS {
            let path = Path::new(path);
            if fs::try_exists(path).await.unwrap_or(false) {
                return Self::load_from_file(path).await;
            }
        }

        Ok(Self::default())
    }

    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: WayfinderConfig = toml::from_str(content)?;
        Ok(config.normalized())
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();

        let locomotion = &mut self.locomotion;
        locomotion.movement_speed = clamp_to(locomotion.movement_speed, &MOVEMENT_SPEED_RANGE)
            .unwrap_or(defaults.locomotion.movement_speed);
        locomotion.snap_turn_angle = clamp_to(locomotion.snap_turn_angle, &SNAP_TURN_RANGE)
            .unwrap_or(defaults.locomotion.snap_turn_angle);
        if !locomotion.start_position.iter().all(|c| c.is_finite()) {
            locomotion.start_position = defaults.locomotion.start_position;
        }

        let swim = &mut self.swim;
        swim.water_level = swim.water_level.filter(|level| level.is_finite());
        swim.swim_speed =
            clamp_to(swim.swim_speed, &SWIM_SPEED_RANGE).unwrap_or(defaults.swim.swim_speed);
        swim.buoyancy_force = clamp_to(swim.buoyancy_force, &BUOYANCY_FORCE_RANGE)
            .unwrap_or(defaults.swim.buoyancy_force);
        swim.surface_tension = clamp_to(swim.surface_tension, &SURFACE_TENSION_RANGE)
            .unwrap_or(defaults.swim.surface_tension);
        if !swim.max_depth.is_finite() || swim.max_depth <= 0.0 {
            swim.max_depth = defaults.swim.max_depth;
        }
        if !swim.surface_epsilon.is_finite() || swim.surface_epsilon < 0.0 {
            swim.surface_epsilon = defaults.swim.surface_epsilon;
        }

        self.teleport = self.teleport.normalized();
        self.comfort = self.comfort.normalized();
        self.session = self.session.normalized();
        self
    }

    /// Initial runtime tunables.
    pub fn tuning(&self) -> Tuning {
        Tuning {
            movement_speed: self.locomotion.movement_speed,
            swim_speed: self.swim.swim_speed,
            buoyancy_force: self.swim.buoyancy_force,
            surface_tension: self.swim.surface_tension,
            snap_turn_angle: self.locomotion.snap_turn_angle,
            water_level: self.swim.water_level,
            max_depth: self.swim.max_depth,
            surface_epsilon: self.swim.surface_epsilon,
        }
    }
}
