use serde::{Deserialize, Serialize};

const MIN_SAMPLE_INTERVAL_MS: u64 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Medium,
    High,
    Ultra,
}

impl QualityTier {
    /// Hardware scaling level written to the host. Higher renders at a lower
    /// resolution.
    pub fn hardware_scaling(self) -> f32 {
        match self {
            QualityTier::Low => 2.0,
            QualityTier::Medium => 1.5,
            QualityTier::High => 1.0,
            QualityTier::Ultra => 0.8,
        }
    }
}

impl std::str::FromStr for QualityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(QualityTier::Low),
            "medium" => Ok(QualityTier::Medium),
            "high" => Ok(QualityTier::High),
            "ultra" => Ok(QualityTier::Ultra),
            other => Err(format!("unknown quality tier '{other}'")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VrSessionConfig {
    pub enable_vr: bool,
    pub enable_hand_tracking: bool,
    pub enable_eye_tracking: bool,
    pub enable_spatial_audio: bool,
    /// Minutes after which the session timer force-ends a session.
    pub session_timeout: u64,
    pub quality_settings: QualityTier,
}

impl Default for VrSessionConfig {
    fn default() -> Self {
        Self {
            enable_vr: true,
            enable_hand_tracking: false,
            enable_eye_tracking: false,
            enable_spatial_audio: false,
            session_timeout: 120,
            quality_settings: QualityTier::High,
        }
    }
}

impl VrSessionConfig {
    pub fn required_features(&self) -> Vec<String> {
        vec!["local-floor".to_string()]
    }

    pub fn optional_features(&self) -> Vec<String> {
        [
            (self.enable_hand_tracking, "hand-tracking"),
            (self.enable_eye_tracking, "eye-tracking"),
            (self.enable_spatial_audio, "spatial-audio"),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, name)| name.to_string())
        .collect()
    }

    pub fn timeout_ms(&self) -> u64 {
        self.session_timeout.saturating_mul(60 * 1000)
    }

    pub fn normalized(mut self) -> Self {
        self.session_timeout = self.session_timeout.max(1);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArSessionConfig {
    pub enable_ar: bool,
    pub enable_image_tracking: bool,
    pub enable_plane_detection: bool,
    pub enable_face_tracking: bool,
    pub enable_world_tracking: bool,
    pub lighting_estimation: bool,
    pub enable_depth: bool,
}

impl Default for ArSessionConfig {
    fn default() -> Self {
        Self {
            enable_ar: true,
            enable_image_tracking: false,
            enable_plane_detection: true,
            enable_face_tracking: false,
            enable_world_tracking: true,
            lighting_estimation: true,
            enable_depth: false,
        }
    }
}

impl ArSessionConfig {
    pub fn required_features(&self) -> Vec<String> {
        vec!["local-floor".to_string(), "hit-test".to_string()]
    }

    pub fn optional_features(&self) -> Vec<String> {
        [
            (self.enable_image_tracking, "image-tracking"),
            (self.enable_plane_detection, "plane-detection"),
            (self.enable_face_tracking, "face-tracking"),
            (self.enable_world_tracking, "anchors"),
            (self.lighting_estimation, "light-estimation"),
            (self.enable_depth, "depth-sensing"),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, name)| name.to_string())
        .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub vr: VrSessionConfig,
    pub ar: ArSessionConfig,
    /// Performance sampling and timeout check period.
    pub sample_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            vr: VrSessionConfig::default(),
            ar: ArSessionConfig::default(),
            sample_interval_ms: 5000,
        }
    }
}

impl SessionConfig {
    pub fn normalized(mut self) -> Self {
        self.vr = self.vr.normalized();
        self.sample_interval_ms = self.sample_interval_ms.max(MIN_SAMPLE_INTERVAL_MS);
        self
    }
}
