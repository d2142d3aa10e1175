use cgmath::Vector3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::DeviceType;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// `session_<start ms>_<9 base-36 chars>`
pub fn new_session_id(start_ms: u64, rng: &mut impl Rng) -> String {
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect();
    format!("session_{start_ms}_{suffix}")
}

/// Coarse map region used for visit tracking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaRegion {
    EastWing,
    WestWing,
    NorthArea,
    SouthArea,
    CentralArea,
}

impl AreaRegion {
    const THRESHOLD: f32 = 5.0;

    /// Thresholds are tested in order, so the x axis wins at the corners.
    pub fn classify(position: Vector3<f32>) -> Self {
        if position.x > Self::THRESHOLD {
            AreaRegion::EastWing
        } else if position.x < -Self::THRESHOLD {
            AreaRegion::WestWing
        } else if position.z > Self::THRESHOLD {
            AreaRegion::NorthArea
        } else if position.z < -Self::THRESHOLD {
            AreaRegion::SouthArea
        } else {
            AreaRegion::CentralArea
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    #[serde(rename = "averageFPS")]
    pub average_fps: f32,
    /// Bytes.
    pub peak_memory: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    pub session_id: String,
    pub start_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
    /// Zero until the session ends.
    pub duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub device_type: DeviceType,
    pub features_used: Vec<String>,
    pub performance_metrics: PerformanceMetrics,
    pub user_interactions: u64,
    pub areas_visited: Vec<AreaRegion>,
}

impl SessionMetrics {
    pub fn new(session_id: String, start_time: u64, device_type: DeviceType, user_id: Option<String>) -> Self {
        Self {
            session_id,
            start_time,
            end_time: None,
            duration: 0,
            user_id,
            device_type,
            features_used: Vec::new(),
            performance_metrics: PerformanceMetrics::default(),
            user_interactions: 0,
            areas_visited: Vec::new(),
        }
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        self.end_time.unwrap_or(now_ms).saturating_sub(self.start_time)
    }

    /// Stamp the end time. Calling it again leaves the first stamp in place.
    pub fn finalize(&mut self, end_ms: u64) {
        if self.end_time.is_some() {
            return;
        }
        let end_ms = end_ms.max(self.start_time);
        self.end_time = Some(end_ms);
        self.duration = end_ms - self.start_time;
    }

    /// Returns true when the region had not been visited before.
    pub fn visit(&mut self, region: AreaRegion) -> bool {
        if self.areas_visited.contains(&region) {
            return false;
        }
        self.areas_visited.push(region);
        true
    }

    pub fn use_feature(&mut self, name: &str) -> bool {
        if self.features_used.iter().any(|used| used == name) {
            return false;
        }
        self.features_used.push(name.to_string());
        true
    }

    /// Fold one performance sample into the running figures. Samples are
    /// weighted by how many intervals the session has been running, so the
    /// first few cannot dominate the average.
    pub fn record_sample(&mut self, fps: f32, memory: u64, now_ms: u64, sample_interval_ms: u64) {
        let samples = (self.elapsed_ms(now_ms) as f64 / sample_interval_ms.max(1) as f64).max(1.0);
        let fps = if fps.is_finite() { fps.max(0.0) } else { 0.0 };

        let metrics = &mut self.performance_metrics;
        let average = (metrics.average_fps as f64 * (samples - 1.0) + fps as f64) / samples;
        metrics.average_fps = average as f32;
        metrics.peak_memory = metrics.peak_memory.max(memory);
    }
}
