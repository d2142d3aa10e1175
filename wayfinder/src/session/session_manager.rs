use std::collections::BTreeMap;
use std::sync::Arc;

use cgmath::{Quaternion, Vector3, Zero};
use engine::Clock;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::events::{SubscriptionId, Subscribers};
use crate::host::{SessionRequest, XrHost, XrSessionHandle};
use crate::locomotion::AvatarPose;

use super::config::{ArSessionConfig, QualityTier, SessionConfig, VrSessionConfig};
use super::metrics::{AreaRegion, SessionMetrics, new_session_id};
use super::{DeviceType, SessionType, SessionWarning};

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct UserRotation {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl From<Quaternion<f32>> for UserRotation {
    fn from(q: Quaternion<f32>) -> Self {
        Self {
            x: q.v.x,
            y: q.v.y,
            z: q.v.z,
            w: q.s,
        }
    }
}

/// Live view of the active session.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub is_active: bool,
    pub session_type: SessionType,
    pub user_position: Vector3<f32>,
    pub user_rotation: UserRotation,
    pub active_features: Vec<String>,
    pub session_metrics: SessionMetrics,
    #[serde(skip)]
    handle: XrSessionHandle,
}

impl SessionState {
    pub fn handle(&self) -> &XrSessionHandle {
        &self.handle
    }
}

#[derive(Clone, Debug)]
pub enum SessionPhase {
    NoSession,
    Requesting(SessionType),
    Active(Box<SessionState>),
    Ending,
}

/// Puts the phase back to `NoSession` if the owning future is dropped while
/// waiting on the host.
struct PhaseGuard<'a> {
    phase: &'a mut SessionPhase,
    armed: bool,
}

impl<'a> PhaseGuard<'a> {
    fn enter(phase: &'a mut SessionPhase, next: SessionPhase) -> Self {
        *phase = next;
        Self { phase, armed: true }
    }

    fn finish(mut self, next: SessionPhase) {
        *self.phase = next;
        self.armed = false;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.phase = SessionPhase::NoSession;
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionExport<'a> {
    sessions: Vec<&'a SessionMetrics>,
    current_session: Option<&'a SessionState>,
    config: ExportedConfig,
}

#[derive(Serialize)]
struct ExportedConfig {
    vr: ExportedVrConfig,
    ar: ExportedArConfig,
}

/// Export view of `VrSessionConfig`; TOML keeps snake_case.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedVrConfig {
    #[serde(rename = "enableVR")]
    enable_vr: bool,
    enable_hand_tracking: bool,
    enable_eye_tracking: bool,
    enable_spatial_audio: bool,
    session_timeout: u64,
    quality_settings: QualityTier,
}

impl From<&VrSessionConfig> for ExportedVrConfig {
    fn from(config: &VrSessionConfig) -> Self {
        Self {
            enable_vr: config.enable_vr,
            enable_hand_tracking: config.enable_hand_tracking,
            enable_eye_tracking: config.enable_eye_tracking,
            enable_spatial_audio: config.enable_spatial_audio,
            session_timeout: config.session_timeout,
            quality_settings: config.quality_settings,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedArConfig {
    #[serde(rename = "enableAR")]
    enable_ar: bool,
    enable_image_tracking: bool,
    enable_plane_detection: bool,
    enable_face_tracking: bool,
    enable_world_tracking: bool,
    lighting_estimation: bool,
    enable_depth: bool,
}

impl From<&ArSessionConfig> for ExportedArConfig {
    fn from(config: &ArSessionConfig) -> Self {
        Self {
            enable_ar: config.enable_ar,
            enable_image_tracking: config.enable_image_tracking,
            enable_plane_detection: config.enable_plane_detection,
            enable_face_tracking: config.enable_face_tracking,
            enable_world_tracking: config.enable_world_tracking,
            lighting_estimation: config.lighting_estimation,
            enable_depth: config.enable_depth,
        }
    }
}

pub struct SessionManager {
    host: Arc<dyn XrHost>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    phase: SessionPhase,
    history: BTreeMap<String, SessionMetrics>,
    rng: StdRng,
    on_start: Subscribers<SessionMetrics>,
    on_end: Subscribers<SessionMetrics>,
    disposed: bool,
}

impl SessionManager {
    pub fn new(host: Arc<dyn XrHost>, clock: Arc<dyn Clock>, config: SessionConfig) -> Self {
        Self {
            host,
            clock,
            config: config.normalized(),
            phase: SessionPhase::NoSession,
            history: BTreeMap::new(),
            rng: StdRng::from_entropy(),
            on_start: Subscribers::new(),
            on_end: Subscribers::new(),
            disposed: false,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    fn is_enabled(&self, session_type: SessionType) -> bool {
        match session_type {
            SessionType::Vr => self.config.vr.enable_vr,
            SessionType::Ar => self.config.ar.enable_ar,
        }
    }

    fn request_for(&self, session_type: SessionType) -> SessionRequest {
        let (required_features, optional_features) = match session_type {
            SessionType::Vr => (
                self.config.vr.required_features(),
                self.config.vr.optional_features(),
            ),
            SessionType::Ar => (
                self.config.ar.required_features(),
                self.config.ar.optional_features(),
            ),
        };
        SessionRequest {
            session_type,
            required_features,
            optional_features,
        }
    }

    /// Start an immersive session. Every refusal (disabled in config, device
    /// not capable, host rejection, another session running) is reported as
    /// `false` and leaves the manager as it was.
    pub async fn start_session(&mut self, session_type: SessionType, user_id: Option<String>) -> bool {
        if self.disposed {
            return false;
        }
        if !matches!(self.phase, SessionPhase::NoSession) {
            engine::session_log!(warn, %session_type, "session start rejected: another session is in progress");
            return false;
        }
        if !self.is_enabled(session_type) {
            engine::session_log!(warn, %session_type, "session start rejected: disabled in configuration");
            return false;
        }

        let host = self.host.clone();
        let request = self.request_for(session_type);
        let guard = PhaseGuard::enter(&mut self.phase, SessionPhase::Requesting(session_type));

        if !host.is_session_supported(session_type).await {
            engine::session_log!(warn, %session_type, "immersive session not available on this device");
            return false;
        }

        let handle = match host.request_session(&request).await {
            Ok(handle) => handle,
            Err(err) => {
                engine::session_log!(warn, %session_type, error = %err, "session request failed");
                return false;
            }
        };

        let start_ms = self.clock.now_ms();
        let session_id = new_session_id(start_ms, &mut self.rng);
        let metrics = SessionMetrics::new(session_id, start_ms, session_type.into(), user_id);
        let state = SessionState {
            is_active: true,
            session_type,
            user_position: Vector3::zero(),
            user_rotation: UserRotation::from(Quaternion::new(1.0, 0.0, 0.0, 0.0)),
            active_features: handle.granted_features.clone(),
            session_metrics: metrics.clone(),
            handle,
        };
        guard.finish(SessionPhase::Active(Box::new(state)));

        engine::session_log!(info, session_id = %metrics.session_id, %session_type, "session started");
        self.on_start.emit(&metrics);
        true
    }

    /// End the active session, if any. Metrics are archived before the host
    /// is asked to tear down, so a host failure cannot lose them.
    pub async fn end_session(&mut self) {
        let SessionPhase::Active(_) = self.phase else {
            return;
        };
        let previous = std::mem::replace(&mut self.phase, SessionPhase::NoSession);
        let SessionPhase::Active(state) = previous else {
            return;
        };
        let guard = PhaseGuard::enter(&mut self.phase, SessionPhase::Ending);

        let mut metrics = state.session_metrics;
        metrics.finalize(self.clock.now_ms());
        self.history.insert(metrics.session_id.clone(), metrics.clone());

        if let Err(err) = self.host.end_session(&state.handle).await {
            engine::session_log!(warn, session_id = %metrics.session_id, error = %err, "host failed to end session");
        }
        guard.finish(SessionPhase::NoSession);

        engine::session_log!(
            info,
            session_id = %metrics.session_id,
            duration_ms = metrics.duration,
            "session ended"
        );
        self.on_end.emit(&metrics);
    }

    fn active_mut(&mut self) -> Option<&mut SessionState> {
        match &mut self.phase {
            SessionPhase::Active(state) => Some(state),
            _ => None,
        }
    }

    fn active(&self) -> Option<&SessionState> {
        match &self.phase {
            SessionPhase::Active(state) => Some(state),
            _ => None,
        }
    }

    /// Pose-change notification from the tracking side.
    pub fn on_pose_changed(&mut self, pose: &AvatarPose) {
        let Some(state) = self.active_mut() else {
            return;
        };
        state.user_position = pose.position;
        state.user_rotation = pose.orientation.into();

        let region = AreaRegion::classify(pose.position);
        if state.session_metrics.visit(region) {
            engine::session_log!(debug, ?region, "new area visited");
        }
    }

    pub fn record_interaction(&mut self) {
        if let Some(state) = self.active_mut() {
            state.session_metrics.user_interactions += 1;
        }
    }

    pub fn track_feature_usage(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let Some(state) = self.active_mut() else {
            return;
        };
        if !state.active_features.iter().any(|feature| feature == name) {
            state.active_features.push(name.to_string());
        }
        state.session_metrics.use_feature(name);
    }

    /// Fold a frame rate and memory sample from the host into the metrics.
    pub fn sample_performance(&mut self) {
        let now = self.clock.now_ms();
        let interval = self.config.sample_interval_ms;
        let fps = self.host.frame_rate();
        let memory = self.host.memory_usage();
        if let Some(state) = self.active_mut() {
            state.session_metrics.record_sample(fps, memory, now, interval);
        }
    }

    /// Periodic work: one performance sample, then the timeout check. A
    /// timed-out session is ended and reported, not treated as an error.
    pub async fn on_timer_tick(&mut self) -> Option<SessionWarning> {
        self.sample_performance();

        let now = self.clock.now_ms();
        let timeout_ms = self.config.vr.timeout_ms();
        let (session_id, elapsed_ms) = {
            let state = self.active()?;
            let elapsed = state.session_metrics.elapsed_ms(now);
            (state.session_metrics.session_id.clone(), elapsed)
        };
        if elapsed_ms < timeout_ms {
            return None;
        }

        engine::session_log!(warn, %session_id, elapsed_ms, "session timeout reached, ending session");
        self.end_session().await;
        Some(SessionWarning::TimedOut {
            session_id,
            elapsed_ms,
        })
    }

    /// Writes a single hardware scaling value; repeating the call is harmless.
    pub fn set_quality_settings(&mut self, quality: QualityTier) {
        self.config.vr.quality_settings = quality;
        self.host.set_hardware_scaling(quality.hardware_scaling());
        engine::session_log!(info, ?quality, "quality settings changed");
    }

    pub fn update_vr_config(&mut self, update: impl FnOnce(&mut VrSessionConfig)) {
        update(&mut self.config.vr);
        self.config.vr = self.config.vr.clone().normalized();
    }

    pub fn update_ar_config(&mut self, update: impl FnOnce(&mut ArSessionConfig)) {
        update(&mut self.config.ar);
    }

    pub fn vr_config(&self) -> &VrSessionConfig {
        &self.config.vr
    }

    pub fn ar_config(&self) -> &ArSessionConfig {
        &self.config.ar
    }

    pub fn is_session_active(&self) -> bool {
        self.active().is_some_and(|state| state.is_active)
    }

    pub fn session_type(&self) -> Option<SessionType> {
        self.active().map(|state| state.session_type)
    }

    pub fn current_device_type(&self) -> DeviceType {
        self.session_type().map_or(DeviceType::Desktop, DeviceType::from)
    }

    pub fn current_session_state(&self) -> Option<&SessionState> {
        self.active()
    }

    pub fn active_session_metrics(&self) -> Option<&SessionMetrics> {
        self.active().map(|state| &state.session_metrics)
    }

    /// Archived metrics for `session_id`, or the live session's.
    pub fn session_metrics(&self, session_id: &str) -> Option<&SessionMetrics> {
        self.history.get(session_id).or_else(|| {
            self.active_session_metrics()
                .filter(|metrics| metrics.session_id == session_id)
        })
    }

    pub fn all_session_metrics(&self) -> Vec<&SessionMetrics> {
        self.history.values().collect()
    }

    /// JSON snapshot of every archived session plus the live one, and the
    /// session configuration.
    pub fn export_session_data(&self) -> String {
        let mut sessions = self.all_session_metrics();
        if let Some(current) = self.active_session_metrics() {
            sessions.push(current);
        }
        let export = SessionExport {
            sessions,
            current_session: self.active(),
            config: ExportedConfig {
                vr: ExportedVrConfig::from(&self.config.vr),
                ar: ExportedArConfig::from(&self.config.ar),
            },
        };
        serde_json::to_string_pretty(&export).unwrap_or_else(|err| {
            engine::session_log!(error, error = %err, "failed to serialize session export");
            String::from("{}")
        })
    }

    pub fn on_session_start(&mut self, listener: impl FnMut(&SessionMetrics) + Send + 'static) -> SubscriptionId {
        self.on_start.subscribe(listener)
    }

    pub fn on_session_end(&mut self, listener: impl FnMut(&SessionMetrics) + Send + 'static) -> SubscriptionId {
        self.on_end.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.on_start.unsubscribe(id) || self.on_end.unsubscribe(id)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// End any live session and drop the archive. Safe to call repeatedly.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.end_session().await;
        self.history.clear();
        self.on_start.clear();
        self.on_end.clear();
        self.disposed = true;
        engine::session_log!(debug, "session manager disposed");
    }
}
