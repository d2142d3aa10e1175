// Collaborator boundary: everything the locomotion core consumes from the
// rendering/tracking engine it is embedded in.

use async_trait::async_trait;
use cgmath::Vector3;
use serde::{Deserialize, Serialize};

use crate::collision::CollisionEnvelope;
use crate::error::{HostError, HostResult};
use crate::session::SessionType;

/// Result of a scene hit-test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceHit {
    pub point: Vector3<f32>,
    pub normal: Vector3<f32>,
    /// Distance along the ray from its origin.
    pub distance: f32,
    /// Whether the surface is eligible as a walking floor or teleport landing.
    pub navigable: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisualHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisualKind {
    TeleportArc,
    TeleportReticle,
    FadeOverlay,
    ExitRail,
    ComfortZone,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tint {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Tint {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

/// A single change to a host-owned visual.
#[derive(Clone, Debug, PartialEq)]
pub enum VisualUpdate {
    Visible(bool),
    Position(Vector3<f32>),
    Path(Vec<Vector3<f32>>),
    Tint(Tint),
    Opacity(f32),
}

/// Per-frame, synchronous services of the rendering engine.
///
/// Implementations must not block: every method is called from inside the
/// frame loop.
pub trait SceneHost {
    /// Apply a movement request against the environment's floor and wall
    /// contact, returning the resolved avatar position.
    fn resolve_motion(
        &mut self,
        position: Vector3<f32>,
        displacement: Vector3<f32>,
        envelope: &CollisionEnvelope,
        apply_gravity: bool,
    ) -> Vector3<f32>;

    /// Nearest surface along `direction` (unit length) within `max_distance`.
    fn hit_test(
        &self,
        origin: Vector3<f32>,
        direction: Vector3<f32>,
        max_distance: f32,
    ) -> Option<SurfaceHit>;

    fn create_visual(&mut self, kind: VisualKind) -> VisualHandle;

    fn update_visual(&mut self, handle: VisualHandle, update: VisualUpdate);

    fn release_visual(&mut self, handle: VisualHandle) -> HostResult<()>;

    /// Optional device vibration. Returns false when no actuator exists.
    fn vibrate(&mut self, _duration_ms: u32) -> bool {
        false
    }

    fn set_vignette(&mut self, _enabled: bool) {}
}

/// Parameters of an immersive session request.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_type: SessionType,
    pub required_features: Vec<String>,
    pub optional_features: Vec<String>,
}

/// Capability handle for a granted session, resolved once at session start.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XrSessionHandle {
    pub id: u64,
    pub session_type: SessionType,
    pub granted_features: Vec<String>,
}

/// Immersive-session primitives and host telemetry.
#[async_trait]
pub trait XrHost: Send + Sync {
    async fn is_session_supported(&self, session_type: SessionType) -> bool;

    async fn request_session(&self, request: &SessionRequest) -> HostResult<XrSessionHandle>;

    async fn end_session(&self, handle: &XrSessionHandle) -> HostResult<()>;

    fn frame_rate(&self) -> f32;

    /// Bytes currently in use by the host process.
    fn memory_usage(&self) -> u64;

    fn set_hardware_scaling(&self, level: f32);
}

/// Host used when no immersive runtime exists: every capability query fails,
/// leaving the caller in desktop mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopOnlyHost;

#[async_trait]
impl XrHost for DesktopOnlyHost {
    async fn is_session_supported(&self, _session_type: SessionType) -> bool {
        false
    }

    async fn request_session(&self, request: &SessionRequest) -> HostResult<XrSessionHandle> {
        Err(HostError::Unsupported(request.session_type))
    }

    async fn end_session(&self, _handle: &XrSessionHandle) -> HostResult<()> {
        Ok(())
    }

    fn frame_rate(&self) -> f32 {
        0.0
    }

    fn memory_usage(&self) -> u64 {
        0
    }

    fn set_hardware_scaling(&self, _level: f32) {}
}
