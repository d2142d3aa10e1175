// Headless collaborators: a flat world with an optional pool and a scripted
// XR runtime. The debug runtime drives the core against these, and every
// test in the crate uses them in place of a rendering engine.

use std::collections::HashMap;

use async_trait::async_trait;
use cgmath::{InnerSpace, Vector2, Vector3, vec2, vec3};
use parking_lot::Mutex;
use serde::Serialize;

use crate::collision::CollisionEnvelope;
use crate::error::{HostError, HostResult};
use crate::host::{
    SceneHost, SessionRequest, SurfaceHit, Tint, VisualHandle, VisualKind, VisualUpdate, XrHost,
    XrSessionHandle,
};
use crate::session::SessionType;

/// Downward step applied by `resolve_motion` when gravity is requested.
pub const GRAVITY_STEP: f32 = 0.1;

/// Circular basin in the floor. Its bottom is not a valid landing surface.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Pool {
    pub center: Vector2<f32>,
    pub radius: f32,
    pub floor: f32,
}

impl Pool {
    fn contains(&self, x: f32, z: f32) -> bool {
        (vec2(x, z) - self.center).magnitude() <= self.radius
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimVisual {
    pub kind: VisualKind,
    pub visible: bool,
    pub position: Option<Vector3<f32>>,
    pub path: Vec<Vector3<f32>>,
    pub tint: Option<Tint>,
    pub opacity: f32,
}

impl SimVisual {
    fn new(kind: VisualKind) -> Self {
        Self {
            kind,
            visible: false,
            position: None,
            path: Vec::new(),
            tint: None,
            opacity: 1.0,
        }
    }
}

pub struct FlatWorld {
    floor: f32,
    pool: Option<Pool>,
    half_extent: Option<f32>,
    visuals: HashMap<VisualHandle, SimVisual>,
    next_handle: u64,
    fail_releases: bool,
    release_attempts: usize,
    vibrations: usize,
    vignette: bool,
}

impl FlatWorld {
    pub fn new(floor: f32) -> Self {
        Self {
            floor,
            pool: None,
            half_extent: None,
            visuals: HashMap::new(),
            next_handle: 0,
            fail_releases: false,
            release_attempts: 0,
            vibrations: 0,
            vignette: false,
        }
    }

    pub fn with_pool(mut self, pool: Pool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Square walls at `±half_extent` on x and z.
    pub fn with_bounds(mut self, half_extent: f32) -> Self {
        self.half_extent = Some(half_extent.abs());
        self
    }

    pub fn set_floor_height(&mut self, floor: f32) {
        self.floor = floor;
    }

    pub fn floor_height(&self) -> f32 {
        self.floor
    }

    pub fn pool(&self) -> Option<&Pool> {
        self.pool.as_ref()
    }

    /// Height of the ground under (x, z).
    pub fn floor_at(&self, x: f32, z: f32) -> f32 {
        match self.pool {
            Some(pool) if pool.contains(x, z) => pool.floor,
            _ => self.floor,
        }
    }

    pub fn visual(&self, handle: VisualHandle) -> Option<&SimVisual> {
        self.visuals.get(&handle)
    }

    pub fn visuals(&self) -> impl Iterator<Item = (&VisualHandle, &SimVisual)> {
        self.visuals.iter()
    }

    pub fn live_visuals(&self) -> usize {
        self.visuals.len()
    }

    pub fn visible_of_kind(&self, kind: VisualKind) -> usize {
        self.visuals
            .values()
            .filter(|visual| visual.kind == kind && visual.visible)
            .count()
    }

    pub fn fail_releases(&mut self, fail: bool) {
        self.fail_releases = fail;
    }

    pub fn release_attempts(&self) -> usize {
        self.release_attempts
    }

    pub fn vibrations(&self) -> usize {
        self.vibrations
    }

    pub fn vignette(&self) -> bool {
        self.vignette
    }

    fn clamp_to_bounds(&self, mut position: Vector3<f32>, envelope: &CollisionEnvelope) -> Vector3<f32> {
        if let Some(half_extent) = self.half_extent {
            let limit = (half_extent - envelope.radius()).max(0.0);
            position.x = position.x.clamp(-limit, limit);
            position.z = position.z.clamp(-limit, limit);
        }
        position
    }

    fn plane_hit(
        origin: Vector3<f32>,
        direction: Vector3<f32>,
        max_distance: f32,
        height: f32,
    ) -> Option<(f32, Vector3<f32>)> {
        if direction.y.abs() <= f32::EPSILON {
            return None;
        }
        let distance = (height - origin.y) / direction.y;
        if !(0.0..=max_distance).contains(&distance) {
            return None;
        }
        Some((distance, origin + direction * distance))
    }
}

impl SceneHost for FlatWorld {
    fn resolve_motion(
        &mut self,
        position: Vector3<f32>,
        displacement: Vector3<f32>,
        envelope: &CollisionEnvelope,
        apply_gravity: bool,
    ) -> Vector3<f32> {
        let mut next = self.clamp_to_bounds(position + displacement, envelope);
        if apply_gravity {
            next.y -= GRAVITY_STEP;
        }
        next.y = next.y.max(self.floor_at(next.x, next.z));
        next
    }

    fn hit_test(
        &self,
        origin: Vector3<f32>,
        direction: Vector3<f32>,
        max_distance: f32,
    ) -> Option<SurfaceHit> {
        let inside_pool = |point: Vector3<f32>| self.pool.is_some_and(|pool| pool.contains(point.x, point.z));

        let ground = Self::plane_hit(origin, direction, max_distance, self.floor)
            .filter(|(_, point)| !inside_pool(*point))
            .map(|(distance, point)| (distance, point, true));
        let basin = self
            .pool
            .and_then(|pool| Self::plane_hit(origin, direction, max_distance, pool.floor))
            .filter(|(_, point)| inside_pool(*point))
            .map(|(distance, point)| (distance, point, false));

        let (distance, point, navigable) = ground
            .into_iter()
            .chain(basin)
            .min_by(|a, b| a.0.total_cmp(&b.0))?;
        Some(SurfaceHit {
            point,
            normal: vec3(0.0, 1.0, 0.0),
            distance,
            navigable,
        })
    }

    fn create_visual(&mut self, kind: VisualKind) -> VisualHandle {
        self.next_handle += 1;
        let handle = VisualHandle(self.next_handle);
        self.visuals.insert(handle, SimVisual::new(kind));
        handle
    }

    fn update_visual(&mut self, handle: VisualHandle, update: VisualUpdate) {
        let Some(visual) = self.visuals.get_mut(&handle) else {
            return;
        };
        match update {
            VisualUpdate::Visible(visible) => visual.visible = visible,
            VisualUpdate::Position(position) => visual.position = Some(position),
            VisualUpdate::Path(path) => visual.path = path,
            VisualUpdate::Tint(tint) => visual.tint = Some(tint),
            VisualUpdate::Opacity(opacity) => visual.opacity = opacity,
        }
    }

    fn release_visual(&mut self, handle: VisualHandle) -> HostResult<()> {
        self.release_attempts += 1;
        if self.fail_releases {
            let kind = self
                .visuals
                .get(&handle)
                .map_or(VisualKind::FadeOverlay, |visual| visual.kind);
            return Err(HostError::ReleaseFailed {
                handle,
                kind,
                reason: "scene is shutting down".to_string(),
            });
        }
        self.visuals.remove(&handle);
        Ok(())
    }

    fn vibrate(&mut self, _duration_ms: u32) -> bool {
        self.vibrations += 1;
        true
    }

    fn set_vignette(&mut self, enabled: bool) {
        self.vignette = enabled;
    }
}

#[derive(Debug)]
struct XrState {
    reject_requests: bool,
    fail_end: bool,
    frame_rate: f32,
    memory_usage: u64,
    hardware_scaling: Option<f32>,
    next_session: u64,
    ended_sessions: u32,
}

/// Scripted immersive runtime.
#[derive(Debug)]
pub struct SimulatedXrHost {
    supports_vr: bool,
    supports_ar: bool,
    state: Mutex<XrState>,
}

impl SimulatedXrHost {
    pub fn new(supports_vr: bool, supports_ar: bool) -> Self {
        Self {
            supports_vr,
            supports_ar,
            state: Mutex::new(XrState {
                reject_requests: false,
                fail_end: false,
                frame_rate: 90.0,
                memory_usage: 256 * 1024 * 1024,
                hardware_scaling: None,
                next_session: 0,
                ended_sessions: 0,
            }),
        }
    }

    pub fn reject_requests(&self, reject: bool) {
        self.state.lock().reject_requests = reject;
    }

    pub fn fail_end(&self, fail: bool) {
        self.state.lock().fail_end = fail;
    }

    pub fn set_telemetry(&self, frame_rate: f32, memory_usage: u64) {
        let mut state = self.state.lock();
        state.frame_rate = frame_rate;
        state.memory_usage = memory_usage;
    }

    pub fn hardware_scaling(&self) -> Option<f32> {
        self.state.lock().hardware_scaling
    }

    pub fn ended_sessions(&self) -> u32 {
        self.state.lock().ended_sessions
    }

    fn supports(&self, session_type: SessionType) -> bool {
        match session_type {
            SessionType::Vr => self.supports_vr,
            SessionType::Ar => self.supports_ar,
        }
    }
}

#[async_trait]
impl XrHost for SimulatedXrHost {
    async fn is_session_supported(&self, session_type: SessionType) -> bool {
        self.supports(session_type)
    }

    async fn request_session(&self, request: &SessionRequest) -> HostResult<XrSessionHandle> {
        if !self.supports(request.session_type) {
            return Err(HostError::Unsupported(request.session_type));
        }
        let mut state = self.state.lock();
        if state.reject_requests {
            return Err(HostError::Rejected {
                session_type: request.session_type,
                reason: "user declined the permission prompt".to_string(),
            });
        }
        state.next_session += 1;

        let mut granted_features = request.required_features.clone();
        granted_features.extend(request.optional_features.iter().cloned());
        Ok(XrSessionHandle {
            id: state.next_session,
            session_type: request.session_type,
            granted_features,
        })
    }

    async fn end_session(&self, handle: &XrSessionHandle) -> HostResult<()> {
        let mut state = self.state.lock();
        if state.fail_end {
            return Err(HostError::fault(
                "end_session",
                format!("session {} already torn down", handle.id),
            ));
        }
        state.ended_sessions += 1;
        Ok(())
    }

    fn frame_rate(&self) -> f32 {
        self.state.lock().frame_rate
    }

    fn memory_usage(&self) -> u64 {
        self.state.lock().memory_usage
    }

    fn set_hardware_scaling(&self, level: f32) {
        self.state.lock().hardware_scaling = Some(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gravity_never_sinks_below_floor() {
        let mut world = FlatWorld::new(1.0);
        let envelope = CollisionEnvelope::default();
        let next = world.resolve_motion(vec3(0.0, 1.0, 0.0), vec3(0.5, 0.0, 0.0), &envelope, true);
        assert_eq!(next, vec3(0.5, 1.0, 0.0));
    }

    #[test]
    fn test_bounds_act_as_walls() {
        let mut world = FlatWorld::new(0.0).with_bounds(2.0);
        let envelope = CollisionEnvelope::default();
        let next = world.resolve_motion(vec3(0.0, 0.0, 0.0), vec3(5.0, 0.0, -5.0), &envelope, false);
        assert!((next.x - 1.7).abs() < 1e-5);
        assert!((next.z + 1.7).abs() < 1e-5);
    }

    #[test]
    fn test_pool_floor_is_not_navigable() {
        let world = FlatWorld::new(0.0).with_pool(Pool {
            center: vec2(0.0, -5.0),
            radius: 2.0,
            floor: -3.0,
        });

        let dry = world.hit_test(vec3(0.0, 2.0, 0.0), vec3(0.0, -1.0, 0.0), 10.0).unwrap();
        assert!(dry.navigable);
        assert_eq!(dry.distance, 2.0);

        let wet = world.hit_test(vec3(0.0, 2.0, -5.0), vec3(0.0, -1.0, 0.0), 10.0).unwrap();
        assert!(!wet.navigable);
        assert_eq!(wet.point.y, -3.0);
    }

    #[test]
    fn test_hit_test_respects_range() {
        let world = FlatWorld::new(0.0);
        assert!(world.hit_test(vec3(0.0, 5.0, 0.0), vec3(0.0, -1.0, 0.0), 2.0).is_none());
        assert!(world.hit_test(vec3(0.0, 5.0, 0.0), vec3(0.0, 1.0, 0.0), 20.0).is_none());
    }

    #[tokio::test]
    async fn test_scripted_xr_host() {
        let host = SimulatedXrHost::new(true, false);
        let request = SessionRequest {
            session_type: SessionType::Vr,
            required_features: vec!["local-floor".to_string()],
            optional_features: vec!["hand-tracking".to_string()],
        };

        assert!(!host.is_session_supported(SessionType::Ar).await);
        let handle = host.request_session(&request).await.unwrap();
        assert_eq!(handle.granted_features, vec!["local-floor", "hand-tracking"]);

        host.end_session(&handle).await.unwrap();
        assert_eq!(host.ended_sessions(), 1);
    }
}
