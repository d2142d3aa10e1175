use cgmath::{InnerSpace, Vector3, vec3};

use crate::error::HostError;
use crate::host::{SceneHost, Tint, VisualHandle, VisualKind, VisualUpdate};

use super::TeleportTarget;

#[derive(Clone, Copy, Debug)]
pub struct TeleportVisualStyle {
    pub valid_tint: Tint,
    pub invalid_tint: Tint,
    /// Lift of the reticle above the landing surface, avoids z-fighting.
    pub reticle_height_offset: f32,
    pub preview_samples: usize,
}

impl Default for TeleportVisualStyle {
    fn default() -> Self {
        Self {
            valid_tint: Tint::new(0.0, 1.0, 0.0),
            invalid_tint: Tint::new(1.0, 0.0, 0.0),
            reticle_height_offset: 0.01,
            preview_samples: 20,
        }
    }
}

/// Quadratic Bézier from `start` to `end` whose control point sits above
/// the midpoint by `max(distance * 0.3, arc_height)`.
pub fn bezier_preview(
    start: Vector3<f32>,
    end: Vector3<f32>,
    arc_height: f32,
    samples: usize,
) -> Vec<Vector3<f32>> {
    let samples = samples.max(1);
    let distance = (end - start).magnitude();
    let control = (start + end) * 0.5 + vec3(0.0, (distance * 0.3).max(arc_height), 0.0);

    (0..=samples)
        .map(|i| {
            let t = i as f32 / samples as f32;
            let u = 1.0 - t;
            start * (u * u) + control * (2.0 * u * t) + end * (t * t)
        })
        .collect()
}

/// Host-side visuals for aiming: the arc, the landing reticle and the fade
/// overlay used after a jump. Handles are created on first use.
#[derive(Debug, Default)]
pub struct TeleportPreview {
    style: TeleportVisualStyle,
    arc: Option<VisualHandle>,
    reticle: Option<VisualHandle>,
    fade: Option<VisualHandle>,
}

impl TeleportPreview {
    pub fn new(style: TeleportVisualStyle) -> Self {
        Self {
            style,
            ..Default::default()
        }
    }

    pub fn style(&self) -> &TeleportVisualStyle {
        &self.style
    }

    fn handle(slot: &mut Option<VisualHandle>, kind: VisualKind, host: &mut dyn SceneHost) -> VisualHandle {
        *slot.get_or_insert_with(|| host.create_visual(kind))
    }

    pub fn show_target(&mut self, target: &TeleportTarget, arc_height: f32, host: &mut dyn SceneHost) {
        let (path, tint) = match (target.is_valid, target.landing) {
            (true, Some(landing)) => (
                bezier_preview(target.origin, landing, arc_height, self.style.preview_samples),
                self.style.valid_tint,
            ),
            _ => (target.arc_points.clone(), self.style.invalid_tint),
        };

        let arc = Self::handle(&mut self.arc, VisualKind::TeleportArc, host);
        host.update_visual(arc, VisualUpdate::Path(path));
        host.update_visual(arc, VisualUpdate::Tint(tint));
        host.update_visual(arc, VisualUpdate::Visible(true));

        let reticle = Self::handle(&mut self.reticle, VisualKind::TeleportReticle, host);
        match target.landing {
            Some(landing) => {
                let lifted = landing + vec3(0.0, self.style.reticle_height_offset, 0.0);
                host.update_visual(reticle, VisualUpdate::Position(lifted));
                host.update_visual(reticle, VisualUpdate::Tint(tint));
                host.update_visual(reticle, VisualUpdate::Visible(true));
            }
            None => host.update_visual(reticle, VisualUpdate::Visible(false)),
        }
    }

    pub fn hide_aim(&mut self, host: &mut dyn SceneHost) {
        for handle in [self.arc, self.reticle].into_iter().flatten() {
            host.update_visual(handle, VisualUpdate::Visible(false));
        }
    }

    /// Overlay opacity in [0, 1]; zero hides the overlay.
    pub fn set_fade(&mut self, opacity: f32, host: &mut dyn SceneHost) {
        let opacity = if opacity.is_finite() { opacity.clamp(0.0, 1.0) } else { 0.0 };
        if opacity <= 0.0 && self.fade.is_none() {
            return;
        }
        let fade = Self::handle(&mut self.fade, VisualKind::FadeOverlay, host);
        host.update_visual(fade, VisualUpdate::Opacity(opacity));
        host.update_visual(fade, VisualUpdate::Visible(opacity > 0.0));
    }

    /// Release every handle. A failing release does not stop the others.
    pub fn release(&mut self, host: &mut dyn SceneHost) -> Vec<HostError> {
        [self.arc.take(), self.reticle.take(), self.fade.take()]
            .into_iter()
            .flatten()
            .filter_map(|handle| host.release_visual(handle).err())
            .collect()
    }
}
