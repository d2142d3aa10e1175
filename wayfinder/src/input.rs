use std::collections::HashSet;

use cgmath::{InnerSpace, Vector2, Vector3, Zero, vec2, vec3};

pub const THUMBSTICK_DEAD_ZONE: f32 = 0.1;
pub const SNAP_TURN_THRESHOLD: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Forward,
    Back,
    Left,
    Right,
    Ascend,
    Descend,
}

impl Key {
    /// Map a keyboard key name to a movement key. Letter keys are matched
    /// case-insensitively.
    pub fn from_key_name(name: &str) -> Option<Key> {
        match name.to_ascii_lowercase().as_str() {
            "w" | "arrowup" => Some(Key::Forward),
            "s" | "arrowdown" => Some(Key::Back),
            "a" | "arrowleft" => Some(Key::Left),
            "d" | "arrowright" => Some(Key::Right),
            " " | "space" => Some(Key::Ascend),
            "shift" => Some(Key::Descend),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapDirection {
    Left,
    Right,
}

impl SnapDirection {
    /// Sign of the yaw rotation around +Y.
    pub fn yaw_sign(self) -> f32 {
        match self {
            SnapDirection::Left => 1.0,
            SnapDirection::Right => -1.0,
        }
    }
}

/// Movement intent in avatar-local axes: x is right, y is up, z is forward.
/// Always unit length or zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovementIntent {
    pub local: Vector3<f32>,
}

impl MovementIntent {
    pub fn none() -> Self {
        Self {
            local: Vector3::zero(),
        }
    }

    pub fn from_axes(right: f32, up: f32, forward: f32) -> Self {
        let raw = vec3(right, up, forward);
        let length = raw.magnitude();
        if !length.is_finite() || length <= f32::EPSILON {
            return Self::none();
        }
        Self { local: raw / length }
    }

    pub fn is_zero(&self) -> bool {
        self.local == Vector3::zero()
    }
}

/// Collects keyboard, thumbstick and pointer input between frames and
/// reduces it to a single `MovementIntent`.
#[derive(Debug)]
pub struct InputAggregator {
    held: HashSet<Key>,
    thumbstick: Vector2<f32>,
    snap_turn_enabled: bool,
    snap_armed: bool,
    pending_snap: Option<SnapDirection>,
    pointer_heading: Option<Vector3<f32>>,
    interactions: u64,
}

impl Default for InputAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl InputAggregator {
    pub fn new() -> Self {
        Self {
            held: HashSet::new(),
            thumbstick: Vector2::zero(),
            snap_turn_enabled: false,
            snap_armed: true,
            pending_snap: None,
            pointer_heading: None,
            interactions: 0,
        }
    }

    pub fn key_down(&mut self, key: Key) {
        if self.held.insert(key) {
            self.interactions += 1;
            engine::input_log!(trace, ?key, "key down");
        }
    }

    pub fn key_up(&mut self, key: Key) {
        self.held.remove(&key);
    }

    /// Handle a named key event. Unknown key names are ignored and reported
    /// as `false`.
    pub fn key_event(&mut self, name: &str, pressed: bool) -> bool {
        match Key::from_key_name(name) {
            Some(key) if pressed => {
                self.key_down(key);
                true
            }
            Some(key) => {
                self.key_up(key);
                true
            }
            None => false,
        }
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    /// Controller thumbstick deflection, each axis in [-1, 1]. Stick y is
    /// negative when pushed forward.
    pub fn set_thumbstick(&mut self, x: f32, y: f32) {
        let x = if x.is_finite() { x.clamp(-1.0, 1.0) } else { 0.0 };
        let y = if y.is_finite() { y.clamp(-1.0, 1.0) } else { 0.0 };

        let stick = vec2(x, y);
        self.thumbstick = if stick.magnitude() < THUMBSTICK_DEAD_ZONE {
            Vector2::zero()
        } else {
            stick
        };

        if !self.snap_turn_enabled {
            return;
        }

        if x.abs() < THUMBSTICK_DEAD_ZONE {
            self.snap_armed = true;
        } else if self.snap_armed && x.abs() > SNAP_TURN_THRESHOLD {
            self.snap_armed = false;
            self.pending_snap = Some(if x < 0.0 {
                SnapDirection::Left
            } else {
                SnapDirection::Right
            });
            engine::input_log!(debug, direction = ?self.pending_snap, "snap turn requested");
        }
    }

    pub fn set_snap_turn_enabled(&mut self, enabled: bool) {
        self.snap_turn_enabled = enabled;
        self.snap_armed = true;
        self.pending_snap = None;
    }

    pub fn snap_turn_enabled(&self) -> bool {
        self.snap_turn_enabled
    }

    pub fn take_snap_turn(&mut self) -> Option<SnapDirection> {
        self.pending_snap.take()
    }

    /// Pointer pick toward `direction` (world space). Only the horizontal
    /// component is kept; a vertical-only pick is ignored.
    pub fn pointer_pick(&mut self, direction: Vector3<f32>) {
        self.interactions += 1;
        let flat = vec3(direction.x, 0.0, direction.z);
        let length = flat.magnitude();
        if length.is_finite() && length > f32::EPSILON {
            self.pointer_heading = Some(flat / length);
        }
    }

    /// Consumes the last pointer heading. A pick applies to a single frame.
    pub fn take_pointer_heading(&mut self) -> Option<Vector3<f32>> {
        self.pointer_heading.take()
    }

    pub fn record_interaction(&mut self) {
        self.interactions += 1;
    }

    pub fn interactions(&self) -> u64 {
        self.interactions
    }

    pub fn intent(&self) -> MovementIntent {
        let axis = |positive: Key, negative: Key| -> f32 {
            (self.is_held(positive) as i32 - self.is_held(negative) as i32) as f32
        };

        let mut right = axis(Key::Right, Key::Left);
        let up = axis(Key::Ascend, Key::Descend);
        let mut forward = axis(Key::Forward, Key::Back);

        if !self.snap_turn_enabled {
            right += self.thumbstick.x;
        }
        forward -= self.thumbstick.y;

        right = right.clamp(-1.0, 1.0);
        forward = forward.clamp(-1.0, 1.0);

        MovementIntent::from_axes(right, up, forward)
    }

    /// Drop all held state, used when the window loses focus or on dispose.
    pub fn clear(&mut self) {
        self.held.clear();
        self.thumbstick = Vector2::zero();
        self.pending_snap = None;
        self.pointer_heading = None;
        self.snap_armed = true;
    }
}
