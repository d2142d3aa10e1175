use std::fmt;

use serde::Serialize;

/// Continuous movement modes. Teleport aiming suspends one of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementMode {
    Walk,
    Fly,
    Swim,
}

/// The single active locomotion mode.
///
/// `TeleportAiming` remembers the mode it interrupted so cancelling the aim
/// always returns there.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LocomotionMode {
    Walk,
    Fly,
    Swim,
    TeleportAiming { resume: MovementMode },
}

impl LocomotionMode {
    /// The movement mode in effect, looking through an aim in progress.
    pub fn movement(&self) -> MovementMode {
        match *self {
            LocomotionMode::Walk => MovementMode::Walk,
            LocomotionMode::Fly => MovementMode::Fly,
            LocomotionMode::Swim => MovementMode::Swim,
            LocomotionMode::TeleportAiming { resume } => resume,
        }
    }

    pub fn is_aiming(&self) -> bool {
        matches!(self, LocomotionMode::TeleportAiming { .. })
    }

    pub fn is_swimming(&self) -> bool {
        self.movement() == MovementMode::Swim
    }

    pub fn is_flying(&self) -> bool {
        self.movement() == MovementMode::Fly
    }
}

impl From<MovementMode> for LocomotionMode {
    fn from(mode: MovementMode) -> Self {
        match mode {
            MovementMode::Walk => LocomotionMode::Walk,
            MovementMode::Fly => LocomotionMode::Fly,
            MovementMode::Swim => LocomotionMode::Swim,
        }
    }
}

impl fmt::Display for LocomotionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocomotionMode::Walk => write!(f, "walk"),
            LocomotionMode::Fly => write!(f, "fly"),
            LocomotionMode::Swim => write!(f, "swim"),
            LocomotionMode::TeleportAiming { resume } => {
                write!(f, "teleport_aiming({})", LocomotionMode::from(*resume))
            }
        }
    }
}

/// A mode change observed during a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeTransition {
    pub from: LocomotionMode,
    pub to: LocomotionMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aiming_reports_suspended_mode() {
        let mode = LocomotionMode::TeleportAiming {
            resume: MovementMode::Swim,
        };
        assert!(mode.is_aiming());
        assert!(mode.is_swimming());
        assert_eq!(mode.to_string(), "teleport_aiming(swim)");
    }

    #[test]
    fn test_serializes_with_tag() {
        let json = serde_json::to_string(&LocomotionMode::Fly).unwrap();
        assert_eq!(json, r#"{"mode":"fly"}"#);
    }
}
