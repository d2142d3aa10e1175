// Teleport locomotion
//
// Point at a spot, see where the arc comes down, and jump there instantly
// instead of gliding. Landing validation, the preview visuals and trigger
// edge handling live here; the pose change itself is applied by the
// locomotion controller.

pub mod preview;
pub mod teleport_system;
pub mod trajectory;

pub use preview::{TeleportPreview, TeleportVisualStyle, bezier_preview};
pub use teleport_system::{
    TeleportConfig, TeleportPhase, TeleportSystem, TeleportTarget, TeleportTrigger, TriggerEdge,
};
pub use trajectory::{ArcParams, ArcTrajectory, is_valid_landing};
