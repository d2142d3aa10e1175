// Avatar locomotion and immersive-session core.
//
// The library never talks to a renderer or XR runtime directly: everything it
// needs from one goes through `host::SceneHost` and `host::XrHost`. `sim`
// provides in-process implementations of both.

pub mod collision;
pub mod comfort;
pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod input;
pub mod locomotion;
pub mod navigation;
pub mod session;
pub mod sim;
pub mod teleport;
pub mod time;

pub use collision::CollisionEnvelope;
pub use comfort::{ComfortConfig, ComfortSystem};
pub use config::WayfinderConfig;
pub use error::{HostError, HostResult};
pub use events::SubscriptionId;
pub use host::{SceneHost, XrHost};
pub use input::{InputAggregator, Key, MovementIntent};
pub use locomotion::{AvatarPose, LocomotionController, LocomotionMode, TuningHandle};
pub use navigation::{NavigationState, NavigationSystem, TriggerOutcome};
pub use session::{SessionManager, SessionMetrics, SessionType, SessionWarning};
pub use teleport::{TeleportConfig, TeleportSystem};
pub use time::Time;
