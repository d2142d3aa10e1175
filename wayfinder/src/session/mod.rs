//! Immersive session lifecycle.
//!
//! `SessionManager` owns the NoSession, Requesting, Active, Ending cycle of a
//! single head-mounted or passthrough session, the metrics of the live
//! session, and the archive of finished ones. `monitor` drives its fixed
//! interval sampling and timeout check from a tokio task.

mod config;
mod metrics;
pub mod monitor;
mod session_manager;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use config::{ArSessionConfig, QualityTier, SessionConfig, VrSessionConfig};
pub use metrics::{AreaRegion, PerformanceMetrics, SessionMetrics, new_session_id};
pub use monitor::{SessionTimer, spawn_session_timer};
pub use session_manager::{SessionManager, SessionPhase, SessionState, UserRotation};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionType {
    #[serde(rename = "VR")]
    Vr,
    #[serde(rename = "AR")]
    Ar,
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionType::Vr => write!(f, "VR"),
            SessionType::Ar => write!(f, "AR"),
        }
    }
}

impl std::str::FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "VR" => Ok(SessionType::Vr),
            "AR" => Ok(SessionType::Ar),
            other => Err(format!("unknown session type '{other}'")),
        }
    }
}

/// Kind of device a session runs on. Desktop means no session object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "VR")]
    Vr,
    #[serde(rename = "AR")]
    Ar,
    Desktop,
}

impl From<SessionType> for DeviceType {
    fn from(session_type: SessionType) -> Self {
        match session_type {
            SessionType::Vr => DeviceType::Vr,
            SessionType::Ar => DeviceType::Ar,
        }
    }
}

/// Surfaced to the caller when the session timer force-ends a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionWarning {
    TimedOut { session_id: String, elapsed_ms: u64 },
}

impl fmt::Display for SessionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionWarning::TimedOut {
                session_id,
                elapsed_ms,
            } => write!(
                f,
                "session {session_id} ended after reaching its timeout ({} s)",
                elapsed_ms / 1000
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_type_names() {
        assert_eq!(SessionType::Vr.to_string(), "VR");
        assert_eq!("ar".parse::<SessionType>(), Ok(SessionType::Ar));
        assert!("desktop".parse::<SessionType>().is_err());
        assert_eq!(serde_json::to_string(&DeviceType::Desktop).unwrap(), "\"Desktop\"");
        assert_eq!(serde_json::to_string(&SessionType::Vr).unwrap(), "\"VR\"");
    }
}
