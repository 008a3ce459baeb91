//! Run status reported to clients.

use serde::{Deserialize, Serialize};

/// Whether a simulation run is currently active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    Running,
    /// Never started, or stopped.
    #[default]
    Stopped,
}

impl SystemStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

impl From<bool> for SystemStatus {
    fn from(running: bool) -> Self {
        if running { Self::Running } else { Self::Stopped }
    }
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
