//! Resolved vehicles and remote-reported state

use std::fmt;

use serde::{Deserialize, Serialize};

/// Connectivity state as reported by the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleState {
    Online,
    Asleep,
    Offline,
    #[default]
    #[serde(other)]
    Unknown,
}

impl VehicleState {
    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}

impl fmt::Display for VehicleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Asleep => write!(f, "asleep"),
            Self::Offline => write!(f, "offline"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Outcome of resolving a VIN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVehicle {
    pub vin: String,
    pub internal_id: String,
    /// Known only when the resolution fetched the vehicle list
    pub state: Option<VehicleState>,
}

impl ResolvedVehicle {
    /// Whether the vehicle list reported the vehicle online at resolution time
    pub fn reported_online(&self) -> bool {
        self.state.is_some_and(VehicleState::is_online)
    }
}
