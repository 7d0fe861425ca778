//! Request and response types for the owner API

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use precond_core::{Result, VehicleState};

/// Raw response returned by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Decode the body and unwrap the `{"response": ...}` envelope
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        self.json::<Envelope<T>>().map(|envelope| envelope.response)
    }
}

/// Every owner API body is wrapped in `{"response": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub response: T,
}

/// Entry of the vehicle list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSummary {
    /// Internal id, string form
    #[serde(rename = "id_s")]
    pub id: String,
    pub vin: String,
    #[serde(default)]
    pub state: VehicleState,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// State fields of a single vehicle, as returned by the state and wake
/// endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleStatus {
    #[serde(default)]
    pub state: VehicleState,
}
