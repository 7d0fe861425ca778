//! Error taxonomy for the preconditioning service

use std::time::Duration;

use thiserror::Error;

/// Result type for preconditioning operations
pub type Result<T> = std::result::Result<T, PrecondError>;

/// Errors raised while orchestrating a preconditioning session.
///
/// The `Display` text of each variant is what the caller ultimately sees,
/// prefixed with `Error: `. Existing clients match on some of these texts,
/// so treat them as part of the HTTP contract.
#[derive(Debug, Error)]
pub enum PrecondError {
    /// No cached token, refresh token or primary credential is available
    #[error("No access token provided")]
    NoCredential,

    /// Exchanging a refresh token or primary credential did not yield a token
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// The remote API rejected the request twice in a row with 401
    #[error("Access Token invalid")]
    Auth,

    /// No vehicle in the account matches the requested VIN
    #[error("Cannot find vehicle with that VIN")]
    VehicleNotFound { vin: String },

    /// The vehicle stayed asleep for the whole retry or poll budget
    #[error("Timed out waiting for car to wake up ({}ms).", .elapsed.as_millis())]
    WakeTimeout { attempts: u32, elapsed: Duration },

    /// A vehicle-scoped request returned 404: the cached internal id is stale
    #[error("Vehicle id {vehicle_id} is no longer known to the API")]
    StaleVehicleId { vehicle_id: String },

    /// The remote API answered with an unexpected status
    #[error("Invalid response from {path}: [{status}] {body}")]
    Command {
        status: u16,
        path: String,
        body: String,
    },

    /// The incoming request is missing or carries malformed parameters
    #[error("{0}")]
    InvalidRequest(String),

    /// Transport-level failure talking to the remote API
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Failed to parse a response body
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Reading or writing the key/value store failed
    #[error("Store error: {0}")]
    Store(String),
}

impl PrecondError {
    /// Create a command error from a status code, path and raw body
    pub fn command(status: u16, path: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Command {
            status,
            path: path.into(),
            body: body.into(),
        }
    }

    /// Short machine-readable kind, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoCredential => "no_credential",
            Self::RefreshFailed(_) => "refresh_failed",
            Self::Auth => "auth",
            Self::VehicleNotFound { .. } => "vehicle_not_found",
            Self::WakeTimeout { .. } => "wake_timeout",
            Self::StaleVehicleId { .. } => "stale_vehicle_id",
            Self::Command { .. } => "command",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Transport(_) => "transport",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Parse(_) => "parse",
            Self::Store(_) => "store",
        }
    }
}

impl From<serde_json::Error> for PrecondError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<std::io::Error> for PrecondError {
    fn from(err: std::io::Error) -> Self {
        Self::Store(err.to_string())
    }
}
