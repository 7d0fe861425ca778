//! Owner API HTTP client

use std::time::Duration;

use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{info, instrument, warn};
use url::Url;

use precond_core::{CommandVerb, PrecondError, Result};

use crate::types::ApiResponse;

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default connection timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Map a transport failure into the shared error type
pub(crate) fn transport_error(err: reqwest::Error) -> PrecondError {
    PrecondError::Transport(err.to_string())
}

/// Remote endpoints used by a preconditioning session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `GET /api/1/vehicles`
    ListVehicles,
    /// `GET /api/1/vehicles/{id}`
    VehicleState { vehicle_id: String },
    /// `POST /api/1/vehicles/{id}/wake_up`
    WakeUp { vehicle_id: String },
    /// `POST /api/1/vehicles/{id}/command/{verb}`
    Command {
        vehicle_id: String,
        verb: CommandVerb,
    },
}

impl Endpoint {
    pub fn method(&self) -> Method {
        match self {
            Self::ListVehicles | Self::VehicleState { .. } => Method::GET,
            Self::WakeUp { .. } | Self::Command { .. } => Method::POST,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::ListVehicles => "/api/1/vehicles".to_string(),
            Self::VehicleState { vehicle_id } => format!("/api/1/vehicles/{}", vehicle_id),
            Self::WakeUp { vehicle_id } => format!("/api/1/vehicles/{}/wake_up", vehicle_id),
            Self::Command { vehicle_id, verb } => format!(
                "/api/1/vehicles/{}/command/{}",
                vehicle_id,
                verb.path_segment()
            ),
        }
    }

    /// Internal vehicle id for vehicle-scoped endpoints
    pub fn vehicle_id(&self) -> Option<&str> {
        match self {
            Self::ListVehicles => None,
            Self::VehicleState { vehicle_id }
            | Self::WakeUp { vehicle_id }
            | Self::Command { vehicle_id, .. } => Some(vehicle_id),
        }
    }
}

/// Thin bearer-authenticated transport over the owner API.
///
/// Performs exactly one request per call and never interprets the status
/// code; the retry policy lives in [`CommandDispatcher`](crate::CommandDispatcher).
#[derive(Debug, Clone)]
pub struct OwnerApiClient {
    client: Client,
    base_url: Url,
}

impl OwnerApiClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the owner API (e.g., "https://owner-api.teslamotors.com")
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_config(base_url, DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Create a new client with custom timeouts
    pub fn with_config(
        base_url: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(transport_error)?;

        let base_url = Url::parse(base_url)?;

        Ok(Self { client, base_url })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Get a reference to the underlying HTTP client
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Issue one request and return the raw status and body
    #[instrument(skip(self, access_token, body), fields(path = %endpoint.path()))]
    pub async fn send(
        &self,
        endpoint: &Endpoint,
        access_token: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let path = endpoint.path();
        let method = endpoint.method();
        let url = self.base_url.join(&path)?;

        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(access_token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport_error)?;

        if status == 200 {
            info!(%method, %path, status, "Owner API request");
        } else {
            warn!(%method, %path, status, "Owner API request");
        }

        Ok(ApiResponse { status, body })
    }
}
