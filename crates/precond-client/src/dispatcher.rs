//! Authenticated request dispatch with the owner API retry policy

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use precond_core::{Command, Delay, PrecondError, Result};

use crate::client::{Endpoint, OwnerApiClient};
use crate::config::RetryConfig;
use crate::tokens::TokenManager;
use crate::types::ApiResponse;

/// Status codes with a dedicated handling rule
mod status {
    pub const OK: u16 = 200;
    pub const UNAUTHORIZED: u16 = 401;
    pub const NOT_FOUND: u16 = 404;
    pub const ASLEEP: u16 = 408;
}

/// Bounds for the 408 retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Consecutive 408 responses after which the call fails
    pub asleep_retry_limit: u32,
    /// Wait before re-issuing a request that got 408
    pub asleep_retry_delay: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for DispatchPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            asleep_retry_limit: config.asleep_retry_limit,
            asleep_retry_delay: config.asleep_retry_delay(),
        }
    }
}

/// Issues single requests and applies the response-code policy:
///
/// | status | action                                                        |
/// |--------|---------------------------------------------------------------|
/// | 408    | wait and re-issue; fail with `WakeTimeout` at the retry limit |
/// | 401    | invalidate, fetch a fresh token once, retry once              |
/// | 404    | `StaleVehicleId` for vehicle-scoped endpoints                 |
/// | 200    | success                                                       |
/// | other  | raw response if partial failure is allowed, else `Command`    |
#[derive(Clone)]
pub struct CommandDispatcher {
    client: OwnerApiClient,
    tokens: Arc<TokenManager>,
    delay: Arc<dyn Delay>,
    policy: DispatchPolicy,
}

impl CommandDispatcher {
    pub fn new(
        client: OwnerApiClient,
        tokens: Arc<TokenManager>,
        delay: Arc<dyn Delay>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            client,
            tokens,
            delay,
            policy,
        }
    }

    /// Issue `endpoint` with the current access token
    pub async fn dispatch(
        &self,
        endpoint: &Endpoint,
        params: Option<&Value>,
        allow_partial_failure: bool,
    ) -> Result<ApiResponse> {
        let mut token = self.tokens.get_access_token().await?;
        let mut asleep_retries = 0u32;
        let mut waited = Duration::ZERO;
        let mut reauthorized = false;

        loop {
            let response = self.client.send(endpoint, &token, params).await?;

            match response.status {
                status::OK => return Ok(response),
                status::ASLEEP => {
                    asleep_retries += 1;
                    if asleep_retries >= self.policy.asleep_retry_limit {
                        warn!(
                            path = %endpoint.path(),
                            attempts = asleep_retries,
                            "Vehicle stayed asleep"
                        );
                        return Err(PrecondError::WakeTimeout {
                            attempts: asleep_retries,
                            elapsed: waited,
                        });
                    }
                    debug!(
                        attempt = asleep_retries,
                        limit = self.policy.asleep_retry_limit,
                        "Vehicle asleep, retrying in {:?}",
                        self.policy.asleep_retry_delay
                    );
                    self.delay.wait(self.policy.asleep_retry_delay).await;
                    waited += self.policy.asleep_retry_delay;
                }
                status::UNAUTHORIZED => {
                    if reauthorized {
                        return Err(PrecondError::Auth);
                    }
                    reauthorized = true;
                    self.tokens.invalidate().await?;
                    token = match self.tokens.get_access_token().await {
                        Ok(token) => token,
                        Err(PrecondError::NoCredential) => return Err(PrecondError::Auth),
                        Err(e) => return Err(e),
                    };
                }
                status::NOT_FOUND if endpoint.vehicle_id().is_some() => {
                    return Err(PrecondError::StaleVehicleId {
                        vehicle_id: endpoint.vehicle_id().unwrap_or_default().to_string(),
                    });
                }
                _ if allow_partial_failure => return Ok(response),
                code => {
                    return Err(PrecondError::command(
                        code,
                        endpoint.path(),
                        response.body,
                    ))
                }
            }
        }
    }

    /// Issue a vehicle command
    pub async fn send_command(&self, vehicle_id: &str, command: &Command) -> Result<ApiResponse> {
        let endpoint = Endpoint::Command {
            vehicle_id: vehicle_id.to_string(),
            verb: command.verb,
        };
        let body = command.body();
        self.dispatch(&endpoint, body.as_ref(), command.allow_partial_failure)
            .await
    }
}
