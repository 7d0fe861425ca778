//! Wake-and-poll state machine

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use precond_core::{Delay, PrecondError, Result, VehicleState, WakeOutcome, WakeState};

use crate::client::Endpoint;
use crate::config::RetryConfig;
use crate::dispatcher::CommandDispatcher;
use crate::types::{ApiResponse, VehicleStatus};

/// Bounds for the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakePolicy {
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    pub settle_delay: Duration,
}

impl Default for WakePolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for WakePolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            poll_attempts: config.wake_poll_attempts,
            poll_interval: config.wake_poll_interval(),
            settle_delay: config.settle_delay(),
        }
    }
}

/// State reported in a wake or state response; anything unreadable is `Unknown`
fn reported_state(response: &ApiResponse) -> VehicleState {
    if !response.is_success() {
        return VehicleState::Unknown;
    }
    response
        .payload::<VehicleStatus>()
        .map(|status| status.state)
        .unwrap_or_default()
}

fn advance(state: &mut WakeState, next: WakeState) {
    debug!(from = %state, to = %next, "Wake state transition");
    *state = next;
}

/// Drives a vehicle to `online`
#[derive(Clone)]
pub struct WakeOrchestrator {
    delay: Arc<dyn Delay>,
    policy: WakePolicy,
}

impl WakeOrchestrator {
    pub fn new(delay: Arc<dyn Delay>, policy: WakePolicy) -> Self {
        Self { delay, policy }
    }

    /// Send a wake request and poll until the vehicle reports online
    #[instrument(skip(self, dispatcher))]
    pub async fn wake(
        &self,
        dispatcher: &CommandDispatcher,
        vehicle_id: &str,
    ) -> Result<WakeOutcome> {
        let mut state = WakeState::Unknown;

        let response = dispatcher
            .dispatch(
                &Endpoint::WakeUp {
                    vehicle_id: vehicle_id.to_string(),
                },
                None,
                false,
            )
            .await?;
        advance(&mut state, WakeState::WokenRequested);

        if reported_state(&response).is_online() {
            advance(&mut state, WakeState::Online);
            info!("Vehicle online after wake request");
            return Ok(WakeOutcome { state, polls: 0 });
        }

        advance(&mut state, WakeState::Polling);
        let endpoint = Endpoint::VehicleState {
            vehicle_id: vehicle_id.to_string(),
        };

        let mut polls = 0u32;
        let mut waited = Duration::ZERO;
        while polls < self.policy.poll_attempts {
            if polls > 0 {
                self.delay.wait(self.policy.poll_interval).await;
                waited += self.policy.poll_interval;
            }
            polls += 1;

            let response = dispatcher.dispatch(&endpoint, None, true).await?;
            let reported = reported_state(&response);
            debug!(poll = polls, state = %reported, "Polled vehicle state");

            if reported.is_online() {
                self.delay.wait(self.policy.settle_delay).await;
                advance(&mut state, WakeState::Online);
                info!(polls, "Vehicle online");
                return Ok(WakeOutcome { state, polls });
            }
        }

        advance(&mut state, WakeState::TimedOut);
        warn!(polls, "Vehicle did not come online");
        Err(PrecondError::WakeTimeout {
            attempts: polls,
            elapsed: waited,
        })
    }
}
