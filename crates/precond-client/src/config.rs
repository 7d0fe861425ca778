//! Remote API and retry configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the owner API and its token endpoint live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Owner API base URL; requests go to `<base_url>/api/1/...`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// OAuth token endpoint used for refresh and password grants
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// OAuth client id sent with every grant
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Request timeout in milliseconds (default: 30s)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Connect timeout in milliseconds (default: 10s)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_url: default_token_url(),
            client_id: default_client_id(),
            request_timeout_ms: default_request_timeout(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_base_url() -> String {
    "https://owner-api.teslamotors.com".to_string()
}

fn default_token_url() -> String {
    "https://auth.tesla.com/oauth2/v3/token".to_string()
}

fn default_client_id() -> String {
    "ownerapi".to_string()
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_connect_timeout() -> u64 {
    10_000
}

/// Bounds for every retry and poll loop.
///
/// All timeouts are expressed as attempt count times a fixed delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Consecutive 408 responses tolerated before giving up (default: 60)
    #[serde(default = "default_asleep_retry_limit")]
    pub asleep_retry_limit: u32,

    /// Delay between 408 retries in milliseconds (default: 1s)
    #[serde(default = "default_asleep_retry_delay")]
    pub asleep_retry_delay_ms: u64,

    /// State polls after a wake request before timing out (default: 30)
    #[serde(default = "default_wake_poll_attempts")]
    pub wake_poll_attempts: u32,

    /// Delay between state polls in milliseconds (default: 2s)
    #[serde(default = "default_wake_poll_interval")]
    pub wake_poll_interval_ms: u64,

    /// Wait after the vehicle first reports online in milliseconds (default: 2s)
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            asleep_retry_limit: default_asleep_retry_limit(),
            asleep_retry_delay_ms: default_asleep_retry_delay(),
            wake_poll_attempts: default_wake_poll_attempts(),
            wake_poll_interval_ms: default_wake_poll_interval(),
            settle_delay_ms: default_settle_delay(),
        }
    }
}

impl RetryConfig {
    pub fn asleep_retry_delay(&self) -> Duration {
        Duration::from_millis(self.asleep_retry_delay_ms)
    }

    pub fn wake_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wake_poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn default_asleep_retry_limit() -> u32 {
    60
}

fn default_asleep_retry_delay() -> u64 {
    1_000
}

fn default_wake_poll_attempts() -> u32 {
    30
}

fn default_wake_poll_interval() -> u64 {
    2_000
}

fn default_settle_delay() -> u64 {
    2_000
}
