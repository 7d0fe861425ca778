//! Request parameter extraction
//!
//! Every parameter can arrive as an `X-Tesla-*` header (matched
//! case-insensitively) or as a query parameter; headers win. Empty values
//! count as absent.

use axum::http::HeaderMap;
use serde::Deserialize;

use precond_client::PreconditionRequest;
use precond_core::{PrecondError, Result};

/// Header carrying a caller-owned access token
pub const ACCESS_TOKEN_HEADER: &str = "x-tesla-access_token";
/// Header carrying the pre-shared deployment token
pub const TOKEN_HEADER: &str = "x-tesla-token";
pub const VIN_HEADER: &str = "x-tesla-vin";
pub const TEMP_HEADER: &str = "x-tesla-temp";
pub const SEATS_HEADER: &str = "x-tesla-seats";

/// Highest accepted seat heater level
const MAX_SEAT_LEVEL: u8 = 3;
/// Seat heater positions addressable by the remote API (0..=8)
const MAX_SEATS: usize = 9;

/// Query-string form of the parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreconditionQuery {
    pub access_token: Option<String>,
    pub token: Option<String>,
    pub vin: Option<String>,
    pub temp: Option<String>,
    pub seats: Option<String>,
}

/// How the caller authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerCredential {
    /// Caller-owned access token, request scoped
    AccessToken(String),
    /// Pre-shared token unlocking the deployment's stored credentials
    SharedSecret(String),
    None,
}

/// Parameters merged from headers and query string
#[derive(Debug, Clone, Default)]
pub struct PreconditionParams {
    pub access_token: Option<String>,
    pub token: Option<String>,
    pub vin: Option<String>,
    pub temp: Option<String>,
    pub seats: Option<String>,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl PreconditionParams {
    pub fn from_parts(headers: &HeaderMap, query: PreconditionQuery) -> Self {
        Self {
            access_token: header(headers, ACCESS_TOKEN_HEADER).or(present(query.access_token)),
            token: header(headers, TOKEN_HEADER).or(present(query.token)),
            vin: header(headers, VIN_HEADER).or(present(query.vin)),
            temp: header(headers, TEMP_HEADER).or(present(query.temp)),
            seats: header(headers, SEATS_HEADER).or(present(query.seats)),
        }
    }

    /// A caller access token takes precedence over the pre-shared token
    pub fn credential(&self) -> CallerCredential {
        match (&self.access_token, &self.token) {
            (Some(token), _) => CallerCredential::AccessToken(token.clone()),
            (None, Some(secret)) => CallerCredential::SharedSecret(secret.clone()),
            (None, None) => CallerCredential::None,
        }
    }

    pub fn to_request(&self) -> Result<PreconditionRequest> {
        let temperature = self
            .temp
            .as_deref()
            .map(parse_temperature)
            .transpose()?;
        let seats = self
            .seats
            .as_deref()
            .map(parse_seats)
            .transpose()?
            .unwrap_or_default();

        Ok(PreconditionRequest {
            vin: self.vin.clone().unwrap_or_default(),
            temperature,
            seats,
        })
    }
}

/// Parse a Celsius set point
pub fn parse_temperature(value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
        .ok_or_else(|| PrecondError::InvalidRequest(format!("Invalid temperature: {}", value)))
}

/// Parse a comma-joined list of seat levels aligned by position.
///
/// `"3,,1"` sets seat 0 to 3, leaves seat 1 alone and sets seat 2 to 1.
pub fn parse_seats(value: &str) -> Result<Vec<Option<u8>>> {
    let slots = value.split(',').count();
    if slots > MAX_SEATS {
        return Err(PrecondError::InvalidRequest(format!(
            "Too many seats: {}",
            slots
        )));
    }
    value
        .split(',')
        .map(str::trim)
        .map(|slot| {
            if slot.is_empty() {
                return Ok(None);
            }
            slot.parse::<u8>()
                .ok()
                .filter(|level| *level <= MAX_SEAT_LEVEL)
                .map(Some)
                .ok_or_else(|| {
                    PrecondError::InvalidRequest(format!("Invalid seat heater level: {}", slot))
                })
        })
        .collect()
}
