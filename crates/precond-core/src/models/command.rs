//! Vehicle command models

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Control commands issued during a preconditioning session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandVerb {
    StartClimate,
    SetTemperature,
    SetSeatHeater,
}

impl CommandVerb {
    /// Path segment under `/command/` on the remote API
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::StartClimate => "auto_conditioning_start",
            Self::SetTemperature => "set_temps",
            Self::SetSeatHeater => "remote_seat_heater_request",
        }
    }
}

impl fmt::Display for CommandVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartClimate => write!(f, "start-climate"),
            Self::SetTemperature => write!(f, "set-temperature"),
            Self::SetSeatHeater => write!(f, "set-seat-heater"),
        }
    }
}

/// A single command, constructed per session and discarded afterwards
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub verb: CommandVerb,
    pub parameters: Map<String, Value>,
    /// Return non-200 responses to the caller instead of failing
    pub allow_partial_failure: bool,
}

impl Command {
    pub fn new(verb: CommandVerb) -> Self {
        Self {
            verb,
            parameters: Map::new(),
            allow_partial_failure: false,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn start_climate() -> Self {
        Self::new(CommandVerb::StartClimate)
    }

    /// Same set point for driver and passenger
    pub fn set_temperature(celsius: f64) -> Self {
        Self::new(CommandVerb::SetTemperature)
            .with_parameter("driver_temp", json!(celsius))
            .with_parameter("passenger_temp", json!(celsius))
    }

    pub fn set_seat_heater(seat: SeatHeaterSetting) -> Self {
        Self::new(CommandVerb::SetSeatHeater)
            .with_parameter("heater", seat.position)
            .with_parameter("level", seat.level)
    }

    /// JSON body, `None` when the command takes no parameters
    pub fn body(&self) -> Option<Value> {
        if self.parameters.is_empty() {
            None
        } else {
            Some(Value::Object(self.parameters.clone()))
        }
    }
}

/// Requested level for one seat heater, addressed by position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatHeaterSetting {
    pub position: u8,
    pub level: u8,
}

/// Outcome of one command, aggregated into the session response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub succeeded: bool,
    pub message: String,
}

impl CommandResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_climate_has_no_body() {
        let command = Command::start_climate();
        assert_eq!(command.verb.path_segment(), "auto_conditioning_start");
        assert!(command.body().is_none());
        assert!(!command.allow_partial_failure);
    }

    #[test]
    fn test_set_temperature_sets_both_zones() {
        let body = Command::set_temperature(21.0).body().unwrap();
        assert_eq!(body["driver_temp"], json!(21.0));
        assert_eq!(body["passenger_temp"], json!(21.0));
    }

    #[test]
    fn test_seat_heater_body() {
        let body = Command::set_seat_heater(SeatHeaterSetting {
            position: 2,
            level: 3,
        })
        .body()
        .unwrap();
        assert_eq!(body, json!({"heater": 2, "level": 3}));
    }
}
