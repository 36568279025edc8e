//! Values exchanged with door hardware.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Door contact reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactState {
    Open,
    Closed,
}

impl fmt::Display for ContactState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactState::Open => f.write_str("open"),
            ContactState::Closed => f.write_str("closed"),
        }
    }
}

/// One call made on an [`Actuator`](crate::traits::Actuator).
///
/// Recorded by the mock actuator so tests can assert on the exact sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorCommand {
    Unlock,
    Lock,
    Reject,
    Wait,
    AmbientLight(bool),
}

impl ActuatorCommand {
    /// Whether the command moves the physical latch.
    #[must_use]
    pub fn moves_latch(&self) -> bool {
        matches!(self, ActuatorCommand::Unlock | ActuatorCommand::Lock)
    }
}
