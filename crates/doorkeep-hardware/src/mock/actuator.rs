//! Recording actuator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::{HardwareError, Result};
use crate::traits::Actuator;
use crate::types::ActuatorCommand;

/// Actuator that records every call instead of driving GPIO.
///
/// Clones share the same log, so a test can keep one clone and hand the
/// other to the controller.
#[derive(Debug, Clone, Default)]
pub struct MockActuator {
    commands: Arc<Mutex<Vec<ActuatorCommand>>>,
    failing: Arc<AtomicBool>,
}

impl MockActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent calls fail with a communication error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Commands received so far, oldest first.
    pub fn commands(&self) -> Vec<ActuatorCommand> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent latch movement, if any.
    pub fn last_latch(&self) -> Option<ActuatorCommand> {
        self.commands().into_iter().rev().find(ActuatorCommand::moves_latch)
    }

    pub fn clear(&self) {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, command: ActuatorCommand) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HardwareError::communication(format!(
                "mock actuator refused {command:?}"
            )));
        }
        debug!(?command, "actuator");
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
        Ok(())
    }
}

impl Actuator for MockActuator {
    fn unlock(&self) -> Result<()> {
        self.record(ActuatorCommand::Unlock)
    }

    fn lock(&self) -> Result<()> {
        self.record(ActuatorCommand::Lock)
    }

    fn reject(&self) -> Result<()> {
        self.record(ActuatorCommand::Reject)
    }

    fn wait(&self) -> Result<()> {
        self.record(ActuatorCommand::Wait)
    }

    fn set_ambient_light(&self, on: bool) -> Result<()> {
        self.record(ActuatorCommand::AmbientLight(on))
    }
}
