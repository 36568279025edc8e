//! Remote command dispatch.
//!
//! Messages on the inbound queue carry one instruction each:
//!
//! ```json
//! {"InsType": "open"}
//! {"InsType": "rescind", "Digits": "246810"}
//! {"InsType": "update", "AccessCode": {"Digits": "246810", "Name": "Cleaner", "Types": ["active", "count"], "MaxUsage": 4}}
//! ```
//!
//! Some integrations wrap the instruction in an envelope whose `Message`
//! field holds the instruction as a JSON string; that form is unwrapped once.

use std::time::Duration;

use doorkeep_core::constants::COMMAND_POLL_INTERVAL;
use doorkeep_core::{AccessCode, OverrideSource};
use doorkeep_storage::{CodeStore, RescindOutcome, StorageError};
use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::controller::LockController;
use crate::error::{ControlError, Result};
use crate::notify::{Notifier, redact_code};
use crate::queue::CommandQueue;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct WireMessage {
    ins_type: Option<String>,
    digits: Option<String>,
    access_code: Option<AccessCode>,
    target: Option<String>,
    message: Option<String>,
}

/// A decoded remote instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Open,
    Rescind { digits: String },
    Update(AccessCode),
    /// Instruction type this controller does not know.
    Unknown(String),
}

impl Instruction {
    /// Decode a message body, unwrapping an envelope if present.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Decode`] for invalid JSON, a rescind without
    /// `Digits` or an update without an `AccessCode`.
    pub fn decode(body: &str) -> Result<Self> {
        let mut wire: WireMessage = serde_json::from_str(body)?;
        if wire.ins_type.is_none()
            && let Some(inner) = wire.message.take()
        {
            debug!(envelope_target = ?wire.target, "unwrapping enveloped instruction");
            wire = serde_json::from_str(&inner)?;
        }
        Self::from_wire(wire)
    }

    fn from_wire(wire: WireMessage) -> Result<Self> {
        let kind = wire.ins_type.unwrap_or_default();
        match kind.as_str() {
            "open" => Ok(Instruction::Open),
            "rescind" => match wire.digits {
                Some(digits) if !digits.is_empty() => Ok(Instruction::Rescind { digits }),
                _ => Err(ControlError::Decode("rescind without Digits".into())),
            },
            "update" => match wire.access_code {
                Some(code) if !code.digits.is_empty() => Ok(Instruction::Update(code)),
                _ => Err(ControlError::Decode("update without AccessCode".into())),
            },
            _ => Ok(Instruction::Unknown(kind)),
        }
    }
}

/// What processing one message did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Override forwarded; `accepted` is false if the door was already unlocked.
    Opened { accepted: bool },
    Rescinded(RescindOutcome),
    Updated { name: String },
    Unknown(String),
    Malformed(String),
    /// The stored record itself is unusable; retrying cannot help.
    Failed(String),
    /// The store was unreachable; the message is left for redelivery.
    StoreFailed(String),
}

impl DispatchOutcome {
    fn from_store_error(error: &StorageError) -> Self {
        if error.is_transient() {
            DispatchOutcome::StoreFailed(error.to_string())
        } else {
            DispatchOutcome::Failed(error.to_string())
        }
    }

    /// Whether the message is finished with and can leave the queue.
    ///
    /// Only transient store failures keep a message for redelivery.
    pub fn should_acknowledge(&self) -> bool {
        !matches!(self, DispatchOutcome::StoreFailed(_))
    }
}

/// Feeds queued instructions into the code book and the lock controller.
pub struct CommandDispatcher<S, Q> {
    controller: LockController<S>,
    queue: Q,
    notifier: Notifier,
    poll_interval: Duration,
}

impl<S: CodeStore + 'static, Q: CommandQueue> CommandDispatcher<S, Q> {
    pub fn new(controller: LockController<S>, queue: Q, notifier: Notifier) -> Self {
        Self {
            controller,
            queue,
            notifier,
            poll_interval: COMMAND_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Decode and execute one message body.
    pub async fn process(&self, body: &str) -> DispatchOutcome {
        match Instruction::decode(body) {
            Ok(instruction) => self.execute(instruction).await,
            Err(e) => {
                error!(error = %e, "dropping malformed instruction");
                DispatchOutcome::Malformed(e.to_string())
            }
        }
    }

    pub async fn execute(&self, instruction: Instruction) -> DispatchOutcome {
        match instruction {
            Instruction::Open => {
                info!("remote open override");
                DispatchOutcome::Opened {
                    accepted: self.controller.override_open(OverrideSource::Remote),
                }
            }
            Instruction::Rescind { digits } => {
                let redacted = redact_code(&digits);
                match self.controller.codebook().rescind(&digits).await {
                    Ok(RescindOutcome::Rescinded) => {
                        self.notifier.rescinded(&digits);
                        DispatchOutcome::Rescinded(RescindOutcome::Rescinded)
                    }
                    Ok(outcome) => {
                        info!(digits = %redacted, ?outcome, "rescind left code unchanged");
                        DispatchOutcome::Rescinded(outcome)
                    }
                    Err(e) => {
                        error!(digits = %redacted, error = %e, "failed to rescind code");
                        DispatchOutcome::from_store_error(&e)
                    }
                }
            }
            Instruction::Update(code) => {
                let redacted = redact_code(&code.digits);
                match self.controller.codebook().update(&code).await {
                    Ok(()) => {
                        self.notifier.updated(&code.name, &code.digits);
                        DispatchOutcome::Updated { name: code.name }
                    }
                    Err(StorageError::Validation(message)) => {
                        error!(digits = %redacted, error = %message, "rejected invalid access code");
                        DispatchOutcome::Malformed(message)
                    }
                    Err(e) => {
                        error!(digits = %redacted, error = %e, "failed to save access code");
                        DispatchOutcome::from_store_error(&e)
                    }
                }
            }
            Instruction::Unknown(kind) => {
                warn!(kind = %kind, "unknown instruction type");
                DispatchOutcome::Unknown(kind)
            }
        }
    }

    /// Process one batch from the queue.
    ///
    /// Returns the number of messages acknowledged.
    ///
    /// # Errors
    ///
    /// Returns the queue's error if receiving fails. Acknowledgement
    /// failures are logged.
    pub async fn poll_once(&self) -> Result<usize> {
        let messages = self.queue.receive().await?;
        let mut acknowledged = 0;

        for message in messages {
            let outcome = self.process(&message.body).await;
            debug!(?outcome, "instruction processed");

            if !outcome.should_acknowledge() {
                warn!(receipt = %message.receipt, "instruction left for redelivery");
                continue;
            }
            match self.queue.acknowledge(&message.receipt).await {
                Ok(()) => acknowledged += 1,
                Err(e) => error!(receipt = %message.receipt, error = %e, "failed to acknowledge"),
            }
        }

        Ok(acknowledged)
    }

    /// Poll at the configured interval until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        warn!(error = %e, "command poll failed");
                    }
                }
            }
        }
        info!("command dispatcher stopped");
    }
}
