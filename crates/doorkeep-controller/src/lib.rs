//! Door lock control.
//!
//! - [`LockController`] runs the lock cycle: it evaluates attempts through a
//!   [`CodeBook`](doorkeep_storage::CodeBook), drives the
//!   [`Actuator`](doorkeep_hardware::Actuator) and watches the door contact
//!   with a single armed wait.
//! - [`CommandDispatcher`] applies remote open, rescind and update
//!   instructions read from a [`CommandQueue`].
//! - [`Notifier`] and [`NotificationWorker`] carry operator notifications
//!   off the control path.

pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod notify;
pub mod otp;
pub mod queue;
pub mod state_machine;

pub use controller::{
    AttemptOutcome, ControllerConfig, ControllerEvent, DoorHardware, LockController,
    LockControllerBuilder, WaitKind,
};
pub use dispatcher::{CommandDispatcher, DispatchOutcome, Instruction};
pub use error::{ControlError, Result};
pub use notify::{LogSink, Notification, NotificationSink, NotificationWorker, Notifier};
pub use otp::{DisabledOtp, OtpValidator};
pub use queue::{CommandQueue, MemoryQueue, QueueMessage, SpoolQueue};
pub use state_machine::{DoorState, StateMachine, StateTransition};
