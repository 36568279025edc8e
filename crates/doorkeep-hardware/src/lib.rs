//! Door hardware abstraction.
//!
//! - [`KeypadDevice`] produces [`KeypadInput`]; [`keypad::scan_codes`]
//!   turns key presses into [`Attempt`](doorkeep_core::Attempt)s.
//! - [`Actuator`] drives the latch and lock-face indicators.
//! - [`DoorSensor`] reports the door contact.
//!
//! [`mock`] holds channel-driven stand-ins for all three, used by tests and
//! by the simulated bench in the `doorkeep` binary.

pub mod error;
pub mod keypad;
pub mod mock;
pub mod traits;
pub mod types;

pub use error::{HardwareError, Result};
pub use keypad::{CodeBuffer, scan_codes};
pub use traits::{Actuator, DoorSensor, KeypadDevice, KeypadInput};
pub use types::{ActuatorCommand, ContactState};
