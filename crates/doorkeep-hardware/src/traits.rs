//! Hardware device trait definitions.
//!
//! The keypad is read asynchronously and returns `Send` futures so scanning
//! can run on its own task. Latch, indicators and the door contact are
//! driven through plain synchronous calls: each is a GPIO write or read
//! that completes immediately, and the controller calls them while holding
//! its own lock.

use std::future::Future;

use crate::error::{HardwareError, Result};
use crate::types::ContactState;

/// Input from a keypad device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum KeypadInput {
    /// Numeric digit (0-9).
    Digit(u8),

    /// Star key (*).
    Star,

    /// Hash/pound key (#).
    Hash,

    /// Enter/confirm key.
    Enter,

    /// Cancel operation key.
    Cancel,

    /// Clear input key.
    Clear,
}

impl KeypadInput {
    /// Create a digit input.
    ///
    /// # Errors
    ///
    /// Returns an error if the digit is greater than 9.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorkeep_hardware::traits::KeypadInput;
    ///
    /// let input = KeypadInput::digit(5).unwrap();
    /// assert_eq!(input.as_digit(), Some(5));
    ///
    /// assert!(KeypadInput::digit(10).is_err());
    /// ```
    pub fn digit(d: u8) -> Result<Self> {
        if d > 9 {
            return Err(HardwareError::invalid_data(format!(
                "Digit must be 0-9, got {}",
                d
            )));
        }
        Ok(Self::Digit(d))
    }

    /// Map a key legend to an input: digits, `#` submits, `*` clears.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0'..='9' => c.to_digit(10).and_then(|d| u8::try_from(d).ok()).map(Self::Digit),
            '#' => Some(Self::Hash),
            '*' => Some(Self::Star),
            _ => None,
        }
    }

    /// Check if this input is a digit.
    pub fn is_digit(&self) -> bool {
        matches!(self, Self::Digit(_))
    }

    /// Get the digit value if this is a digit input.
    pub fn as_digit(&self) -> Option<u8> {
        match self {
            Self::Digit(d) => Some(*d),
            _ => None,
        }
    }
}

/// Keypad device abstraction.
pub trait KeypadDevice: Send {
    /// Wait for the next key press.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is disconnected or a communication
    /// error occurs.
    fn read_input(&mut self) -> impl Future<Output = Result<KeypadInput>> + Send;
}

/// Latch and lock-face indicators.
///
/// `unlock` and `lock` move the latch; the remaining calls only change
/// indicators.
pub trait Actuator: Send + Sync {
    /// Release the latch and show the granted indicator.
    fn unlock(&self) -> Result<()>;

    /// Engage the latch and show the idle indicator.
    fn lock(&self) -> Result<()>;

    /// Show the rejected indicator.
    fn reject(&self) -> Result<()>;

    /// Show the processing indicator while a code is being entered.
    fn wait(&self) -> Result<()>;

    /// Switch the ambient (night) light.
    fn set_ambient_light(&self, on: bool) -> Result<()>;
}

/// Door contact sensor.
pub trait DoorSensor: Send + Sync {
    fn contact_state(&self) -> Result<ContactState>;
}
