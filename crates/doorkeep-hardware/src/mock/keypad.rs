//! Channel-driven keypad.

use tokio::sync::mpsc;

use crate::error::{HardwareError, Result};
use crate::traits::{KeypadDevice, KeypadInput};

/// Simulated keypad fed through a [`MockKeypadHandle`].
///
/// # Examples
///
/// ```
/// use doorkeep_hardware::mock::MockKeypad;
/// use doorkeep_hardware::traits::{KeypadDevice, KeypadInput};
///
/// #[tokio::main]
/// async fn main() -> doorkeep_hardware::Result<()> {
///     let (mut keypad, handle) = MockKeypad::new();
///
///     tokio::spawn(async move {
///         handle.send_pin(&[4, 2]).await.unwrap();
///     });
///
///     assert_eq!(keypad.read_input().await?, KeypadInput::Digit(4));
///     assert_eq!(keypad.read_input().await?, KeypadInput::Digit(2));
///     assert_eq!(keypad.read_input().await?, KeypadInput::Enter);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockKeypad {
    input_rx: mpsc::Receiver<KeypadInput>,
}

impl MockKeypad {
    /// Create a keypad and the handle that presses its keys.
    pub fn new() -> (Self, MockKeypadHandle) {
        let (input_tx, input_rx) = mpsc::channel(32);
        (Self { input_rx }, MockKeypadHandle { input_tx })
    }
}

impl KeypadDevice for MockKeypad {
    async fn read_input(&mut self) -> Result<KeypadInput> {
        self.input_rx
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected("keypad input channel closed"))
    }
}

/// Presses keys on a [`MockKeypad`]. Cloneable across tasks.
#[derive(Debug, Clone)]
pub struct MockKeypadHandle {
    input_tx: mpsc::Sender<KeypadInput>,
}

impl MockKeypadHandle {
    /// # Errors
    ///
    /// Returns an error if the keypad has been dropped.
    pub async fn send_input(&self, input: KeypadInput) -> Result<()> {
        self.input_tx
            .send(input)
            .await
            .map_err(|_| HardwareError::disconnected("keypad input channel closed"))
    }

    /// Press each digit in turn.
    ///
    /// # Errors
    ///
    /// Returns an error if a digit is greater than 9 or the keypad has been
    /// dropped.
    pub async fn send_digits(&self, digits: &[u8]) -> Result<()> {
        for &digit in digits {
            self.send_input(KeypadInput::digit(digit)?).await?;
        }
        Ok(())
    }

    /// Press the digits followed by Enter.
    ///
    /// # Errors
    ///
    /// Same as [`send_digits`](Self::send_digits).
    pub async fn send_pin(&self, digits: &[u8]) -> Result<()> {
        self.send_digits(digits).await?;
        self.send_input(KeypadInput::Enter).await
    }
}
