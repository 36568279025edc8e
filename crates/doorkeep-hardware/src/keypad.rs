//! Turning key presses into code attempts.
//!
//! Every digit offers the buffer so far as a partial attempt, which lets
//! the controller show the processing indicator and recognise short codes
//! early. The buffer is submitted as terminal when the maximum length is
//! reached ([`Submission::Final`]), on the submit key, or when the keypad
//! goes quiet for the input-idle timeout ([`Submission::User`]).

use std::time::Duration;

use doorkeep_core::{Attempt, Submission};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{HardwareError, Result};
use crate::traits::{KeypadDevice, KeypadInput};

/// Digit buffer for one code entry.
#[derive(Debug, Clone)]
pub struct CodeBuffer {
    digits: String,
    max_len: usize,
}

impl CodeBuffer {
    pub fn new(max_len: usize) -> Self {
        Self {
            digits: String::with_capacity(max_len),
            max_len: max_len.max(1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    /// Feed one key press. Returns the attempt it produces, if any.
    pub fn push(&mut self, input: KeypadInput) -> Option<Attempt> {
        match input {
            KeypadInput::Digit(d) => {
                let Some(c) = char::from_digit(u32::from(d), 10) else {
                    warn!(digit = d, "ignoring out-of-range digit");
                    return None;
                };
                self.digits.push(c);
                if self.digits.len() >= self.max_len {
                    Some(Attempt::new(self.take(), Submission::Final))
                } else {
                    Some(Attempt::partial(self.digits.clone()))
                }
            }
            KeypadInput::Enter | KeypadInput::Hash => {
                (!self.is_empty()).then(|| Attempt::submitted(self.take()))
            }
            KeypadInput::Clear | KeypadInput::Cancel | KeypadInput::Star => {
                self.digits.clear();
                None
            }
        }
    }

    /// Input-idle timeout: resubmit whatever is buffered as terminal.
    pub fn expire(&mut self) -> Option<Attempt> {
        (!self.is_empty()).then(|| Attempt::submitted(self.take()))
    }

    fn take(&mut self) -> String {
        std::mem::take(&mut self.digits)
    }
}

/// Read `keypad` until it disconnects, forwarding attempts to `attempts`.
///
/// # Errors
///
/// Returns the keypad's error when it fails or disconnects, and
/// [`HardwareError::Disconnected`] when the receiving side is dropped.
pub async fn scan_codes<K: KeypadDevice>(
    keypad: &mut K,
    max_len: usize,
    idle_timeout: Duration,
    attempts: mpsc::Sender<Attempt>,
) -> Result<()> {
    let mut buffer = CodeBuffer::new(max_len);

    loop {
        let input = if buffer.is_empty() {
            keypad.read_input().await?
        } else {
            match tokio::time::timeout(idle_timeout, keypad.read_input()).await {
                Ok(input) => input?,
                Err(_) => {
                    if let Some(attempt) = buffer.expire() {
                        debug!(len = attempt.digits.len(), "keypad idle, submitting buffer");
                        forward(&attempts, attempt).await?;
                    }
                    continue;
                }
            }
        };

        if let Some(attempt) = buffer.push(input) {
            forward(&attempts, attempt).await?;
        }
    }
}

async fn forward(attempts: &mpsc::Sender<Attempt>, attempt: Attempt) -> Result<()> {
    attempts
        .send(attempt)
        .await
        .map_err(|_| HardwareError::disconnected("attempt channel closed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockKeypad;

    fn digits(buffer: &mut CodeBuffer, keys: &[u8]) -> Vec<Attempt> {
        keys.iter()
            .filter_map(|&d| buffer.push(KeypadInput::Digit(d)))
            .collect()
    }

    #[test]
    fn test_each_digit_is_partial() {
        let mut buffer = CodeBuffer::new(6);
        let attempts = digits(&mut buffer, &[1, 2, 3]);

        assert_eq!(
            attempts,
            vec![
                Attempt::partial("1"),
                Attempt::partial("12"),
                Attempt::partial("123"),
            ]
        );
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_max_length_is_final() {
        let mut buffer = CodeBuffer::new(4);
        let attempts = digits(&mut buffer, &[9, 8, 7, 6]);

        assert_eq!(
            attempts.last(),
            Some(&Attempt::new("9876", Submission::Final))
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_enter_submits() {
        let mut buffer = CodeBuffer::new(6);
        digits(&mut buffer, &[4, 2]);

        assert_eq!(
            buffer.push(KeypadInput::Enter),
            Some(Attempt::submitted("42"))
        );
        assert!(buffer.is_empty());
        assert_eq!(buffer.push(KeypadInput::Hash), None);
    }

    #[test]
    fn test_clear_discards() {
        let mut buffer = CodeBuffer::new(6);
        digits(&mut buffer, &[4, 2]);

        assert_eq!(buffer.push(KeypadInput::Star), None);
        assert!(buffer.is_empty());
        assert_eq!(buffer.expire(), None);
    }

    #[test]
    fn test_out_of_range_digit_ignored() {
        let mut buffer = CodeBuffer::new(6);
        assert_eq!(buffer.push(KeypadInput::Digit(12)), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_expire_submits_partial_buffer() {
        let mut buffer = CodeBuffer::new(6);
        digits(&mut buffer, &[5, 5]);

        assert_eq!(buffer.expire(), Some(Attempt::submitted("55")));
        assert!(buffer.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_codes_submits_on_idle() {
        let (mut keypad, handle) = MockKeypad::new();
        let (tx, mut rx) = mpsc::channel(16);

        let scanner = tokio::spawn(async move {
            scan_codes(&mut keypad, 6, Duration::from_secs(5), tx).await
        });

        handle.send_digits(&[3, 1]).await.unwrap();
        assert_eq!(rx.recv().await, Some(Attempt::partial("3")));
        assert_eq!(rx.recv().await, Some(Attempt::partial("31")));

        // Nothing else is pressed; the paused clock jumps to the idle deadline
        assert_eq!(rx.recv().await, Some(Attempt::submitted("31")));

        drop(handle);
        let result = scanner.await.unwrap();
        assert!(matches!(result, Err(HardwareError::Disconnected { .. })));
    }

    #[tokio::test]
    async fn test_scan_codes_final_on_length() {
        let (mut keypad, handle) = MockKeypad::new();
        let (tx, mut rx) = mpsc::channel(16);

        tokio::spawn(async move {
            let _ = scan_codes(&mut keypad, 3, Duration::from_secs(5), tx).await;
        });

        handle.send_digits(&[7, 7, 7]).await.unwrap();
        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(Attempt::new("777", Submission::Final))
        );
    }
}
