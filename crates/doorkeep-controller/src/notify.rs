//! Operator notifications.
//!
//! The controller and dispatcher push [`Notification`]s through a
//! [`Notifier`], which never blocks. A [`NotificationWorker`] drains the
//! channel into a [`NotificationSink`] on its own task; delivery failures
//! end there as log lines.

use std::fmt;
use std::future::Future;

use doorkeep_core::OverrideSource;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Mask a code for messages and logs.
///
/// Codes shorter than five characters are fully masked. Five-character
/// codes keep their first character; longer ones keep the first and last.
///
/// ```
/// use doorkeep_controller::notify::redact_code;
///
/// assert_eq!(redact_code("1234"), "****");
/// assert_eq!(redact_code("12345"), "1****");
/// assert_eq!(redact_code("123456"), "1****6");
/// ```
pub fn redact_code(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    match chars.len() {
        0..=4 => "****".to_string(),
        5 => format!("{}****", chars[0]),
        n => {
            let mut redacted = String::with_capacity(n);
            redacted.push(chars[0]);
            redacted.extend(std::iter::repeat_n('*', n - 2));
            redacted.push(chars[n - 1]);
            redacted
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Opened { digits: String, name: String },
    InvalidCode { digits: String },
    Override { source: OverrideSource },
    DoorNotClosed,
    DoorNotOpened,
    Rescinded { digits: String },
    Updated { name: String, digits: String },
}

impl Notification {
    /// Operator-facing text. Codes are redacted.
    pub fn message(&self) -> String {
        match self {
            Notification::Opened { digits, name } => {
                format!("Door opened with code {} [{}]", redact_code(digits), name)
            }
            Notification::InvalidCode { digits } => {
                format!("Invalid code entered {}", redact_code(digits))
            }
            Notification::Override { source } => format!("Door opened with override {source}"),
            Notification::DoorNotClosed => "Door not closed".to_string(),
            Notification::DoorNotOpened => "Door wasn't opened".to_string(),
            Notification::Rescinded { digits } => {
                format!("Code rescinded: {}", redact_code(digits))
            }
            Notification::Updated { name, digits } => {
                format!("Code updated: {} [{}]", name, redact_code(digits))
            }
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Non-blocking handle for queueing notifications.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Create a notifier and the receiving end for a [`NotificationWorker`].
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            debug!("notification worker gone, dropping notification");
        }
    }

    /// Queue an "opened" notification unless the code is silent.
    pub fn opened(&self, digits: &str, name: &str, silent: bool) {
        if silent {
            debug!(digits = %redact_code(digits), "notification silenced");
            return;
        }
        self.send(Notification::Opened {
            digits: digits.to_string(),
            name: name.to_string(),
        });
    }

    pub fn invalid_code(&self, digits: &str) {
        self.send(Notification::InvalidCode {
            digits: digits.to_string(),
        });
    }

    pub fn override_open(&self, source: OverrideSource) {
        self.send(Notification::Override { source });
    }

    pub fn door_not_closed(&self) {
        self.send(Notification::DoorNotClosed);
    }

    pub fn door_not_opened(&self) {
        self.send(Notification::DoorNotOpened);
    }

    pub fn rescinded(&self, digits: &str) {
        self.send(Notification::Rescinded {
            digits: digits.to_string(),
        });
    }

    pub fn updated(&self, name: &str, digits: &str) {
        self.send(Notification::Updated {
            name: name.to_string(),
            digits: digits.to_string(),
        });
    }
}

/// Outbound notification transport.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &Notification) -> impl Future<Output = Result<()>> + Send;
}

/// Sink that writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        info!(message = %notification, "notification");
        Ok(())
    }
}

/// Drains queued notifications into a sink.
pub struct NotificationWorker<K> {
    rx: mpsc::UnboundedReceiver<Notification>,
    sink: K,
}

impl<K: NotificationSink> NotificationWorker<K> {
    pub fn new(rx: mpsc::UnboundedReceiver<Notification>, sink: K) -> Self {
        Self { rx, sink }
    }

    /// Deliver notifications until every [`Notifier`] is dropped.
    pub async fn run(mut self) {
        while let Some(notification) = self.rx.recv().await {
            if let Err(e) = self.sink.deliver(&notification).await {
                warn!(error = %e, message = %notification, "notification delivery failed");
            }
        }
        debug!("notification worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControlError;
    use rstest::rstest;
    use std::sync::{Arc, Mutex};

    #[rstest]
    #[case("", "****")]
    #[case("1", "****")]
    #[case("1234", "****")]
    #[case("12345", "1****")]
    #[case("123456", "1****6")]
    #[case("1234567890", "1********0")]
    fn test_redact_code(#[case] code: &str, #[case] expected: &str) {
        assert_eq!(redact_code(code), expected);
    }

    #[rstest]
    #[case(
        Notification::Opened { digits: "246810".into(), name: "Cleaner".into() },
        "Door opened with code 2****0 [Cleaner]"
    )]
    #[case(Notification::InvalidCode { digits: "99".into() }, "Invalid code entered ****")]
    #[case(
        Notification::Override { source: OverrideSource::Remote },
        "Door opened with override remote"
    )]
    #[case(Notification::DoorNotClosed, "Door not closed")]
    #[case(Notification::DoorNotOpened, "Door wasn't opened")]
    #[case(Notification::Rescinded { digits: "13579".into() }, "Code rescinded: 1****")]
    #[case(
        Notification::Updated { name: "Guest".into(), digits: "123456".into() },
        "Code updated: Guest [1****6]"
    )]
    fn test_messages(#[case] notification: Notification, #[case] expected: &str) {
        assert_eq!(notification.message(), expected);
    }

    #[test]
    fn test_silent_opened_is_not_queued() {
        let (notifier, mut rx) = Notifier::new();

        notifier.opened("5555", "Owner", true);
        notifier.door_not_opened();

        assert_eq!(rx.try_recv().unwrap(), Notification::DoorNotOpened);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_after_worker_gone_is_harmless() {
        let (notifier, rx) = Notifier::new();
        drop(rx);
        notifier.door_not_closed();
    }

    #[derive(Clone, Default)]
    struct FlakySink {
        delivered: Arc<Mutex<Vec<Notification>>>,
    }

    impl NotificationSink for FlakySink {
        async fn deliver(&self, notification: &Notification) -> Result<()> {
            if matches!(notification, Notification::DoorNotClosed) {
                return Err(ControlError::Delivery("gateway timeout".into()));
            }
            self.delivered.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_worker_continues_after_failure() {
        let (notifier, rx) = Notifier::new();
        let sink = FlakySink::default();
        let delivered = sink.delivered.clone();

        notifier.door_not_closed();
        notifier.rescinded("123456");
        drop(notifier);

        NotificationWorker::new(rx, sink).run().await;

        assert_eq!(
            *delivered.lock().unwrap(),
            vec![Notification::Rescinded {
                digits: "123456".into()
            }]
        );
    }
}
