use serde::{Deserialize, Serialize};
use std::fmt;

/// How a code buffer was handed to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Submission {
    /// Still typing; the buffer is offered after every key.
    Partial,
    /// Maximum length reached, auto-submitted.
    Final,
    /// Explicit submit key or input-idle timeout.
    User,
}

impl Submission {
    /// Whether a rejection should be shown and reported.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Submission::Partial)
    }
}

/// A code presented to the lock controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub digits: String,
    pub submission: Submission,
}

impl Attempt {
    pub fn new(digits: impl Into<String>, submission: Submission) -> Self {
        Self {
            digits: digits.into(),
            submission,
        }
    }

    pub fn partial(digits: impl Into<String>) -> Self {
        Self::new(digits, Submission::Partial)
    }

    pub fn submitted(digits: impl Into<String>) -> Self {
        Self::new(digits, Submission::User)
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.submission.is_terminal()
    }
}

/// Where an evaluator-bypassing open request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideSource {
    /// Remote command channel.
    Remote,
    /// Physical override switch.
    Button,
}

impl fmt::Display for OverrideSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OverrideSource::Remote => f.write_str("remote"),
            OverrideSource::Button => f.write_str("button"),
        }
    }
}
