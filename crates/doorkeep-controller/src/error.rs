//! Error types for the controller crate.

use doorkeep_storage::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ControlError>;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Malformed instruction: {0}")]
    Decode(String),

    #[error("Command queue error: {0}")]
    Queue(String),

    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] doorkeep_core::Error),
}

impl From<serde_json::Error> for ControlError {
    fn from(err: serde_json::Error) -> Self {
        ControlError::Decode(err.to_string())
    }
}
