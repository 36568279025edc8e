use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Code errors
    #[error("Invalid code: {0}")]
    InvalidCode(String),

    #[error("Unknown code kind: {0}")]
    InvalidCodeKind(String),

    #[error("Invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    // Controller errors
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
