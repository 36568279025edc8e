//! One-time password port.
//!
//! Secret handling and code derivation live outside this crate; the
//! controller only asks whether a terminal code is currently valid.

use chrono::{DateTime, FixedOffset};

pub trait OtpValidator: Send + Sync {
    fn validate(&self, digits: &str, now: DateTime<FixedOffset>) -> bool;
}

/// Validator for installations without one-time passwords.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledOtp;

impl OtpValidator for DisabledOtp {
    fn validate(&self, _digits: &str, _now: DateTime<FixedOffset>) -> bool {
        false
    }
}
