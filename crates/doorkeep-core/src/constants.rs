//! Constants shared by the door controller crates.
//!
//! Durations are the defaults used when the environment does not override
//! them. Codes are plain digit strings compared in cleartext.

use std::time::Duration;

// ============================================================================
// Codes
// ============================================================================

/// Master code used when no admin code is configured.
pub const DEFAULT_MASTER_CODE: &str = "1234";

/// Name reported for master code entries.
pub const MASTER_NAME: &str = "Master";

/// Name reported for one-time-password entries.
pub const OTP_NAME: &str = "OTP";

/// Keypad auto-submits once this many digits are buffered.
pub const MAX_CODE_LENGTH: usize = 6;

/// Reserved code that forces the ambient light on.
pub const LIGHTS_ON_CODE: &str = "111111";

/// Reserved code that forces the ambient light off.
pub const LIGHTS_OFF_CODE: &str = "111110";

// ============================================================================
// Timing
// ============================================================================

/// How long the latch stays released waiting for the door to open (T_open).
pub const OPEN_WAIT: Duration = Duration::from_secs(60);

/// How long the door may stay open before an alert (T_close).
pub const DOOR_OPEN_WAIT: Duration = Duration::from_secs(60);

/// Reject indicator hold time before returning to idle (T_idle).
pub const RESET_TO_IDLE: Duration = Duration::from_secs(3);

/// Keypad inactivity before a partial buffer is resubmitted as terminal.
pub const CODE_INPUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Door contact poll interval while waiting for confirmation.
pub const SENSOR_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Inbound command channel poll interval.
pub const COMMAND_POLL_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// Policy
// ============================================================================

/// First admitted hour for `day` codes (inclusive).
pub const DAY_WINDOW_START_HOUR: u32 = 7;

/// Last admitted hour for `day` codes (inclusive, so 21:59 is admitted).
pub const DAY_WINDOW_END_HOUR: u32 = 21;

/// Persisted timestamp layout, e.g. `2025-03-01T09:30:00+0100`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";
