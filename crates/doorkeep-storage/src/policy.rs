//! Access policy decision.
//!
//! [`decide`] is a pure function of a stored record and a point in time.
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. `active` must be present
//! 2. `count`: `0 <= usage < max_usage` and `max_usage >= 1`
//! 3. `duration` (not first use): `now < first_use + validity_hours`
//! 4. `interval`: `valid_from <= now <= expiration`, both bounds inclusive
//! 5. `day`: local hour of `now` within 07..=21
//!
//! Unparseable stored timestamps deny. The declared `days`, `start_time`
//! and `end_time` fields are not consulted; `day` codes get the fixed
//! daytime window regardless of their schedule.

use std::fmt;

use chrono::{DateTime, FixedOffset, TimeDelta, Timelike};
use doorkeep_core::constants::{DAY_WINDOW_END_HOUR, DAY_WINDOW_START_HOUR};
use doorkeep_core::{AccessCode, CodeKind, IsoTimestamp};

/// Why a presented code was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    NotFound,
    Inactive,
    UsageExhausted,
    DurationExpired,
    MalformedFirstUse,
    MalformedInterval,
    OutsideInterval,
    OutsideDayWindow,
    /// The store could not be read or the admission could not be persisted.
    StoreUnavailable,
}

impl DenyReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::NotFound => "not_found",
            DenyReason::Inactive => "inactive",
            DenyReason::UsageExhausted => "usage_exhausted",
            DenyReason::DurationExpired => "duration_expired",
            DenyReason::MalformedFirstUse => "malformed_first_use",
            DenyReason::MalformedInterval => "malformed_interval",
            DenyReason::OutsideInterval => "outside_interval",
            DenyReason::OutsideDayWindow => "outside_day_window",
            DenyReason::StoreUnavailable => "store_unavailable",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the policy checks for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Admit { silent: bool },
    Deny(DenyReason),
}

impl Verdict {
    #[must_use]
    pub fn is_admit(&self) -> bool {
        matches!(self, Verdict::Admit { .. })
    }
}

/// Run the policy checks for `code` at `now`.
#[must_use]
pub fn decide(code: &AccessCode, now: &DateTime<FixedOffset>) -> Verdict {
    if !code.is_active() {
        return Verdict::Deny(DenyReason::Inactive);
    }

    if code.has(CodeKind::Count) && !usage_remaining(code) {
        return Verdict::Deny(DenyReason::UsageExhausted);
    }

    if code.has(CodeKind::Duration) && code.usage > 0 {
        let Ok(first_use) = code.first_use.parse() else {
            return Verdict::Deny(DenyReason::MalformedFirstUse);
        };
        if !within_validity(first_use, code.validity_hours, now) {
            return Verdict::Deny(DenyReason::DurationExpired);
        }
    }

    if code.has(CodeKind::Interval) {
        let (Ok(valid_from), Ok(expiration)) = (code.valid_from.parse(), code.expiration.parse())
        else {
            return Verdict::Deny(DenyReason::MalformedInterval);
        };
        if *now < valid_from || *now > expiration {
            return Verdict::Deny(DenyReason::OutsideInterval);
        }
    }

    if code.has(CodeKind::Day) && !within_day_window(now) {
        return Verdict::Deny(DenyReason::OutsideDayWindow);
    }

    Verdict::Admit {
        silent: code.is_silent(),
    }
}

/// Apply the admission mutation: stamp first use, count the use.
pub fn record_admission(code: &mut AccessCode, now: &DateTime<FixedOffset>) {
    if code.usage == 0 {
        code.first_use = IsoTimestamp::from_datetime(now);
    }
    code.usage = code.usage.saturating_add(1);
}

fn usage_remaining(code: &AccessCode) -> bool {
    code.usage >= 0 && code.max_usage >= 1 && code.usage < code.max_usage
}

fn within_validity(
    first_use: DateTime<FixedOffset>,
    validity_hours: i64,
    now: &DateTime<FixedOffset>,
) -> bool {
    let deadline =
        TimeDelta::try_hours(validity_hours).and_then(|hours| first_use.checked_add_signed(hours));

    match deadline {
        Some(deadline) => *now < deadline,
        // Out of chrono's range: unbounded forwards, long gone backwards
        None => validity_hours > 0,
    }
}

fn within_day_window(now: &DateTime<FixedOffset>) -> bool {
    (DAY_WINDOW_START_HOUR..=DAY_WINDOW_END_HOUR).contains(&now.hour())
}
