use crate::{Result, constants::TIMESTAMP_FORMAT, error::Error};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use subtle::ConstantTimeEq;

/// Policy tag attached to an access code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeKind {
    /// Code may admit at all. Without it every other tag is moot.
    Active,
    /// Valid for `validity_hours` after first use.
    Duration,
    /// Valid between `valid_from` and `expiration`.
    Interval,
    /// Valid for `max_usage` admissions.
    Count,
    /// Valid only during the daytime window.
    Day,
    /// Admissions do not notify operators.
    Silent,
}

impl CodeKind {
    /// All kinds, in evaluation order.
    pub const ALL: [CodeKind; 6] = [
        CodeKind::Active,
        CodeKind::Duration,
        CodeKind::Interval,
        CodeKind::Count,
        CodeKind::Day,
        CodeKind::Silent,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeKind::Active => "active",
            CodeKind::Duration => "duration",
            CodeKind::Interval => "interval",
            CodeKind::Count => "count",
            CodeKind::Day => "day",
            CodeKind::Silent => "silent",
        }
    }
}

impl fmt::Display for CodeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CodeKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CodeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidCodeKind(s.to_string()))
    }
}

/// Set of policy tags. Ordered so encodings are stable.
pub type CodeKinds = BTreeSet<CodeKind>;

/// Timestamp exactly as it was stored.
///
/// Stored values are kept verbatim, including the empty string for "never"
/// and malformed text; parsing happens only when a policy needs the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IsoTimestamp(String);

impl IsoTimestamp {
    /// Wrap a raw stored value without validating it.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Format a point in time using the persisted layout.
    #[must_use]
    pub fn from_datetime(at: &DateTime<FixedOffset>) -> Self {
        Self(at.format(TIMESTAMP_FORMAT).to_string())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the stored value. RFC 3339 is accepted as well.
    ///
    /// # Errors
    /// Returns `Error::InvalidTimestamp` for empty or malformed values.
    pub fn parse(&self) -> Result<DateTime<FixedOffset>> {
        DateTime::parse_from_str(&self.0, TIMESTAMP_FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(&self.0))
            .map_err(|e| Error::InvalidTimestamp {
                value: self.0.clone(),
                reason: e.to_string(),
            })
    }
}

impl fmt::Display for IsoTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One stored access code and its policy state.
///
/// Field names on the wire are PascalCase to match the remote command
/// format (`Digits`, `Types`, `ValidityHours`, ...). Missing fields and
/// `null` collections decode to their zero values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AccessCode {
    /// Code value and store key.
    pub digits: String,

    /// Display label for notifications.
    pub name: String,

    #[serde(rename = "Types", deserialize_with = "null_as_default")]
    pub kinds: CodeKinds,

    /// Hours of validity after first use (`duration` codes).
    pub validity_hours: i64,

    /// Stamped on first admission; empty until then.
    #[serde(deserialize_with = "null_as_default")]
    pub first_use: IsoTimestamp,

    #[serde(deserialize_with = "null_as_default")]
    pub valid_from: IsoTimestamp,

    #[serde(deserialize_with = "null_as_default")]
    pub expiration: IsoTimestamp,

    pub max_usage: i64,

    pub usage: i64,

    /// Declared schedule. Not consulted by the evaluator.
    #[serde(deserialize_with = "null_as_default")]
    pub days: Vec<String>,

    #[serde(deserialize_with = "null_as_default")]
    pub start_time: String,

    #[serde(deserialize_with = "null_as_default")]
    pub end_time: String,
}

impl AccessCode {
    /// Create an empty record for `digits` with no tags.
    pub fn new(digits: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            digits: digits.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style tag assignment.
    #[must_use]
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = CodeKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    #[must_use]
    pub fn has(&self, kind: CodeKind) -> bool {
        self.kinds.contains(&kind)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.has(CodeKind::Active)
    }

    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.has(CodeKind::Silent)
    }

    /// Drop the `active` tag. Returns whether anything changed.
    pub fn deactivate(&mut self) -> bool {
        self.kinds.remove(&CodeKind::Active)
    }

    /// Check the record is storable: digits must be a non-empty run of ASCII digits.
    ///
    /// # Errors
    /// Returns `Error::InvalidCode` describing the problem.
    pub fn validate(&self) -> Result<()> {
        if self.digits.is_empty() {
            return Err(Error::InvalidCode("digits must not be empty".to_string()));
        }
        if !self.digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidCode(format!(
                "digits must be numeric, got {} characters",
                self.digits.len()
            )));
        }
        Ok(())
    }
}

/// Constant-time equality for presented codes.
///
/// Length is not hidden; content is.
#[must_use]
pub fn codes_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
