use doorkeep_core::{AccessCode, CodeKinds, IsoTimestamp};

use crate::error::{StorageError, StorageResult};

/// Row layout of the `access_codes` table.
///
/// Sets are stored as JSON arrays and timestamps as their raw text, so a
/// record read back is identical to the one written, zero values included.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AccessCodeRow {
    pub digits: String,
    pub name: String,
    pub kinds: String,
    pub validity_hours: i64,
    pub first_use: String,
    pub valid_from: String,
    pub expiration: String,
    pub max_usage: i64,
    pub usage: i64,
    pub days: String,
    pub start_time: String,
    pub end_time: String,
}

impl AccessCodeRow {
    /// Encode a record for writing.
    pub fn encode(code: &AccessCode) -> StorageResult<Self> {
        let kinds = serde_json::to_string(&code.kinds).map_err(|e| StorageError::Encode {
            field: "kinds",
            message: e.to_string(),
        })?;
        let days = serde_json::to_string(&code.days).map_err(|e| StorageError::Encode {
            field: "days",
            message: e.to_string(),
        })?;

        Ok(Self {
            digits: code.digits.clone(),
            name: code.name.clone(),
            kinds,
            validity_hours: code.validity_hours,
            first_use: code.first_use.as_str().to_string(),
            valid_from: code.valid_from.as_str().to_string(),
            expiration: code.expiration.as_str().to_string(),
            max_usage: code.max_usage,
            usage: code.usage,
            days,
            start_time: code.start_time.clone(),
            end_time: code.end_time.clone(),
        })
    }
}

impl TryFrom<AccessCodeRow> for AccessCode {
    type Error = StorageError;

    fn try_from(row: AccessCodeRow) -> StorageResult<Self> {
        let kinds: CodeKinds =
            serde_json::from_str(&row.kinds).map_err(|e| StorageError::Decode {
                field: "kinds",
                message: e.to_string(),
            })?;
        let days: Vec<String> =
            serde_json::from_str(&row.days).map_err(|e| StorageError::Decode {
                field: "days",
                message: e.to_string(),
            })?;

        Ok(AccessCode {
            digits: row.digits,
            name: row.name,
            kinds,
            validity_hours: row.validity_hours,
            first_use: IsoTimestamp::new(row.first_use),
            valid_from: IsoTimestamp::new(row.valid_from),
            expiration: IsoTimestamp::new(row.expiration),
            max_usage: row.max_usage,
            usage: row.usage,
            days,
            start_time: row.start_time,
            end_time: row.end_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorkeep_core::CodeKind;

    #[test]
    fn test_encode_empty_sets() {
        let row = AccessCodeRow::encode(&AccessCode::new("12", "")).unwrap();
        assert_eq!(row.kinds, "[]");
        assert_eq!(row.days, "[]");
        assert_eq!(row.first_use, "");
    }

    #[test]
    fn test_encode_kinds_in_stable_order() {
        let code = AccessCode::new("12", "x").with_kinds([
            CodeKind::Silent,
            CodeKind::Count,
            CodeKind::Active,
        ]);
        let row = AccessCodeRow::encode(&code).unwrap();
        assert_eq!(row.kinds, r#"["active","count","silent"]"#);
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        let mut row = AccessCodeRow::encode(&AccessCode::new("12", "x")).unwrap();
        row.kinds = r#"["active","weekly"]"#.to_string();

        let result = AccessCode::try_from(row);
        assert!(matches!(
            result,
            Err(StorageError::Decode { field: "kinds", .. })
        ));
    }

    #[test]
    fn test_malformed_timestamp_survives() {
        let mut code = AccessCode::new("12", "x");
        code.first_use = IsoTimestamp::new("not a time");

        let row = AccessCodeRow::encode(&code).unwrap();
        let decoded = AccessCode::try_from(row).unwrap();
        assert_eq!(decoded, code);
    }
}
