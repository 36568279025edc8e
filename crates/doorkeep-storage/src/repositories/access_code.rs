use std::future::Future;

use crate::error::{StorageError, StorageResult};
use crate::models::AccessCodeRow;
use doorkeep_core::AccessCode;
use sqlx::SqlitePool;

/// Durable mapping from code digits to access code records.
///
/// Keyed exclusively by `digits`; `put` is last-write-wins. Every method
/// fails with [`StorageError::Closed`] once the backing store is closed.
///
/// Methods return `Send` futures so stores can be driven from spawned
/// tasks (the command dispatcher runs on its own task).
pub trait CodeStore: Send + Sync {
    /// Load the record stored under `digits`.
    fn get(&self, digits: &str) -> impl Future<Output = StorageResult<Option<AccessCode>>> + Send;

    /// Insert or replace a record. All-or-nothing.
    fn put(&self, code: &AccessCode) -> impl Future<Output = StorageResult<()>> + Send;

    /// Every stored record ordered by digits. Diagnostic use only.
    fn list(&self) -> impl Future<Output = StorageResult<Vec<AccessCode>>> + Send;
}

/// SQLite implementation of [`CodeStore`]
#[derive(Debug, Clone)]
pub struct SqliteCodeStore {
    pool: SqlitePool,
}

impl SqliteCodeStore {
    /// Create a new SQLite code store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.pool.is_closed() {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

impl CodeStore for SqliteCodeStore {
    async fn get(&self, digits: &str) -> StorageResult<Option<AccessCode>> {
        self.ensure_open()?;

        let row = sqlx::query_as::<_, AccessCodeRow>(
            r#"
            SELECT digits, name, kinds, validity_hours,
                   first_use, valid_from, expiration,
                   max_usage, usage, days, start_time, end_time
            FROM access_codes
            WHERE digits = ?
            "#,
        )
        .bind(digits)
        .fetch_optional(&self.pool)
        .await?;

        row.map(AccessCode::try_from).transpose()
    }

    async fn put(&self, code: &AccessCode) -> StorageResult<()> {
        self.ensure_open()?;
        let row = AccessCodeRow::encode(code)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO access_codes (
                digits, name, kinds, validity_hours,
                first_use, valid_from, expiration,
                max_usage, usage, days, start_time, end_time
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(digits) DO UPDATE SET
                name = excluded.name,
                kinds = excluded.kinds,
                validity_hours = excluded.validity_hours,
                first_use = excluded.first_use,
                valid_from = excluded.valid_from,
                expiration = excluded.expiration,
                max_usage = excluded.max_usage,
                usage = excluded.usage,
                days = excluded.days,
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&row.digits)
        .bind(&row.name)
        .bind(&row.kinds)
        .bind(row.validity_hours)
        .bind(&row.first_use)
        .bind(&row.valid_from)
        .bind(&row.expiration)
        .bind(row.max_usage)
        .bind(row.usage)
        .bind(&row.days)
        .bind(&row.start_time)
        .bind(&row.end_time)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<AccessCode>> {
        self.ensure_open()?;

        let rows = sqlx::query_as::<_, AccessCodeRow>(
            r#"
            SELECT digits, name, kinds, validity_hours,
                   first_use, valid_from, expiration,
                   max_usage, usage, days, start_time, end_time
            FROM access_codes
            ORDER BY digits
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AccessCode::try_from).collect()
    }
}
