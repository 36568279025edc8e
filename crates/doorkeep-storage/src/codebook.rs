use chrono::{DateTime, FixedOffset};
use doorkeep_core::constants::{DEFAULT_MASTER_CODE, MASTER_NAME};
use doorkeep_core::{AccessCode, codes_match};
use tracing::{debug, error, info};

use crate::error::StorageResult;
use crate::policy::{self, DenyReason, Verdict};
use crate::repositories::CodeStore;

/// Policy settings that do not live in the store.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    master_code: String,
}

impl PolicyConfig {
    /// Use `admin_code` as master code, or the default code when it is empty.
    pub fn new(admin_code: impl Into<String>) -> Self {
        let admin_code = admin_code.into();
        let master_code = if admin_code.is_empty() {
            DEFAULT_MASTER_CODE.to_string()
        } else {
            admin_code
        };
        Self { master_code }
    }

    pub fn master_code(&self) -> &str {
        &self.master_code
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::new("")
    }
}

/// Result of evaluating a presented code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub verdict: Verdict,
    /// Owner of the code. Reported on denials too, for audit.
    pub name: Option<String>,
}

impl Evaluation {
    fn master() -> Self {
        Self {
            verdict: Verdict::Admit { silent: true },
            name: Some(MASTER_NAME.to_string()),
        }
    }

    fn deny(reason: DenyReason, name: Option<String>) -> Self {
        Self {
            verdict: Verdict::Deny(reason),
            name,
        }
    }

    #[must_use]
    pub fn is_admitted(&self) -> bool {
        self.verdict.is_admit()
    }

    #[must_use]
    pub fn is_silent(&self) -> bool {
        matches!(self.verdict, Verdict::Admit { silent: true })
    }

    #[must_use]
    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self.verdict {
            Verdict::Deny(reason) => Some(reason),
            Verdict::Admit { .. } => None,
        }
    }
}

/// What a rescind did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescindOutcome {
    Rescinded,
    AlreadyInactive,
    NotFound,
}

/// Policy evaluation and administrative mutations over a [`CodeStore`].
///
/// The code book is the single read-modify-write path for records: the
/// lock controller evaluates through it and the command dispatcher
/// rescinds and updates through it.
#[derive(Debug, Clone)]
pub struct CodeBook<S> {
    store: S,
    config: PolicyConfig,
}

impl<S: CodeStore> CodeBook<S> {
    /// Create a code book over `store`.
    ///
    /// # Arguments
    ///
    /// * `store` - Where access code records live
    /// * `config` - Master code settings
    ///
    /// # Examples
    ///
    /// ```
    /// use doorkeep_storage::{CodeBook, MemoryCodeStore, PolicyConfig};
    ///
    /// let store = MemoryCodeStore::new();
    /// let book = CodeBook::new(store.clone(), PolicyConfig::new("4321"));
    /// # let _ = book.store();
    /// ```
    pub fn new(store: S, config: PolicyConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decide whether `digits` admits at `now`, persisting the usage update on admission.
    ///
    /// Never fails: store errors are logged and become
    /// [`DenyReason::StoreUnavailable`]. Denials never write.
    pub async fn evaluate(&self, digits: &str, now: DateTime<FixedOffset>) -> Evaluation {
        if codes_match(digits, self.config.master_code()) {
            debug!("master code presented");
            return Evaluation::master();
        }

        let code = match self.store.get(digits).await {
            Ok(Some(code)) => code,
            Ok(None) => return Evaluation::deny(DenyReason::NotFound, None),
            Err(e) => {
                error!(error = %e, "code lookup failed");
                return Evaluation::deny(DenyReason::StoreUnavailable, None);
            }
        };

        match policy::decide(&code, &now) {
            Verdict::Deny(reason) => {
                debug!(name = %code.name, reason = %reason, "code denied");
                Evaluation::deny(reason, Some(code.name))
            }
            Verdict::Admit { silent } => {
                let mut admitted = code;
                policy::record_admission(&mut admitted, &now);

                if let Err(e) = self.store.put(&admitted).await {
                    error!(name = %admitted.name, error = %e, "failed to persist admission");
                    return Evaluation::deny(DenyReason::StoreUnavailable, Some(admitted.name));
                }

                debug!(name = %admitted.name, usage = admitted.usage, "code admitted");
                Evaluation {
                    verdict: Verdict::Admit { silent },
                    name: Some(admitted.name),
                }
            }
        }
    }

    /// Remove the `active` tag from a code, keeping everything else.
    ///
    /// Absent and already-inactive codes are left untouched.
    pub async fn rescind(&self, digits: &str) -> StorageResult<RescindOutcome> {
        let Some(mut code) = self.store.get(digits).await? else {
            return Ok(RescindOutcome::NotFound);
        };

        if !code.deactivate() {
            return Ok(RescindOutcome::AlreadyInactive);
        }

        self.store.put(&code).await?;
        info!(name = %code.name, "code rescinded");
        Ok(RescindOutcome::Rescinded)
    }

    /// Create or replace a code.
    pub async fn update(&self, code: &AccessCode) -> StorageResult<()> {
        code.validate()?;
        self.store.put(code).await?;
        info!(name = %code.name, kinds = code.kinds.len(), "code updated");
        Ok(())
    }

    pub async fn list(&self) -> StorageResult<Vec<AccessCode>> {
        self.store.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MemoryCodeStore;
    use chrono::TimeDelta;
    use doorkeep_core::{CodeKind, IsoTimestamp};
    use proptest::prelude::*;

    fn noon() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-06-10T12:00:00+02:00").unwrap()
    }

    #[test]
    fn test_policy_config_master_fallback() {
        assert_eq!(PolicyConfig::new("").master_code(), DEFAULT_MASTER_CODE);
        assert_eq!(PolicyConfig::new("99887766").master_code(), "99887766");
    }

    #[tokio::test]
    async fn test_default_master_code_admits_silently() {
        let store = MemoryCodeStore::new();
        let book = CodeBook::new(store.clone(), PolicyConfig::default());

        let evaluation = book.evaluate(DEFAULT_MASTER_CODE, noon()).await;

        assert!(evaluation.is_admitted());
        assert!(evaluation.is_silent());
        assert_eq!(evaluation.name.as_deref(), Some(MASTER_NAME));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_admin_code_replaces_default() {
        let book = CodeBook::new(MemoryCodeStore::new(), PolicyConfig::new("555000"));

        assert!(book.evaluate("555000", noon()).await.is_admitted());
        assert_eq!(
            book.evaluate(DEFAULT_MASTER_CODE, noon()).await.deny_reason(),
            Some(DenyReason::NotFound)
        );
    }

    #[tokio::test]
    async fn test_master_code_shadows_stored_record() {
        let stored = AccessCode::new(DEFAULT_MASTER_CODE, "Shadowed")
            .with_kinds([CodeKind::Active, CodeKind::Count]);
        let store = MemoryCodeStore::with_codes([stored.clone()]);
        let book = CodeBook::new(store.clone(), PolicyConfig::default());

        let evaluation = book.evaluate(DEFAULT_MASTER_CODE, noon()).await;

        assert_eq!(evaluation.name.as_deref(), Some(MASTER_NAME));
        assert_eq!(store.get(DEFAULT_MASTER_CODE).await.unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn test_inactive_reports_name() {
        let store = MemoryCodeStore::with_codes([AccessCode::new("777", "Former tenant")]);
        let book = CodeBook::new(store, PolicyConfig::default());

        let evaluation = book.evaluate("777", noon()).await;
        assert_eq!(evaluation.deny_reason(), Some(DenyReason::Inactive));
        assert_eq!(evaluation.name.as_deref(), Some("Former tenant"));
    }

    #[tokio::test]
    async fn test_closed_store_denies() {
        let code = AccessCode::new("777", "x").with_kinds([CodeKind::Active]);
        let store = MemoryCodeStore::with_codes([code]);
        store.close();
        let book = CodeBook::new(store, PolicyConfig::default());

        let evaluation = book.evaluate("777", noon()).await;
        assert_eq!(evaluation.deny_reason(), Some(DenyReason::StoreUnavailable));
    }

    #[tokio::test]
    async fn test_rescind_outcomes() {
        let store = MemoryCodeStore::with_codes([
            AccessCode::new("1", "on").with_kinds([CodeKind::Active, CodeKind::Silent]),
            AccessCode::new("2", "off").with_kinds([CodeKind::Silent]),
        ]);
        let book = CodeBook::new(store.clone(), PolicyConfig::default());

        assert_eq!(book.rescind("1").await.unwrap(), RescindOutcome::Rescinded);
        assert_eq!(
            book.rescind("1").await.unwrap(),
            RescindOutcome::AlreadyInactive
        );
        assert_eq!(
            book.rescind("2").await.unwrap(),
            RescindOutcome::AlreadyInactive
        );
        assert_eq!(book.rescind("3").await.unwrap(), RescindOutcome::NotFound);

        let rescinded = store.get("1").await.unwrap().unwrap();
        assert!(!rescinded.is_active());
        assert!(rescinded.is_silent());
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_digits() {
        let book = CodeBook::new(MemoryCodeStore::new(), PolicyConfig::default());
        assert!(book.update(&AccessCode::new("", "nobody")).await.is_err());
        assert!(book.list().await.unwrap().is_empty());
    }

    fn arb_code() -> impl Strategy<Value = AccessCode> {
        (
            proptest::sample::subsequence(CodeKind::ALL.to_vec(), 0..=CodeKind::ALL.len()),
            -2i64..6,
            -1i64..6,
            -48i64..48,
            proptest::option::of(-72i64..72),
        )
            .prop_map(|(kinds, usage, max_usage, validity_hours, first_use_offset)| {
                let mut code = AccessCode::new("31337", "Prop").with_kinds(kinds);
                code.usage = usage;
                code.max_usage = max_usage;
                code.validity_hours = validity_hours;
                code.valid_from = IsoTimestamp::new("2025-06-01T00:00:00+0200");
                code.expiration = IsoTimestamp::new("2025-06-11T00:00:00+0200");
                if let Some(offset) = first_use_offset {
                    code.first_use =
                        IsoTimestamp::from_datetime(&(noon() + TimeDelta::hours(offset)));
                }
                code
            })
    }

    proptest! {
        #[test]
        fn prop_denials_never_mutate(code in arb_code(), hour in 0i64..24) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let now = noon() + TimeDelta::hours(hour - 12);
            let store = MemoryCodeStore::with_codes([code.clone()]);
            let book = CodeBook::new(store.clone(), PolicyConfig::new("000000"));

            let evaluation = runtime.block_on(book.evaluate("31337", now));
            let stored = runtime.block_on(store.get("31337")).unwrap().unwrap();

            if evaluation.is_admitted() {
                prop_assert_eq!(stored.usage, code.usage + 1);
                if code.usage == 0 {
                    prop_assert_eq!(stored.first_use.parse().unwrap(), now);
                } else {
                    prop_assert_eq!(&stored.first_use, &code.first_use);
                }
            } else {
                prop_assert_eq!(stored, code);
            }
        }

        #[test]
        fn prop_exhausted_count_denied(max_usage in 1i64..50, extra in 0i64..5) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let mut code = AccessCode::new("4040", "Counted")
                .with_kinds([CodeKind::Active, CodeKind::Count]);
            code.max_usage = max_usage;
            code.usage = max_usage + extra;
            let store = MemoryCodeStore::with_codes([code.clone()]);
            let book = CodeBook::new(store.clone(), PolicyConfig::default());

            let evaluation = runtime.block_on(book.evaluate("4040", noon()));

            prop_assert_eq!(evaluation.deny_reason(), Some(DenyReason::UsageExhausted));
            prop_assert_eq!(runtime.block_on(store.get("4040")).unwrap().unwrap().usage, code.usage);
        }
    }
}
