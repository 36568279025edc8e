use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{StorageError, StorageResult};
use crate::repositories::CodeStore;
use doorkeep_core::AccessCode;

#[derive(Debug, Default)]
struct MemoryState {
    codes: BTreeMap<String, AccessCode>,
    closed: bool,
}

/// Process-local [`CodeStore`] for tests and bench simulations.
///
/// Clones share state. Nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryCodeStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store.
    ///
    /// # Arguments
    ///
    /// * `codes` - Records to insert; a later record with the same digits
    ///   replaces an earlier one
    pub fn with_codes(codes: impl IntoIterator<Item = AccessCode>) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            for code in codes {
                state.codes.insert(code.digits.clone(), code);
            }
        }
        store
    }

    /// Close the store; later operations fail with [`StorageError::Closed`].
    pub fn close(&self) {
        self.lock().closed = true;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_open<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> StorageResult<T> {
        let mut state = self.lock();
        if state.closed {
            return Err(StorageError::Closed);
        }
        Ok(f(&mut state))
    }
}

impl CodeStore for MemoryCodeStore {
    async fn get(&self, digits: &str) -> StorageResult<Option<AccessCode>> {
        self.with_open(|state| state.codes.get(digits).cloned())
    }

    async fn put(&self, code: &AccessCode) -> StorageResult<()> {
        self.with_open(|state| {
            state.codes.insert(code.digits.clone(), code.clone());
        })
    }

    async fn list(&self) -> StorageResult<Vec<AccessCode>> {
        self.with_open(|state| state.codes.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorkeep_core::CodeKind;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryCodeStore::new();
        let code = AccessCode::new("42", "Answer").with_kinds([CodeKind::Active]);

        store.put(&code).await.unwrap();
        assert_eq!(store.get("42").await.unwrap(), Some(code));
        assert_eq!(store.get("43").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_clones_share_state() {
        let store = MemoryCodeStore::with_codes([AccessCode::new("1", "a")]);
        let clone = store.clone();

        clone.put(&AccessCode::new("2", "b")).await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_memory_store_closed() {
        let store = MemoryCodeStore::with_codes([AccessCode::new("1", "a")]);
        store.close();

        assert!(matches!(store.get("1").await, Err(StorageError::Closed)));
        assert!(matches!(
            store.put(&AccessCode::new("2", "b")).await,
            Err(StorageError::Closed)
        ));
        assert!(matches!(store.list().await, Err(StorageError::Closed)));
    }
}
