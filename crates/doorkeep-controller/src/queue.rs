//! Inbound command queues.
//!
//! A queue hands out batches of messages and forgets a message only once it
//! is acknowledged; anything received but not acknowledged is delivered
//! again on the next receive.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::error::{ControlError, Result};

/// One received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Opaque handle passed back to [`CommandQueue::acknowledge`].
    pub receipt: String,
    pub body: String,
}

pub trait CommandQueue: Send + Sync {
    /// Fetch the pending messages, oldest first. Empty when idle.
    fn receive(&self) -> impl Future<Output = Result<Vec<QueueMessage>>> + Send;

    /// Remove a message so it is not delivered again.
    fn acknowledge(&self, receipt: &str) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Default)]
struct MemoryQueueState {
    next_id: u64,
    pending: BTreeMap<u64, String>,
    acknowledged: Vec<String>,
}

/// Process-local queue for tests and simulations. Clones share messages.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueue {
    state: Arc<Mutex<MemoryQueueState>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message body.
    ///
    /// # Returns
    ///
    /// The receipt that acknowledges this message. Receipts increase with
    /// every push and are delivered in that order.
    ///
    /// # Examples
    ///
    /// ```
    /// use doorkeep_controller::MemoryQueue;
    ///
    /// let queue = MemoryQueue::new();
    /// let first = queue.push(r#"{"InsType":"open"}"#);
    /// let second = queue.push(r#"{"InsType":"open"}"#);
    /// assert_ne!(first, second);
    /// assert_eq!(queue.pending_len(), 2);
    /// ```
    pub fn push(&self, body: impl Into<String>) -> String {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let id = state.next_id;
        state.next_id += 1;
        state.pending.insert(id, body.into());
        id.to_string()
    }

    /// Messages not yet acknowledged.
    pub fn pending_len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .len()
    }

    /// Receipts acknowledged so far, in order.
    pub fn acknowledged(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .acknowledged
            .clone()
    }
}

impl CommandQueue for MemoryQueue {
    async fn receive(&self) -> Result<Vec<QueueMessage>> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state
            .pending
            .iter()
            .map(|(id, body)| QueueMessage {
                receipt: id.to_string(),
                body: body.clone(),
            })
            .collect())
    }

    async fn acknowledge(&self, receipt: &str) -> Result<()> {
        let id: u64 = receipt
            .parse()
            .map_err(|_| ControlError::Queue(format!("unknown receipt {receipt:?}")))?;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.pending.remove(&id).is_none() {
            return Err(ControlError::Queue(format!("unknown receipt {receipt:?}")));
        }
        state.acknowledged.push(receipt.to_string());
        Ok(())
    }
}

/// A directory of `*.json` files, one message per file.
///
/// Files are delivered in file-name order; acknowledging deletes the file.
#[derive(Debug, Clone)]
pub struct SpoolQueue {
    dir: PathBuf,
}

impl SpoolQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CommandQueue for SpoolQueue {
    async fn receive(&self) -> Result<Vec<QueueMessage>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut messages = Vec::with_capacity(paths.len());
        for path in paths {
            match tokio::fs::read(&path).await {
                Ok(bytes) => messages.push(QueueMessage {
                    receipt: path.to_string_lossy().into_owned(),
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                }),
                // Removed between listing and reading
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "unreadable spool file"),
            }
        }

        if !messages.is_empty() {
            debug!(count = messages.len(), dir = %self.dir.display(), "spool messages received");
        }
        Ok(messages)
    }

    async fn acknowledge(&self, receipt: &str) -> Result<()> {
        let path = Path::new(receipt);
        if path.parent() != Some(self.dir.as_path()) {
            return Err(ControlError::Queue(format!(
                "receipt {receipt:?} is outside the spool directory"
            )));
        }
        tokio::fs::remove_file(path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_queue_redelivers_until_acknowledged() {
        let queue = MemoryQueue::new();
        let first = queue.push("one");
        queue.push("two");

        let batch = queue.receive().await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].body, "one");

        queue.acknowledge(&first).await.unwrap();
        let batch = queue.receive().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, "two");
        assert_eq!(queue.acknowledged(), vec![first.clone()]);

        assert!(queue.acknowledge(&first).await.is_err());
        assert!(queue.acknowledge("bogus").await.is_err());
    }

    #[tokio::test]
    async fn test_spool_queue_reads_json_files_in_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("002.json"), r#"{"InsType":"open"}"#).unwrap();
        std::fs::write(dir.path().join("001.json"), r#"{"InsType":"rescind"}"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let queue = SpoolQueue::new(dir.path());
        let batch = queue.receive().await.unwrap();

        assert_eq!(batch.len(), 2);
        assert!(batch[0].receipt.ends_with("001.json"));
        assert_eq!(batch[1].body, r#"{"InsType":"open"}"#);

        queue.acknowledge(&batch[0].receipt).await.unwrap();
        assert!(!dir.path().join("001.json").exists());
        assert_eq!(queue.receive().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_spool_queue_refuses_foreign_receipts() {
        let dir = TempDir::new().unwrap();
        let queue = SpoolQueue::new(dir.path());

        let result = queue.acknowledge("/etc/passwd").await;
        assert!(matches!(result, Err(ControlError::Queue(_))));
    }

    #[tokio::test]
    async fn test_spool_queue_missing_dir_errors() {
        let dir = TempDir::new().unwrap();
        let queue = SpoolQueue::new(dir.path().join("absent"));

        assert!(matches!(queue.receive().await, Err(ControlError::Io(_))));
    }
}
