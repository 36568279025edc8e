//! Code store and access policy for the door controller.
//!
//! - [`Database`] opens the SQLite file (WAL, embedded migrations) and
//!   hands out a [`SqliteCodeStore`].
//! - [`CodeStore`] is the persistence seam; [`MemoryCodeStore`] implements
//!   it in memory for tests and simulations.
//! - [`policy`] holds the pure admit/deny decision.
//! - [`CodeBook`] combines the two: evaluation with exactly-once usage
//!   accounting, plus rescind and update for remote administration.
//!
//! ```no_run
//! use doorkeep_core::{Clock, SystemClock};
//! use doorkeep_storage::{CodeBook, Database, DatabaseConfig, PolicyConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("doorkeep.db")).await?;
//! let book = CodeBook::new(db.code_store(), PolicyConfig::new(""));
//!
//! let evaluation = book.evaluate("6789", SystemClock.now()).await;
//! if evaluation.is_admitted() {
//!     println!("welcome {}", evaluation.name.unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

pub mod codebook;
pub mod connection;
pub mod error;
pub mod models;
pub mod policy;
pub mod repositories;

pub use codebook::{CodeBook, Evaluation, PolicyConfig, RescindOutcome};
pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use policy::{DenyReason, Verdict};
pub use repositories::{CodeStore, MemoryCodeStore, SqliteCodeStore};
