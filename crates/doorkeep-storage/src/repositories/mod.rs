pub mod access_code;
pub mod memory;

pub use access_code::{CodeStore, SqliteCodeStore};
pub use memory::MemoryCodeStore;
