//! Persistent per-user memory.

mod store;

pub use store::{HistoryTurn, MemoryStore, UserRecord};
