/// Draft persistence layer
///
/// - Snapshot format (`DraftSnapshot`) and its listing summary
/// - The `DraftStore` boundary with SQLite and in-memory implementations
/// - Connection setup for the SQLite draft database

pub mod snapshot;

pub mod storage;

pub mod memory;

pub mod database;

pub use memory::InMemoryDraftStore;
pub use snapshot::{DraftSnapshot, DraftSummary, SnapshotContent};
pub use storage::{DraftStore, LoadOutcome, SqliteDraftStore, StorageError};
