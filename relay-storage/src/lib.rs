//! # relay-storage
//!
//! Persistent store for the relay bot: user settings (selected model, version,
//! generation parameters), chat threads (title, language, soft-delete flag),
//! and messages. SQLite via sqlx; consumed by the orchestrator through
//! [`ChatStore`].

mod models;
mod sqlite_pool;
mod store;

pub use models::{ChatRecord, NewMessage, StoredMessage, UserSettings};
pub use sqlite_pool::SqlitePoolManager;
pub use store::{ChatStore, StorageError};
