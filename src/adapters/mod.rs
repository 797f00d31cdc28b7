//! Adapters layer: Concrete implementations of ports and outer concerns.
//!
//! - `sqlite`: SQLite appointment storage
//! - `secrets`: field key sourcing
//! - `sanitize`: PII filtering for logs

pub mod sanitize;
pub mod secrets;
pub mod sqlite;

// Re-export storage error for lib.rs
pub use sqlite::StorageError;
