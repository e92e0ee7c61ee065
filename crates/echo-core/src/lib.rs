//! Persistence layer for the Echo package recommender: package metadata,
//! usage telemetry, recommendation history and installation events in a
//! single SQLite store.

pub mod config;
pub mod error;
pub mod execution;
pub mod logging;
pub mod migration;
pub mod models;
pub mod persistence;
pub mod sqlite;

pub use config::StoreConfig;
pub use error::{StoreError, StoreErrorKind};
pub use sqlite::{QueryRow, SqliteStore};
