//! Repository layer for run persistence.
//!
//! The pipeline talks to persistence only through [`RunStore`]. The SQLite
//! store is the production backend; the in-memory store backs tests and
//! dry runs.

pub mod memory;
pub mod models;
pub mod pool;
pub mod sqlite;

pub use memory::MemoryRunStore;
pub use pool::{DbError, SqlitePool};
pub use sqlite::{SqliteRunStore, SCHEMA_SQL};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{CanonicalRecord, NewRun, RecordKind, Run};

/// Persistence collaborator for runs and their records.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert a pending run and return it with its assigned id.
    async fn create_run(&self, new: NewRun) -> Result<Run, StoreError>;

    async fn load_run(&self, id: i64) -> Result<Run, StoreError>;

    /// Persist the run's lifecycle fields.
    async fn update_run(&self, run: &Run) -> Result<(), StoreError>;

    /// Store canonical records for one kind and month; returns how many were written.
    async fn save_records(
        &self,
        run: &Run,
        kind: RecordKind,
        month: u32,
        records: &[CanonicalRecord],
    ) -> Result<usize, StoreError>;
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}
