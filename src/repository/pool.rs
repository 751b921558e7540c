//! SQLite connection factory.
//!
//! SQLite connections are lightweight and file-based, so a new connection is
//! opened per operation. `SyncConnectionWrapper` runs the blocking driver on
//! tokio's blocking pool.

use std::path::Path;

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::AsyncConnection;

use crate::error::StoreError;

/// Diesel error type alias.
pub type DbError = diesel::result::Error;

/// Async SQLite connection type.
pub type SqliteConn = SyncConnectionWrapper<SqliteConnection>;

#[derive(Debug, Clone)]
pub struct SqlitePool {
    database_url: String,
}

impl SqlitePool {
    /// Create a pool. `sqlite://` and `sqlite:` prefixes are stripped.
    pub fn new(database_url: &str) -> Self {
        let url = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);
        Self {
            database_url: url.to_string(),
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(&path.display().to_string())
    }

    /// Open a connection.
    pub async fn get(&self) -> Result<SqliteConn, StoreError> {
        SqliteConn::establish(&self.database_url)
            .await
            .map_err(|e| StoreError::Connection(format!("{}: {}", self.database_url, e)))
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_stripping() {
        assert_eq!(SqlitePool::new("sqlite:///tmp/m.db").database_url(), "/tmp/m.db");
        assert_eq!(SqlitePool::new("sqlite:data/m.db").database_url(), "data/m.db");
        assert_eq!(SqlitePool::new("/var/lib/m.db").database_url(), "/var/lib/m.db");
    }

    #[tokio::test]
    async fn test_unreachable_database_is_connection_error() {
        let pool = SqlitePool::new("/nonexistent-dir/for/sure/m.db");
        let err = pool.get().await.err().unwrap();
        assert!(matches!(err, StoreError::Connection(_)));
    }
}
