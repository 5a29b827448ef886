//! SQLite database handle (connection pool, pragmas, timestamp encoding).

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use crate::config::DatabaseConfig;
use crate::error::{StoreError, StoreResult};
use crate::migrations::{self, AppliedMigration};

/// Shared handle to the inventory database.
///
/// Cheap to clone; all clones share one pool. The database runs in WAL mode:
/// one writer at a time, readers are not blocked by it.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    path: PathBuf,
}

impl Database {
    /// Open the database file and apply every pending migration.
    pub async fn connect(cfg: &DatabaseConfig) -> StoreResult<Self> {
        let db = Self::open(cfg).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Open (creating if needed) the database file without migrating it.
    pub async fn open(cfg: &DatabaseConfig) -> StoreResult<Self> {
        if let Some(parent) = cfg.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&cfg.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(cfg.busy_timeout_seconds));

        let pool = SqlitePoolOptions::new()
            .max_connections(cfg.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_seconds))
            .connect_with(options)
            .await?;

        tracing::debug!(path = %cfg.path.display(), "opened inventory database");

        Ok(Self {
            pool,
            path: cfg.path.clone(),
        })
    }

    /// Apply pending migrations; returns the steps applied by this call.
    pub async fn migrate(&self) -> StoreResult<Vec<AppliedMigration>> {
        migrations::run(&self.pool).await
    }

    /// Every migration recorded in the migration log, oldest first.
    pub async fn applied_migrations(&self) -> StoreResult<Vec<AppliedMigration>> {
        migrations::applied(&self.pool).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection (checkpoints the WAL).
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Encode a timestamp as fixed-width RFC 3339 (nanoseconds, `Z`), so text
/// order equals time order and decoding is lossless.
pub(crate) fn encode_ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn decode_ts(table: &'static str, raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::corrupt(table, format!("invalid timestamp '{raw}': {e}")))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_round_trip_and_sort_as_text() {
        let a = Utc::now();
        let b = a + chrono::Duration::nanoseconds(1);
        assert_eq!(decode_ts("t", &encode_ts(&a)).unwrap(), a);
        assert!(encode_ts(&a) < encode_ts(&b));
    }

    #[test]
    fn bad_timestamp_is_corrupt_row() {
        let err = decode_ts("inventory", "yesterday").unwrap_err();
        assert!(matches!(err, StoreError::CorruptRow { table: "inventory", .. }));
    }

    #[tokio::test]
    async fn connect_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("db.sqlite");
        let db = Database::connect(&DatabaseConfig::at(&path)).await.unwrap();
        assert!(path.exists());
        assert_eq!(db.path(), path.as_path());
        db.close().await;
    }
}
