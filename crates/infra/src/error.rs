//! Store-level error model.

use thiserror::Error;

use stockroom_core::DomainError;

/// Result type used by the store layer.
pub type StoreResult<T> = Result<T, StoreError>;

// SQLite primary result codes (extended codes carry them in the low byte).
const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

/// Errors surfaced by the record store, transaction log, ledger service and
/// form registries.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Lock wait or pool acquisition timed out.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("migration {version} ({name}) failed: {source}")]
    Migration {
        version: i64,
        name: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("schema version {found} is newer than this build supports ({supported})")]
    SchemaTooNew { found: i64, supported: i64 },

    #[error("corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn corrupt(table: &'static str, message: impl Into<String>) -> Self {
        Self::CorruptRow {
            table,
            message: message.into(),
        }
    }

    /// Classify a driver error, attaching `key` to uniqueness violations.
    pub fn from_sqlx_with_key(err: sqlx::Error, key: &str) -> Self {
        match Self::from(err) {
            StoreError::DuplicateKey(_) => StoreError::DuplicateKey(key.to_string()),
            other => other,
        }
    }
}

impl From<DomainError> for StoreError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
            DomainError::InvariantViolation(msg) => Self::InvariantViolation(msg),
            DomainError::NotFound(what) => Self::NotFound(what),
            DomainError::DuplicateKey(key) => Self::DuplicateKey(key),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut => {
                return Self::StoreUnavailable("timed out waiting for a connection".into());
            }
            sqlx::Error::Database(db) => {
                if db.is_unique_violation() {
                    return Self::DuplicateKey(db.message().to_string());
                }
                let primary = db
                    .code()
                    .and_then(|c| c.parse::<i64>().ok())
                    .map(|c| c & 0xff);
                if matches!(primary, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED)) {
                    return Self::StoreUnavailable(db.message().to_string());
                }
            }
            _ => {}
        }
        Self::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_onto_taxonomy() {
        assert!(matches!(
            StoreError::from(DomainError::validation("x")),
            StoreError::Validation(_)
        ));
        assert!(matches!(
            StoreError::from(DomainError::not_found("P-1")),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            StoreError::from(DomainError::duplicate_key("P-1")),
            StoreError::DuplicateKey(_)
        ));
    }

    #[test]
    fn pool_timeout_is_store_unavailable() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::StoreUnavailable(_)
        ));
    }
}
