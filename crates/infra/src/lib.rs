//! Infrastructure layer: SQLite store, configuration, reports and backups.

pub mod backup;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod forms;
pub mod ledger;
pub mod migrations;
pub mod record_store;
pub mod transaction_log;

pub use config::{AppConfig, BackupConfig, ConfigError, DatabaseConfig, LoggingConfig};
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use forms::{FormRegistry, FormTable};
pub use ledger::LedgerService;
pub use record_store::RecordStore;
pub use transaction_log::TransactionLog;
