//! Configuration loading and representation.
//!
//! Precedence, highest first:
//! 1. environment variables `STOCKROOM__<SECTION>__<KEY>` (e.g. `STOCKROOM__DATABASE__PATH`)
//! 2. a TOML file: `--config <FILE>`, else `$STOCKROOM_CONFIG`, else
//!    `<config dir>/stockroom/config.toml` when it exists
//! 3. built-in defaults under the OS data directory

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

use stockroom_observability::LogFormat;

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "STOCKROOM";
/// Environment variable naming an explicit config file.
pub const CONFIG_FILE_ENV: &str = "STOCKROOM_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {0:?} does not exist")]
    MissingFile(PathBuf),

    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

/// Top-level application configuration, injected at startup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// How long a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_seconds")]
    pub busy_timeout_seconds: u64,
    /// How long an operation waits for a free pooled connection.
    #[serde(default = "default_acquire_timeout_seconds")]
    pub acquire_timeout_seconds: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "default_backup_dir")]
    pub dir: PathBuf,
    /// Backups older than this many days are removed by rotation.
    #[serde(default = "default_keep_days")]
    pub keep_days: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_seconds: default_busy_timeout_seconds(),
            acquire_timeout_seconds: default_acquire_timeout_seconds(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// Config for a database file at `path` with default timeouts.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
            keep_days: default_keep_days(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_level(),
        }
    }
}

fn default_db_path() -> PathBuf {
    app_data_dir().join("stockroom.db")
}

fn default_backup_dir() -> PathBuf {
    app_data_dir().join("backups")
}

fn default_busy_timeout_seconds() -> u64 {
    30
}

fn default_acquire_timeout_seconds() -> u64 {
    30
}

fn default_max_connections() -> u32 {
    4
}

fn default_keep_days() -> u32 {
    30
}

fn default_level() -> String {
    "info".to_string()
}

/// `{app_data_dir}/stockroom`, falling back to `~/.local/share/stockroom`,
/// then to the working directory.
fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .unwrap_or_else(|| PathBuf::from("."))
        .join("stockroom")
}

impl AppConfig {
    /// Load configuration from the process environment and an optional file.
    ///
    /// An explicitly named file (argument or `STOCKROOM_CONFIG`) must exist; the
    /// per-user default file is optional.
    pub fn load(explicit_file: Option<&Path>) -> Result<Self, ConfigError> {
        let named = explicit_file
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_FILE_ENV).map(PathBuf::from));

        match named {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::MissingFile(path));
                }
                Self::from_sources(Some(&path), None)
            }
            None => {
                let user_file = dirs::config_dir()
                    .map(|d| d.join("stockroom").join("config.toml"))
                    .filter(|p| p.exists());
                Self::from_sources(user_file.as_deref(), None)
            }
        }
    }

    /// Build configuration from a file and an environment map.
    ///
    /// `env = None` reads the real process environment; tests pass a map so
    /// they do not race on process-wide state.
    pub fn from_sources(
        file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = file {
            tracing::debug!(path = %path.display(), "loading config file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let settings = builder.build()?;
        Ok(settings.try_deserialize::<AppConfig>()?)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            backup: BackupConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
