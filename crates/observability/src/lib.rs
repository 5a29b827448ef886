//! Tracing/logging setup shared by the `stockroom` binaries.

use serde::Deserialize;

/// Tracing configuration (filters, output format).
pub mod tracing;

/// Output format of log events.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Human-readable, multi-line.
    Pretty,
    /// Human-readable, single line.
    Compact,
}

/// Initialize process-wide tracing with the given format and fallback level.
///
/// `RUST_LOG` wins over `default_level` when set. Safe to call multiple
/// times; subsequent calls become no-ops.
pub fn init(format: LogFormat, default_level: &str) {
    tracing::init(format, default_level);
}
