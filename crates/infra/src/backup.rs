//! On-demand database snapshots and their rotation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};

use crate::db::Database;
use crate::error::StoreResult;

const PREFIX: &str = "backup_";
const SUFFIX: &str = ".db";

fn is_backup_file(name: &str) -> bool {
    name.starts_with(PREFIX) && name.ends_with(SUFFIX)
}

/// Write a consistent snapshot of the database into `dir` with `VACUUM INTO`.
///
/// The file is named `backup_<UTC stamp>.db`; an existing file is never
/// overwritten.
pub async fn create_backup(db: &Database, dir: &Path, now: DateTime<Utc>) -> StoreResult<PathBuf> {
    fs::create_dir_all(dir)?;

    let stamp = now.format("%Y%m%dT%H%M%SZ");
    let mut target = dir.join(format!("{PREFIX}{stamp}{SUFFIX}"));
    let mut n = 1;
    while target.exists() {
        target = dir.join(format!("{PREFIX}{stamp}_{n}{SUFFIX}"));
        n += 1;
    }

    sqlx::query("VACUUM INTO ?1")
        .bind(target.to_string_lossy().into_owned())
        .execute(db.pool())
        .await?;

    tracing::info!(path = %target.display(), "created backup");
    Ok(target)
}

/// Delete `backup_*.db` files in `dir` last modified more than `keep_days`
/// before `now`. Other files are never touched. Returns the removed paths.
pub fn rotate_backups(dir: &Path, keep_days: u32, now: SystemTime) -> StoreResult<Vec<PathBuf>> {
    let max_age = Duration::from_secs(u64::from(keep_days) * 24 * 60 * 60);
    let mut removed = Vec::new();

    if !dir.exists() {
        return Ok(removed);
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_str().is_some_and(is_backup_file) {
            continue;
        }

        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }

        let age = now.duration_since(meta.modified()?).unwrap_or_default();
        if age > max_age {
            let path = entry.path();
            fs::remove_file(&path)?;
            tracing::info!(path = %path.display(), age_days = age.as_secs() / 86_400, "removed old backup");
            removed.push(path);
        }
    }

    removed.sort();
    Ok(removed)
}
