//! Versioned schema migrations with an explicit migration log.
//!
//! Every step is applied in its own transaction together with its row in
//! `schema_migrations`, so a step is either fully applied and logged or not at
//! all. A failing step aborts with [`StoreError::Migration`]; nothing is
//! skipped or ignored.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::db::{decode_ts, encode_ts};
use crate::error::{StoreError, StoreResult};

/// One named, ordered schema step.
#[derive(Debug)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub statements: &'static [&'static str],
}

/// A row of the migration log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// The canonical schema, oldest step first. Only ever append to this list.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_inventory",
        statements: &[
            r#"
            CREATE TABLE inventory (
                id               TEXT PRIMARY KEY,
                part_no          TEXT NOT NULL,
                s_no             TEXT NULL,
                sl_no_contract   TEXT NULL,
                set_patt_no      TEXT NULL,
                description      TEXT NULL,
                denomination     TEXT NULL,
                item_type        TEXT NULL,
                qty_per_gt       INTEGER NULL,
                mdnd_def         TEXT NULL,
                lf_no            TEXT NULL,
                location_bin     TEXT NULL,
                received_from    TEXT NULL,
                qty_received     INTEGER NULL,
                issued_to        TEXT NULL,
                qty_issued       INTEGER NULL,
                remarks          TEXT NULL,
                opening_quantity INTEGER NOT NULL,
                quantity         INTEGER NOT NULL,
                created_at       TEXT NOT NULL,
                modified_at      TEXT NOT NULL
            )
            "#,
            "CREATE UNIQUE INDEX idx_inventory_part_no ON inventory (part_no)",
        ],
    },
    Migration {
        version: 2,
        name: "create_transactions",
        statements: &[
            r#"
            CREATE TABLE transactions (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                id          TEXT NOT NULL UNIQUE,
                record_id   TEXT NOT NULL,
                part_no     TEXT NOT NULL,
                delta       INTEGER NOT NULL CHECK (delta <> 0),
                tx_type     TEXT NOT NULL CHECK (tx_type IN ('IN', 'OUT')),
                reason      TEXT NOT NULL,
                source      TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
            "CREATE INDEX idx_transactions_record ON transactions (record_id, seq)",
            r#"
            CREATE TRIGGER transactions_append_only_update
            BEFORE UPDATE ON transactions
            BEGIN
                SELECT RAISE(ABORT, 'transaction log is append-only');
            END
            "#,
            r#"
            CREATE TRIGGER transactions_append_only_delete
            BEFORE DELETE ON transactions
            BEGIN
                SELECT RAISE(ABORT, 'transaction log is append-only');
            END
            "#,
        ],
    },
    Migration {
        version: 3,
        name: "create_voucher_registries",
        statements: &[
            r#"
            CREATE TABLE certified_receipt (
                id            TEXT PRIMARY KEY,
                set_no        TEXT NULL,
                part_no       TEXT NULL,
                item_desc     TEXT NULL,
                denom_qty     TEXT NULL,
                qty_received  INTEGER NULL,
                received_from TEXT NULL,
                received_by   TEXT NULL,
                remarks       TEXT NULL,
                created_at    TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE spares_issue (
                id           TEXT PRIMARY KEY,
                sl_no        TEXT NULL,
                part_no      TEXT NULL,
                description  TEXT NULL,
                lf_no        TEXT NULL,
                item         TEXT NULL,
                qty_issued   INTEGER NULL,
                balance      INTEGER NULL,
                issued_to    TEXT NULL,
                remarks      TEXT NULL,
                created_at   TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE demand_supply (
                id           TEXT PRIMARY KEY,
                patt_no      TEXT NULL,
                description  TEXT NULL,
                mand_dept    TEXT NULL,
                lf_no        TEXT NULL,
                qty_req      INTEGER NULL,
                qty_held     INTEGER NULL,
                balance      INTEGER NULL,
                location     TEXT NULL,
                remarks      TEXT NULL,
                created_at   TEXT NOT NULL
            )
            "#,
        ],
    },
    Migration {
        version: 4,
        name: "index_listing_order",
        statements: &[
            "CREATE INDEX idx_inventory_created_at ON inventory (created_at)",
            "CREATE INDEX idx_certified_receipt_created_at ON certified_receipt (created_at)",
            "CREATE INDEX idx_spares_issue_created_at ON spares_issue (created_at)",
            "CREATE INDEX idx_demand_supply_created_at ON demand_supply (created_at)",
        ],
    },
];

/// Highest schema version known to this build.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

async fn ensure_log_table(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            name       TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Read the migration log, oldest first.
pub async fn applied(pool: &SqlitePool) -> StoreResult<Vec<AppliedMigration>> {
    ensure_log_table(pool).await?;

    let rows = sqlx::query(
        r#"
        SELECT version, name, applied_at
        FROM schema_migrations
        ORDER BY version ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let applied_at: String = row.try_get("applied_at")?;
        out.push(AppliedMigration {
            version: row.try_get("version")?,
            name: row.try_get("name")?,
            applied_at: decode_ts("schema_migrations", &applied_at)?,
        });
    }
    Ok(out)
}

/// Apply every migration not yet in the log, in version order.
///
/// Idempotent: a fully migrated database returns an empty vector.
pub async fn run(pool: &SqlitePool) -> StoreResult<Vec<AppliedMigration>> {
    let done = applied(pool).await?;

    let supported = latest_version();
    if let Some(found) = done.iter().map(|m| m.version).max() {
        if found > supported {
            return Err(StoreError::SchemaTooNew { found, supported });
        }
    }

    let mut newly_applied = Vec::new();

    for step in MIGRATIONS {
        if done.iter().any(|m| m.version == step.version) {
            continue;
        }

        let fail = |source: sqlx::Error| StoreError::Migration {
            version: step.version,
            name: step.name,
            source,
        };

        let applied_at = Utc::now();
        let mut tx = pool.begin().await.map_err(fail)?;

        for statement in step.statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(fail)?;
        }

        sqlx::query(
            r#"
            INSERT INTO schema_migrations (version, name, applied_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(step.version)
        .bind(step.name)
        .bind(encode_ts(&applied_at))
        .execute(&mut *tx)
        .await
        .map_err(fail)?;

        tx.commit().await.map_err(fail)?;

        tracing::info!(version = step.version, name = step.name, "applied migration");

        newly_applied.push(AppliedMigration {
            version: step.version,
            name: step.name.to_string(),
            applied_at,
        });
    }

    Ok(newly_applied)
}
