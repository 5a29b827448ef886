//! Append-only transaction log.
//!
//! Entries are written only by ledger adjustments, inside the same database
//! transaction as the quantity update. The table itself refuses `UPDATE` and
//! `DELETE` (see the `create_transactions` migration).

use std::collections::HashMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use stockroom_core::{RecordId, TransactionId};
use stockroom_inventory::{Source, TransactionEntry, TxKind};

use crate::db::{Database, decode_ts, encode_ts};
use crate::error::{StoreError, StoreResult};

const TABLE: &str = "transactions";

/// Default cap of [`TransactionLog::list_recent`].
pub const DEFAULT_LIMIT: u32 = 1000;

#[derive(Debug, Clone)]
pub struct TransactionLog {
    pool: SqlitePool,
}

impl TransactionLog {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Most recent entries first, at most `limit` of them.
    pub async fn list_recent(&self, limit: u32) -> StoreResult<Vec<TransactionEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, record_id, part_no, delta, tx_type, reason, source, created_at
            FROM transactions
            ORDER BY seq DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    /// Most recent entries of one record first.
    pub async fn list_for_record(
        &self,
        record_id: RecordId,
        limit: u32,
    ) -> StoreResult<Vec<TransactionEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, record_id, part_no, delta, tx_type, reason, source, created_at
            FROM transactions
            WHERE record_id = ?1
            ORDER BY seq DESC
            LIMIT ?2
            "#,
        )
        .bind(record_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    /// Logged deltas grouped by record, in log order.
    pub(crate) async fn deltas_by_record(&self) -> StoreResult<HashMap<RecordId, Vec<i64>>> {
        let rows = sqlx::query("SELECT record_id, delta FROM transactions ORDER BY seq ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut out: HashMap<RecordId, Vec<i64>> = HashMap::new();
        for row in rows {
            let record_id: String = row.try_get("record_id")?;
            let record_id = record_id
                .parse::<RecordId>()
                .map_err(|e| StoreError::corrupt(TABLE, e.to_string()))?;
            out.entry(record_id).or_default().push(row.try_get("delta")?);
        }
        Ok(out)
    }

    pub async fn count(&self) -> StoreResult<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

/// Append one entry on an open connection (normally a ledger transaction).
pub(crate) async fn append(conn: &mut SqliteConnection, entry: &TransactionEntry) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions (id, record_id, part_no, delta, tx_type, reason, source, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.record_id.to_string())
    .bind(&entry.part_no)
    .bind(entry.delta)
    .bind(entry.kind.as_str())
    .bind(&entry.reason)
    .bind(entry.source.as_str())
    .bind(encode_ts(&entry.created_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Map a database row into a `TransactionEntry`.
fn entry_from_row(row: &SqliteRow) -> StoreResult<TransactionEntry> {
    let id: String = row.try_get("id")?;
    let record_id: String = row.try_get("record_id")?;
    let kind: String = row.try_get("tx_type")?;
    let source: String = row.try_get("source")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(TransactionEntry {
        id: id
            .parse::<TransactionId>()
            .map_err(|e| StoreError::corrupt(TABLE, e.to_string()))?,
        record_id: record_id
            .parse::<RecordId>()
            .map_err(|e| StoreError::corrupt(TABLE, e.to_string()))?,
        part_no: row.try_get("part_no")?,
        delta: row.try_get("delta")?,
        kind: TxKind::parse(&kind).map_err(|e| StoreError::corrupt(TABLE, e.to_string()))?,
        reason: row.try_get("reason")?,
        source: Source::from(source),
        created_at: decode_ts(TABLE, &created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_db;
    use chrono::Utc;
    use stockroom_inventory::Adjustment;

    async fn append_raw(db: &Database, record_id: RecordId, delta: i64) -> TransactionEntry {
        let entry = TransactionEntry::for_adjustment(
            TransactionId::new(),
            record_id,
            &Adjustment::new("P-1", delta).reason("test"),
            Utc::now(),
        );
        let mut conn = db.pool().acquire().await.unwrap();
        append(&mut conn, &entry).await.unwrap();
        entry
    }

    #[tokio::test]
    async fn list_recent_is_newest_first_and_capped() {
        let (_dir, db) = temp_db().await;
        let log = TransactionLog::new(&db);
        let rid = RecordId::new();

        let mut written = Vec::new();
        for d in [1, -2, 3, -4, 5] {
            written.push(append_raw(&db, rid, d).await);
        }

        let all = log.list_recent(DEFAULT_LIMIT).await.unwrap();
        let deltas: Vec<i64> = all.iter().map(|e| e.delta).collect();
        assert_eq!(deltas, vec![5, -4, 3, -2, 1]);
        assert_eq!(all[0], written[4]);

        let capped = log.list_recent(2).await.unwrap();
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].delta, 5);
    }

    #[tokio::test]
    async fn list_for_record_filters() {
        let (_dir, db) = temp_db().await;
        let log = TransactionLog::new(&db);
        let a = RecordId::new();
        let b = RecordId::new();

        append_raw(&db, a, 1).await;
        append_raw(&db, b, 2).await;
        append_raw(&db, a, -1).await;

        let entries = log.list_for_record(a, DEFAULT_LIMIT).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.record_id == a));
        assert_eq!(entries[0].kind, TxKind::Out);

        let grouped = log.deltas_by_record().await.unwrap();
        assert_eq!(grouped[&a], vec![1, -1]);
        assert_eq!(grouped[&b], vec![2]);
    }
}
