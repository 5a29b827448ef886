//! SQLite-backed record store for inventory records.
//!
//! Reads are public. Writes are crate-private: they are reached through
//! [`LedgerService`](crate::ledger::LedgerService), the sole writer of the
//! `inventory` table.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use stockroom_core::RecordId;
use stockroom_inventory::{InventoryRecord, NewRecord, RecordFields, RecordOrder, normalize_part_no};

use crate::db::{Database, decode_ts, encode_ts};
use crate::error::{StoreError, StoreResult};

const TABLE: &str = "inventory";

const RECORD_COLUMNS: &str = r#"
    id, part_no, s_no, sl_no_contract, set_patt_no, description, denomination,
    item_type, qty_per_gt, mdnd_def, lf_no, location_bin, received_from,
    qty_received, issued_to, qty_issued, remarks, opening_quantity, quantity,
    created_at, modified_at
"#;

#[derive(Debug, Clone)]
pub struct RecordStore {
    pool: SqlitePool,
}

impl RecordStore {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Insert a new record. Fails with `DuplicateKey` if the part number is taken.
    pub(crate) async fn create(&self, input: NewRecord) -> StoreResult<InventoryRecord> {
        let record = InventoryRecord::create(RecordId::new(), input, Utc::now())?;
        let f = &record.fields;

        sqlx::query(&format!(
            r#"
            INSERT INTO inventory ({RECORD_COLUMNS})
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
            "#
        ))
        .bind(record.id.to_string())
        .bind(&f.part_no)
        .bind(&f.s_no)
        .bind(&f.sl_no_contract)
        .bind(&f.set_patt_no)
        .bind(&f.description)
        .bind(&f.denomination)
        .bind(&f.item_type)
        .bind(f.qty_per_gt)
        .bind(&f.mdnd_def)
        .bind(&f.lf_no)
        .bind(&f.location_bin)
        .bind(&f.received_from)
        .bind(f.qty_received)
        .bind(&f.issued_to)
        .bind(f.qty_issued)
        .bind(&f.remarks)
        .bind(record.opening_quantity)
        .bind(record.quantity)
        .bind(encode_ts(&record.created_at))
        .bind(encode_ts(&record.modified_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx_with_key(e, &f.part_no))?;

        tracing::info!(
            record_id = %record.id,
            part_no = %f.part_no,
            quantity = record.quantity,
            "created inventory record"
        );

        Ok(record)
    }

    pub async fn get_by_id(&self, id: RecordId) -> StoreResult<Option<InventoryRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM inventory WHERE id = ?1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    pub async fn get_by_key(&self, part_no: &str) -> StoreResult<Option<InventoryRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM inventory WHERE part_no = ?1"
        ))
        .bind(part_no.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// Every record, fully materialized.
    pub async fn list_all(&self, order: RecordOrder) -> StoreResult<Vec<InventoryRecord>> {
        let order_by = match order {
            RecordOrder::CreatedDesc => "created_at DESC, rowid DESC",
            RecordOrder::NameAsc => {
                "COALESCE(description, part_no) COLLATE NOCASE ASC, part_no ASC"
            }
        };

        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM inventory ORDER BY {order_by}"
        ))
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(count = rows.len(), ?order, "listed inventory records");
        rows.iter().map(record_from_row).collect()
    }

    /// Overwrite every descriptive field (including the part number).
    ///
    /// The quantity columns are never written here; quantities only move
    /// through ledger adjustments.
    pub(crate) async fn update(
        &self,
        id: RecordId,
        fields: RecordFields,
    ) -> StoreResult<InventoryRecord> {
        let f = fields.normalized()?;
        let now = Utc::now();

        let row = sqlx::query(&format!(
            r#"
            UPDATE inventory
            SET part_no = ?2, s_no = ?3, sl_no_contract = ?4, set_patt_no = ?5,
                description = ?6, denomination = ?7, item_type = ?8, qty_per_gt = ?9,
                mdnd_def = ?10, lf_no = ?11, location_bin = ?12, received_from = ?13,
                qty_received = ?14, issued_to = ?15, qty_issued = ?16, remarks = ?17,
                modified_at = ?18
            WHERE id = ?1
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(id.to_string())
        .bind(&f.part_no)
        .bind(&f.s_no)
        .bind(&f.sl_no_contract)
        .bind(&f.set_patt_no)
        .bind(&f.description)
        .bind(&f.denomination)
        .bind(&f.item_type)
        .bind(f.qty_per_gt)
        .bind(&f.mdnd_def)
        .bind(&f.lf_no)
        .bind(&f.location_bin)
        .bind(&f.received_from)
        .bind(f.qty_received)
        .bind(&f.issued_to)
        .bind(f.qty_issued)
        .bind(&f.remarks)
        .bind(encode_ts(&now))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx_with_key(e, &f.part_no))?;

        let record = match row {
            Some(row) => record_from_row(&row)?,
            None => return Err(StoreError::not_found(format!("record {id}"))),
        };

        tracing::info!(record_id = %id, part_no = %record.fields.part_no, "updated inventory record");
        Ok(record)
    }

    /// Hard delete. A missing id (including an already deleted one) is `NotFound`.
    pub(crate) async fn delete(&self, id: RecordId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM inventory WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("record {id}")));
        }

        tracing::info!(record_id = %id, "deleted inventory record");
        Ok(())
    }

    /// Case-insensitive substring search over part number and description.
    ///
    /// `%` and `_` in the term match literally. Case folding follows SQLite's
    /// `lower()`, which covers ASCII letters. A blank term matches nothing.
    pub async fn search(&self, term: &str) -> StoreResult<Vec<InventoryRecord>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let pattern = format!("%{}%", escape_like(&term.to_ascii_lowercase()));

        let rows = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM inventory
            WHERE lower(part_no) LIKE ?1 ESCAPE '\'
               OR lower(COALESCE(description, '')) LIKE ?1 ESCAPE '\'
            ORDER BY created_at DESC, rowid DESC
            "#
        ))
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(term, count = rows.len(), "searched inventory records");
        rows.iter().map(record_from_row).collect()
    }

    pub async fn count(&self) -> StoreResult<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inventory")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

/// Take the write lock on the record with `part_no` by bumping `modified_at`,
/// and return the record as stored. `None` if no such record exists.
///
/// Meant to be the first statement of a write transaction, so the lock is
/// held before anything is read.
pub(crate) async fn lock_by_key(
    conn: &mut SqliteConnection,
    part_no: &str,
    at: &DateTime<Utc>,
) -> StoreResult<Option<InventoryRecord>> {
    let part_no = normalize_part_no(part_no)?;

    let row = sqlx::query(&format!(
        r#"
        UPDATE inventory
        SET modified_at = ?2
        WHERE part_no = ?1
        RETURNING {RECORD_COLUMNS}
        "#
    ))
    .bind(&part_no)
    .bind(encode_ts(at))
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(record_from_row).transpose()
}

/// Persist a new quantity for a locked record.
pub(crate) async fn store_quantity(
    conn: &mut SqliteConnection,
    id: RecordId,
    quantity: i64,
) -> StoreResult<()> {
    let result = sqlx::query("UPDATE inventory SET quantity = ?2 WHERE id = ?1")
        .bind(id.to_string())
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() != 1 {
        return Err(StoreError::InvariantViolation(format!(
            "record {id} vanished during adjustment"
        )));
    }
    Ok(())
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Map a database row into an `InventoryRecord`.
fn record_from_row(row: &SqliteRow) -> StoreResult<InventoryRecord> {
    let id_str: String = row.try_get("id")?;
    let id = id_str
        .parse::<RecordId>()
        .map_err(|e| StoreError::corrupt(TABLE, e.to_string()))?;

    let created_at: String = row.try_get("created_at")?;
    let modified_at: String = row.try_get("modified_at")?;

    Ok(InventoryRecord {
        id,
        fields: RecordFields {
            part_no: row.try_get("part_no")?,
            s_no: row.try_get("s_no")?,
            sl_no_contract: row.try_get("sl_no_contract")?,
            set_patt_no: row.try_get("set_patt_no")?,
            description: row.try_get("description")?,
            denomination: row.try_get("denomination")?,
            item_type: row.try_get("item_type")?,
            qty_per_gt: row.try_get("qty_per_gt")?,
            mdnd_def: row.try_get("mdnd_def")?,
            lf_no: row.try_get("lf_no")?,
            location_bin: row.try_get("location_bin")?,
            received_from: row.try_get("received_from")?,
            qty_received: row.try_get("qty_received")?,
            issued_to: row.try_get("issued_to")?,
            qty_issued: row.try_get("qty_issued")?,
            remarks: row.try_get("remarks")?,
        },
        opening_quantity: row.try_get("opening_quantity")?,
        quantity: row.try_get("quantity")?,
        created_at: decode_ts(TABLE, &created_at)?,
        modified_at: decode_ts(TABLE, &modified_at)?,
    })
}
