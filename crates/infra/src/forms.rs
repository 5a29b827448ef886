//! Storage for the paper-form voucher registries.
//!
//! Each voucher kind lives in its own append-only table. The column mapping
//! is declared once per kind through [`FormTable`]; [`FormRegistry`] does the
//! rest generically.

use std::marker::PhantomData;

use chrono::Utc;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};

use stockroom_core::FormId;
use stockroom_inventory::{CertifiedReceipt, DemandSupply, SparesIssue, Voucher, VoucherForm};

use crate::db::{Database, decode_ts, encode_ts};
use crate::error::{StoreError, StoreResult};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Column mapping of a voucher kind.
pub trait FormTable: VoucherForm {
    const TABLE: &'static str;

    /// Body columns, in the order [`FormTable::bind`] binds them.
    const COLUMNS: &'static [&'static str];

    fn bind<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q>;

    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error>;
}

/// Append-only registry of one voucher kind.
#[derive(Debug)]
pub struct FormRegistry<F> {
    pool: SqlitePool,
    _kind: PhantomData<fn() -> F>,
}

impl<F> Clone for FormRegistry<F> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _kind: PhantomData,
        }
    }
}

impl<F: FormTable> FormRegistry<F> {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
            _kind: PhantomData,
        }
    }

    /// Validate and store a filled-in form.
    pub async fn save(&self, form: F) -> StoreResult<Voucher<F>> {
        let voucher = Voucher::issue(FormId::new(), form, Utc::now())?;

        let placeholders = vec!["?"; F::COLUMNS.len() + 2].join(", ");
        let sql = format!(
            "INSERT INTO {} (id, {}, created_at) VALUES ({placeholders})",
            F::TABLE,
            F::COLUMNS.join(", "),
        );

        let query = sqlx::query(&sql).bind(voucher.id.to_string());
        voucher
            .form
            .bind(query)
            .bind(encode_ts(&voucher.created_at))
            .execute(&self.pool)
            .await?;

        tracing::info!(kind = F::KIND, id = %voucher.id, "saved voucher");
        Ok(voucher)
    }

    /// Every saved voucher, newest first.
    pub async fn list(&self) -> StoreResult<Vec<Voucher<F>>> {
        let sql = format!(
            "SELECT id, {}, created_at FROM {} ORDER BY created_at DESC, rowid DESC",
            F::COLUMNS.join(", "),
            F::TABLE,
        );

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> StoreResult<Voucher<F>> {
                let id: String = row.try_get("id")?;
                let created_at: String = row.try_get("created_at")?;
                Ok(Voucher {
                    id: id
                        .parse::<FormId>()
                        .map_err(|e| StoreError::corrupt(F::TABLE, e.to_string()))?,
                    created_at: decode_ts(F::TABLE, &created_at)?,
                    form: F::from_row(row)?,
                })
            })
            .collect()
    }

    pub async fn count(&self) -> StoreResult<i64> {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", F::TABLE))
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

impl FormTable for CertifiedReceipt {
    const TABLE: &'static str = "certified_receipt";
    const COLUMNS: &'static [&'static str] = &[
        "set_no",
        "part_no",
        "item_desc",
        "denom_qty",
        "qty_received",
        "received_from",
        "received_by",
        "remarks",
    ];

    fn bind<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.set_no.clone())
            .bind(self.part_no.clone())
            .bind(self.item_desc.clone())
            .bind(self.denom_qty.clone())
            .bind(self.qty_received)
            .bind(self.received_from.clone())
            .bind(self.received_by.clone())
            .bind(self.remarks.clone())
    }

    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            set_no: row.try_get("set_no")?,
            part_no: row.try_get("part_no")?,
            item_desc: row.try_get("item_desc")?,
            denom_qty: row.try_get("denom_qty")?,
            qty_received: row.try_get("qty_received")?,
            received_from: row.try_get("received_from")?,
            received_by: row.try_get("received_by")?,
            remarks: row.try_get("remarks")?,
        })
    }
}

impl FormTable for SparesIssue {
    const TABLE: &'static str = "spares_issue";
    const COLUMNS: &'static [&'static str] = &[
        "sl_no",
        "part_no",
        "description",
        "lf_no",
        "item",
        "qty_issued",
        "balance",
        "issued_to",
        "remarks",
    ];

    fn bind<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.sl_no.clone())
            .bind(self.part_no.clone())
            .bind(self.description.clone())
            .bind(self.lf_no.clone())
            .bind(self.item.clone())
            .bind(self.qty_issued)
            .bind(self.balance)
            .bind(self.issued_to.clone())
            .bind(self.remarks.clone())
    }

    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            sl_no: row.try_get("sl_no")?,
            part_no: row.try_get("part_no")?,
            description: row.try_get("description")?,
            lf_no: row.try_get("lf_no")?,
            item: row.try_get("item")?,
            qty_issued: row.try_get("qty_issued")?,
            balance: row.try_get("balance")?,
            issued_to: row.try_get("issued_to")?,
            remarks: row.try_get("remarks")?,
        })
    }
}

impl FormTable for DemandSupply {
    const TABLE: &'static str = "demand_supply";
    const COLUMNS: &'static [&'static str] = &[
        "patt_no",
        "description",
        "mand_dept",
        "lf_no",
        "qty_req",
        "qty_held",
        "balance",
        "location",
        "remarks",
    ];

    fn bind<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(self.patt_no.clone())
            .bind(self.description.clone())
            .bind(self.mand_dept.clone())
            .bind(self.lf_no.clone())
            .bind(self.qty_req)
            .bind(self.qty_held)
            .bind(self.balance)
            .bind(self.location.clone())
            .bind(self.remarks.clone())
    }

    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            patt_no: row.try_get("patt_no")?,
            description: row.try_get("description")?,
            mand_dept: row.try_get("mand_dept")?,
            lf_no: row.try_get("lf_no")?,
            qty_req: row.try_get("qty_req")?,
            qty_held: row.try_get("qty_held")?,
            balance: row.try_get("balance")?,
            location: row.try_get("location")?,
            remarks: row.try_get("remarks")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_db;

    #[tokio::test]
    async fn receipts_are_saved_and_listed_newest_first() {
        let (_dir, db) = temp_db().await;
        let registry = FormRegistry::<CertifiedReceipt>::new(&db);

        let first = registry
            .save(CertifiedReceipt {
                part_no: Some("  P-100 ".into()),
                qty_received: Some(5),
                received_from: Some("Depot 3".into()),
                remarks: Some("   ".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(first.form.part_no.as_deref(), Some("P-100"));
        assert_eq!(first.form.remarks, None);

        let second = registry
            .save(CertifiedReceipt {
                set_no: Some("S-7".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let listed = registry.list().await.unwrap();
        assert_eq!(listed, vec![second, first]);
    }

    #[tokio::test]
    async fn form_without_identifying_field_is_rejected() {
        let (_dir, db) = temp_db().await;
        let registry = FormRegistry::<SparesIssue>::new(&db);

        let err = registry
            .save(SparesIssue {
                qty_issued: Some(2),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(registry.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn registries_are_independent() {
        let (_dir, db) = temp_db().await;
        let issues = FormRegistry::<SparesIssue>::new(&db);
        let demands = FormRegistry::<DemandSupply>::new(&db);

        let issue = issues
            .save(SparesIssue {
                part_no: Some("P-1".into()),
                qty_issued: Some(3),
                balance: Some(-1),
                issued_to: Some("Workshop".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        demands
            .save(DemandSupply {
                patt_no: Some("PT-9".into()),
                qty_req: Some(10),
                qty_held: Some(4),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(issues.list().await.unwrap(), vec![issue]);
        let listed = demands.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].form.qty_held, Some(4));
    }
}
