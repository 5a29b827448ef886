//! Ledger service: the only writer of record quantities and the transaction log.
//!
//! `adjust` runs the quantity update and the log append in one SQLite
//! transaction. The transaction opens with a write (`lock_by_key`), so the
//! write lock is held before the current quantity is read; a concurrent writer
//! waits on the busy timeout instead of racing.

use chrono::Utc;

use stockroom_core::{RecordId, TransactionId};
use stockroom_inventory::{
    Adjustment, Discrepancy, InventoryRecord, NewRecord, RecordFields, RecordOrder,
    TransactionEntry, reconcile,
};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::record_store::{self, RecordStore};
use crate::transaction_log::{self, TransactionLog};

#[derive(Debug, Clone)]
pub struct LedgerService {
    db: Database,
    records: RecordStore,
    log: TransactionLog,
}

impl LedgerService {
    pub fn new(db: &Database) -> Self {
        Self {
            db: db.clone(),
            records: RecordStore::new(db),
            log: TransactionLog::new(db),
        }
    }

    /// Read access to the record store.
    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// Read access to the transaction log.
    pub fn transactions(&self) -> &TransactionLog {
        &self.log
    }

    pub async fn create(&self, input: NewRecord) -> StoreResult<InventoryRecord> {
        self.records.create(input).await
    }

    pub async fn get_by_id(&self, id: RecordId) -> StoreResult<Option<InventoryRecord>> {
        self.records.get_by_id(id).await
    }

    pub async fn get_by_key(&self, part_no: &str) -> StoreResult<Option<InventoryRecord>> {
        self.records.get_by_key(part_no).await
    }

    pub async fn list_all(&self, order: RecordOrder) -> StoreResult<Vec<InventoryRecord>> {
        self.records.list_all(order).await
    }

    pub async fn update(&self, id: RecordId, fields: RecordFields) -> StoreResult<InventoryRecord> {
        self.records.update(id, fields).await
    }

    /// Hard delete. The record's log entries stay as audit trail.
    pub async fn delete(&self, id: RecordId) -> StoreResult<()> {
        self.records.delete(id).await
    }

    pub async fn search(&self, term: &str) -> StoreResult<Vec<InventoryRecord>> {
        self.records.search(term).await
    }

    pub async fn list_recent(&self, limit: u32) -> StoreResult<Vec<TransactionEntry>> {
        self.log.list_recent(limit).await
    }

    /// Log entries of the record currently holding `part_no`, newest first.
    pub async fn history(&self, part_no: &str, limit: u32) -> StoreResult<Vec<TransactionEntry>> {
        let record = self
            .records
            .get_by_key(part_no)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("part number {}", part_no.trim())))?;
        self.log.list_for_record(record.id, limit).await
    }

    /// Apply `delta` to the record with the given part number and log it.
    ///
    /// Both writes commit together or not at all. An unknown part number is
    /// `NotFound` and leaves the log untouched; a zero delta is `Validation`.
    pub async fn adjust(&self, adjustment: Adjustment) -> StoreResult<TransactionEntry> {
        let adjustment = adjustment.validated()?;
        let now = Utc::now();

        let mut tx = self.db.pool().begin().await?;

        let Some(mut record) = record_store::lock_by_key(&mut *tx, &adjustment.part_no, &now).await?
        else {
            tx.rollback().await?;
            tracing::warn!(
                part_no = %adjustment.part_no,
                delta = adjustment.delta,
                "adjustment rejected: unknown part number"
            );
            return Err(StoreError::not_found(format!(
                "part number {}",
                adjustment.part_no
            )));
        };

        // Dropping `tx` on any error below rolls both writes back.
        let entry = record.apply_adjustment(&adjustment, TransactionId::new(), now)?;
        record_store::store_quantity(&mut *tx, record.id, record.quantity).await?;
        transaction_log::append(&mut *tx, &entry).await?;

        tx.commit().await?;

        tracing::info!(
            record_id = %record.id,
            part_no = %entry.part_no,
            delta = entry.delta,
            kind = %entry.kind,
            source = %entry.source,
            quantity = record.quantity,
            "adjusted quantity"
        );

        Ok(entry)
    }

    /// Check every record against its log. An empty result means the ledger
    /// is consistent.
    pub async fn reconcile(&self) -> StoreResult<Vec<Discrepancy>> {
        let records = self.records.list_all(RecordOrder::CreatedDesc).await?;
        let mut deltas = self.log.deltas_by_record().await?;

        let discrepancies: Vec<Discrepancy> = records
            .iter()
            .filter_map(|r| reconcile(r, deltas.remove(&r.id).unwrap_or_default()))
            .collect();

        if discrepancies.is_empty() {
            tracing::info!(records = records.len(), "ledger reconciled");
        } else {
            tracing::warn!(
                records = records.len(),
                discrepancies = discrepancies.len(),
                "ledger out of balance"
            );
        }

        Ok(discrepancies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::test_support::temp_db;
    use crate::transaction_log::DEFAULT_LIMIT;
    use proptest::prelude::*;
    use stockroom_inventory::{Source, TxKind};

    fn item(part_no: &str, qty: i64) -> NewRecord {
        NewRecord::new(RecordFields::with_part_no(part_no), qty)
    }

    #[tokio::test]
    async fn receipt_then_issue_scenario() {
        let (_dir, db) = temp_db().await;
        let ledger = LedgerService::new(&db);

        ledger.create(item("P-100", 10)).await.unwrap();
        ledger
            .adjust(Adjustment::new("P-100", 5).reason("receipt"))
            .await
            .unwrap();
        ledger
            .adjust(Adjustment::new("P-100", -3).reason("issue"))
            .await
            .unwrap();

        let rec = ledger.get_by_key("P-100").await.unwrap().unwrap();
        assert_eq!(rec.quantity, 12);
        assert_eq!(rec.opening_quantity, 10);

        let log = ledger.list_recent(DEFAULT_LIMIT).await.unwrap();
        let summary: Vec<(i64, TxKind, &str)> = log
            .iter()
            .map(|e| (e.delta, e.kind, e.reason.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![(-3, TxKind::Out, "issue"), (5, TxKind::In, "receipt")]
        );
        assert!(log.iter().all(|e| e.record_id == rec.id));
        assert!(ledger.reconcile().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn adjusting_missing_key_changes_nothing() {
        let (_dir, db) = temp_db().await;
        let ledger = LedgerService::new(&db);
        ledger.create(item("P-100", 10)).await.unwrap();
        ledger.adjust(Adjustment::new("P-100", 1)).await.unwrap();

        let err = ledger
            .adjust(Adjustment::new("P-999", 4).source("scanner"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        assert_eq!(ledger.transactions().count().await.unwrap(), 1);
        assert_eq!(ledger.records().count().await.unwrap(), 1);
        assert!(ledger.get_by_key("P-999").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn zero_delta_is_validation_error() {
        let (_dir, db) = temp_db().await;
        let ledger = LedgerService::new(&db);
        ledger.create(item("P-1", 1)).await.unwrap();

        let err = ledger.adjust(Adjustment::new("P-1", 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(ledger.transactions().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn overflow_rolls_back_both_writes() {
        let (_dir, db) = temp_db().await;
        let ledger = LedgerService::new(&db);
        let rec = ledger.create(item("P-1", i64::MAX - 1)).await.unwrap();

        let err = ledger.adjust(Adjustment::new("P-1", 5)).await.unwrap_err();
        assert!(matches!(err, StoreError::InvariantViolation(_)));

        let after = ledger.get_by_id(rec.id).await.unwrap().unwrap();
        assert_eq!(after.quantity, i64::MAX - 1);
        assert_eq!(after.modified_at, rec.modified_at);
        assert_eq!(ledger.transactions().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn log_follows_record_across_key_change() {
        let (_dir, db) = temp_db().await;
        let ledger = LedgerService::new(&db);
        let rec = ledger.create(item("OLD-1", 0)).await.unwrap();

        ledger.adjust(Adjustment::new("OLD-1", 4)).await.unwrap();
        ledger
            .update(rec.id, RecordFields::with_part_no("NEW-1"))
            .await
            .unwrap();
        ledger
            .adjust(Adjustment::new("NEW-1", -1).source(Source::Scanner))
            .await
            .unwrap();

        let history = ledger.history("NEW-1", DEFAULT_LIMIT).await.unwrap();
        let keys: Vec<&str> = history.iter().map(|e| e.part_no.as_str()).collect();
        assert_eq!(keys, vec!["NEW-1", "OLD-1"]);
        assert_eq!(history[0].source, Source::Scanner);
        assert!(ledger.reconcile().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_keeps_audit_trail() {
        let (_dir, db) = temp_db().await;
        let ledger = LedgerService::new(&db);
        let rec = ledger.create(item("P-1", 2)).await.unwrap();
        ledger.adjust(Adjustment::new("P-1", 3)).await.unwrap();

        ledger.delete(rec.id).await.unwrap();

        assert!(ledger.get_by_id(rec.id).await.unwrap().is_none());
        assert!(matches!(
            ledger.delete(rec.id).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
        assert_eq!(ledger.transactions().count().await.unwrap(), 1);
        assert!(matches!(
            ledger.adjust(Adjustment::new("P-1", 1)).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn reconcile_detects_out_of_band_edits() {
        let (_dir, db) = temp_db().await;
        let ledger = LedgerService::new(&db);
        let rec = ledger.create(item("P-1", 5)).await.unwrap();
        ledger.adjust(Adjustment::new("P-1", 2)).await.unwrap();

        sqlx::query("UPDATE inventory SET quantity = 100 WHERE id = ?1")
            .bind(rec.id.to_string())
            .execute(db.pool())
            .await
            .unwrap();

        let found = ledger.reconcile().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].record_id, rec.id);
        assert_eq!(found[0].recorded, 100);
        assert_eq!(found[0].expected, 7);
    }

    #[tokio::test]
    async fn concurrent_adjustments_all_land() {
        let (_dir, db) = temp_db().await;
        let ledger = LedgerService::new(&db);
        ledger.create(item("P-1", 0)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16i64 {
            let ledger = ledger.clone();
            let delta = if i % 2 == 0 { 3 } else { -1 };
            handles.push(tokio::spawn(async move {
                ledger.adjust(Adjustment::new("P-1", delta)).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let rec = ledger.get_by_key("P-1").await.unwrap().unwrap();
        assert_eq!(rec.quantity, 8 * 3 - 8);
        assert_eq!(ledger.transactions().count().await.unwrap(), 16);
        assert!(ledger.reconcile().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn locked_database_is_store_unavailable() {
        let (_dir, db) = temp_db().await;
        LedgerService::new(&db).create(item("P-1", 5)).await.unwrap();

        let impatient = Database::open(&DatabaseConfig {
            busy_timeout_seconds: 0,
            ..DatabaseConfig::at(db.path())
        })
        .await
        .unwrap();
        let ledger = LedgerService::new(&impatient);

        let mut held = db.pool().begin().await.unwrap();
        sqlx::query("UPDATE inventory SET remarks = 'counting' WHERE part_no = 'P-1'")
            .execute(&mut *held)
            .await
            .unwrap();

        let err = ledger.adjust(Adjustment::new("P-1", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::StoreUnavailable(_)), "{err:?}");

        held.rollback().await.unwrap();
        assert_eq!(ledger.transactions().count().await.unwrap(), 0);
        assert_eq!(ledger.get_by_key("P-1").await.unwrap().unwrap().quantity, 5);
        impatient.close().await;
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 16,
            ..ProptestConfig::default()
        })]

        /// Property: any sequence of adjustments on one record leaves
        /// quantity = q0 + Σd and a log of exactly those deltas, newest first.
        #[test]
        fn stored_quantity_tracks_log(
            q0 in -1_000i64..1_000i64,
            deltas in prop::collection::vec(
                (-50i64..50i64).prop_filter("non-zero", |d| *d != 0),
                1..12,
            )
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (quantity, logged) = rt.block_on(async {
                let (_dir, db) = temp_db().await;
                let ledger = LedgerService::new(&db);
                ledger.create(item("P-PROP", q0)).await.unwrap();
                for d in &deltas {
                    ledger.adjust(Adjustment::new("P-PROP", *d)).await.unwrap();
                }
                let rec = ledger.get_by_key("P-PROP").await.unwrap().unwrap();
                let logged: Vec<i64> = ledger
                    .history("P-PROP", DEFAULT_LIMIT)
                    .await
                    .unwrap()
                    .iter()
                    .map(|e| e.delta)
                    .collect();
                db.close().await;
                (rec.quantity, logged)
            });

            prop_assert_eq!(quantity, q0 + deltas.iter().sum::<i64>());
            let mut expected = deltas.clone();
            expected.reverse();
            prop_assert_eq!(logged, expected);
        }
    }
}
