//! Quantity/transaction reconciliation rules.
//!
//! The store applies adjustments with SQL, but the arithmetic and the
//! reconciliation check live here so they can be reasoned about (and
//! property-tested) without a database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, RecordId, TransactionId};

use crate::record::InventoryRecord;
use crate::transaction::{Adjustment, TransactionEntry};

impl InventoryRecord {
    /// Apply a validated adjustment to this record and return the matching
    /// log entry.
    ///
    /// The record and the entry always move together: on error neither the
    /// quantity nor `modified_at` changes.
    pub fn apply_adjustment(
        &mut self,
        adjustment: &Adjustment,
        entry_id: TransactionId,
        at: DateTime<Utc>,
    ) -> DomainResult<TransactionEntry> {
        if adjustment.part_no != self.part_no() {
            return Err(DomainError::invariant("part_no mismatch"));
        }
        if adjustment.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        let quantity = self
            .quantity
            .checked_add(adjustment.delta)
            .ok_or_else(|| DomainError::invariant("quantity overflow"))?;

        self.quantity = quantity;
        self.modified_at = at;

        Ok(TransactionEntry::for_adjustment(
            entry_id, self.id, adjustment, at,
        ))
    }
}

/// A record whose quantity disagrees with its transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub record_id: RecordId,
    pub part_no: String,
    pub recorded: i64,
    pub expected: i64,
}

/// Quantity implied by an opening balance plus a set of deltas.
///
/// `None` if the sum does not fit into an `i64`.
pub fn expected_quantity(opening: i64, deltas: impl IntoIterator<Item = i64>) -> Option<i64> {
    deltas
        .into_iter()
        .try_fold(opening, |acc, d| acc.checked_add(d))
}

/// Compare a record with the deltas logged for it.
pub fn reconcile(
    record: &InventoryRecord,
    deltas: impl IntoIterator<Item = i64>,
) -> Option<Discrepancy> {
    let expected = expected_quantity(record.opening_quantity, deltas);
    if expected == Some(record.quantity) {
        return None;
    }
    Some(Discrepancy {
        record_id: record.id,
        part_no: record.fields.part_no.clone(),
        recorded: record.quantity,
        // An overflowing log can never match a stored quantity.
        expected: expected.unwrap_or(i64::MAX),
    })
}
