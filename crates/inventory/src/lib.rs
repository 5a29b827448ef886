//! Inventory domain module.
//!
//! This crate contains business rules for inventory records, quantity
//! adjustments and voucher forms, implemented purely as deterministic domain
//! logic (no IO, no storage).

pub mod ledger;
pub mod record;
pub mod transaction;
pub mod voucher;

pub use ledger::{Discrepancy, expected_quantity, reconcile};
pub use record::{InventoryRecord, NewRecord, RecordFields, RecordOrder, normalize_part_no};
pub use transaction::{Adjustment, Source, TransactionEntry, TxKind};
pub use voucher::{CertifiedReceipt, DemandSupply, SparesIssue, Voucher, VoucherForm};
