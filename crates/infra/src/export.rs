//! CSV reports over inventory records and the transaction log.

use std::io;

use serde::Serialize;

use stockroom_inventory::{InventoryRecord, TransactionEntry};

use crate::db::encode_ts;
use crate::error::StoreResult;

const INVENTORY_HEADER: &[&str] = &[
    "id",
    "part_no",
    "s_no",
    "sl_no_contract",
    "set_patt_no",
    "description",
    "denomination",
    "item_type",
    "qty_per_gt",
    "mdnd_def",
    "lf_no",
    "location_bin",
    "received_from",
    "qty_received",
    "issued_to",
    "qty_issued",
    "remarks",
    "opening_quantity",
    "quantity",
    "created_at",
    "modified_at",
];

const TRANSACTION_HEADER: &[&str] = &[
    "id",
    "record_id",
    "part_no",
    "delta",
    "tx_type",
    "reason",
    "source",
    "created_at",
];

#[derive(Serialize)]
struct InventoryRow<'a> {
    id: String,
    part_no: &'a str,
    s_no: Option<&'a str>,
    sl_no_contract: Option<&'a str>,
    set_patt_no: Option<&'a str>,
    description: Option<&'a str>,
    denomination: Option<&'a str>,
    item_type: Option<&'a str>,
    qty_per_gt: Option<i64>,
    mdnd_def: Option<&'a str>,
    lf_no: Option<&'a str>,
    location_bin: Option<&'a str>,
    received_from: Option<&'a str>,
    qty_received: Option<i64>,
    issued_to: Option<&'a str>,
    qty_issued: Option<i64>,
    remarks: Option<&'a str>,
    opening_quantity: i64,
    quantity: i64,
    created_at: String,
    modified_at: String,
}

impl<'a> From<&'a InventoryRecord> for InventoryRow<'a> {
    fn from(r: &'a InventoryRecord) -> Self {
        let f = &r.fields;
        Self {
            id: r.id.to_string(),
            part_no: &f.part_no,
            s_no: f.s_no.as_deref(),
            sl_no_contract: f.sl_no_contract.as_deref(),
            set_patt_no: f.set_patt_no.as_deref(),
            description: f.description.as_deref(),
            denomination: f.denomination.as_deref(),
            item_type: f.item_type.as_deref(),
            qty_per_gt: f.qty_per_gt,
            mdnd_def: f.mdnd_def.as_deref(),
            lf_no: f.lf_no.as_deref(),
            location_bin: f.location_bin.as_deref(),
            received_from: f.received_from.as_deref(),
            qty_received: f.qty_received,
            issued_to: f.issued_to.as_deref(),
            qty_issued: f.qty_issued,
            remarks: f.remarks.as_deref(),
            opening_quantity: r.opening_quantity,
            quantity: r.quantity,
            created_at: encode_ts(&r.created_at),
            modified_at: encode_ts(&r.modified_at),
        }
    }
}

#[derive(Serialize)]
struct TransactionRow<'a> {
    id: String,
    record_id: String,
    part_no: &'a str,
    delta: i64,
    tx_type: &'static str,
    reason: &'a str,
    source: &'a str,
    created_at: String,
}

impl<'a> From<&'a TransactionEntry> for TransactionRow<'a> {
    fn from(e: &'a TransactionEntry) -> Self {
        Self {
            id: e.id.to_string(),
            record_id: e.record_id.to_string(),
            part_no: &e.part_no,
            delta: e.delta,
            tx_type: e.kind.as_str(),
            reason: &e.reason,
            source: e.source.as_str(),
            created_at: encode_ts(&e.created_at),
        }
    }
}

/// Header first, then one row per item. The header is written even when
/// there are no rows.
fn write_rows<W, R>(writer: W, header: &[&str], rows: impl IntoIterator<Item = R>) -> StoreResult<usize>
where
    W: io::Write,
    R: Serialize,
{
    let mut out = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    out.write_record(header)?;
    let mut n = 0;
    for row in rows {
        out.serialize(row)?;
        n += 1;
    }
    out.flush()?;

    Ok(n)
}

/// Write inventory records as CSV; returns the number of data rows.
pub fn export_inventory_csv<W: io::Write>(
    records: &[InventoryRecord],
    writer: W,
) -> StoreResult<usize> {
    let n = write_rows(writer, INVENTORY_HEADER, records.iter().map(InventoryRow::from))?;
    tracing::info!(rows = n, "exported inventory csv");
    Ok(n)
}

/// Write transaction log entries as CSV; returns the number of data rows.
pub fn export_transactions_csv<W: io::Write>(
    entries: &[TransactionEntry],
    writer: W,
) -> StoreResult<usize> {
    let n = write_rows(writer, TRANSACTION_HEADER, entries.iter().map(TransactionRow::from))?;
    tracing::info!(rows = n, "exported transactions csv");
    Ok(n)
}
