//! Text and JSON rendering of command results.

use std::fmt::Write as _;

use serde::Serialize;

use stockroom_infra::migrations::AppliedMigration;
use stockroom_inventory::{
    CertifiedReceipt, DemandSupply, Discrepancy, InventoryRecord, SparesIssue, TransactionEntry,
    Voucher,
};

use crate::cli::OutputFormat;

#[derive(Debug, Clone, Copy)]
pub struct Output {
    format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print `value` as JSON, or the text rendering produced by `text`.
    pub fn emit<T>(&self, value: &T, text: impl FnOnce(&T) -> String) -> anyhow::Result<()>
    where
        T: Serialize + ?Sized,
    {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Text => {
                let rendered = text(value);
                if !rendered.is_empty() {
                    println!("{}", rendered.trim_end());
                }
            }
        }
        Ok(())
    }
}

pub fn record(r: &InventoryRecord) -> String {
    let f = &r.fields;
    let mut s = String::new();
    let _ = writeln!(s, "{}  (id {})", f.part_no, r.id);
    let _ = writeln!(s, "  quantity:     {} (opening {})", r.quantity, r.opening_quantity);
    let rows = [
        ("s no", f.s_no.as_deref()),
        ("sl no/contract", f.sl_no_contract.as_deref()),
        ("set/patt no", f.set_patt_no.as_deref()),
        ("description", f.description.as_deref()),
        ("denomination", f.denomination.as_deref()),
        ("item type", f.item_type.as_deref()),
        ("mdnd def", f.mdnd_def.as_deref()),
        ("lf no", f.lf_no.as_deref()),
        ("location/bin", f.location_bin.as_deref()),
        ("received from", f.received_from.as_deref()),
        ("issued to", f.issued_to.as_deref()),
        ("remarks", f.remarks.as_deref()),
    ];
    for (label, value) in rows {
        if let Some(v) = value {
            let _ = writeln!(s, "  {:<13} {v}", format!("{label}:"));
        }
    }
    let numbers = [
        ("qty per gt", f.qty_per_gt),
        ("qty received", f.qty_received),
        ("qty issued", f.qty_issued),
    ];
    for (label, value) in numbers {
        if let Some(v) = value {
            let _ = writeln!(s, "  {:<13} {v}", format!("{label}:"));
        }
    }
    let _ = writeln!(s, "  created:      {}", r.created_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(s, "  modified:     {}", r.modified_at.format("%Y-%m-%d %H:%M:%S"));
    s
}

pub fn record_table(records: &[InventoryRecord]) -> String {
    if records.is_empty() {
        return "no records".to_string();
    }
    let mut s = String::new();
    let _ = writeln!(s, "{:<20} {:>10}  {:<12} DESCRIPTION", "PART NO", "QTY", "LOCATION");
    for r in records {
        let _ = writeln!(
            s,
            "{:<20} {:>10}  {:<12} {}",
            r.fields.part_no,
            r.quantity,
            r.fields.location_bin.as_deref().unwrap_or("-"),
            r.fields.description.as_deref().unwrap_or(""),
        );
    }
    s
}

pub fn entry(e: &TransactionEntry) -> String {
    format!(
        "{}  {:<20} {:>+8} {:<3}  {:<8} {}",
        e.created_at.format("%Y-%m-%d %H:%M:%S"),
        e.part_no,
        e.delta,
        e.kind,
        e.source,
        e.reason,
    )
}

pub fn entry_table(entries: &[TransactionEntry]) -> String {
    if entries.is_empty() {
        return "no transactions".to_string();
    }
    entries.iter().map(entry).collect::<Vec<_>>().join("\n")
}

pub fn discrepancies(found: &[Discrepancy]) -> String {
    if found.is_empty() {
        return "ledger consistent".to_string();
    }
    let mut s = String::new();
    for d in found {
        let _ = writeln!(
            s,
            "{}: recorded {} but log implies {}",
            d.part_no,
            d.recorded,
            d.expected,
        );
    }
    s
}

pub fn migrations(applied: &[AppliedMigration]) -> String {
    if applied.is_empty() {
        return "schema up to date".to_string();
    }
    applied
        .iter()
        .map(|m| format!("applied {:>3} {}", m.version, m.name))
        .collect::<Vec<_>>()
        .join("\n")
}

fn opt(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("-")
}

fn num(v: Option<i64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn receipts(list: &[Voucher<CertifiedReceipt>]) -> String {
    if list.is_empty() {
        return "no receipts".to_string();
    }
    list.iter()
        .map(|v| {
            let f = &v.form;
            format!(
                "{}  set {} part {} qty {} from {} by {}  {}",
                v.created_at.format("%Y-%m-%d"),
                opt(&f.set_no),
                opt(&f.part_no),
                num(f.qty_received),
                opt(&f.received_from),
                opt(&f.received_by),
                opt(&f.item_desc),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn issues(list: &[Voucher<SparesIssue>]) -> String {
    if list.is_empty() {
        return "no issues".to_string();
    }
    list.iter()
        .map(|v| {
            let f = &v.form;
            format!(
                "{}  sl {} part {} qty {} balance {} to {}  {}",
                v.created_at.format("%Y-%m-%d"),
                opt(&f.sl_no),
                opt(&f.part_no),
                num(f.qty_issued),
                num(f.balance),
                opt(&f.issued_to),
                opt(&f.description),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn demands(list: &[Voucher<DemandSupply>]) -> String {
    if list.is_empty() {
        return "no demands".to_string();
    }
    list.iter()
        .map(|v| {
            let f = &v.form;
            format!(
                "{}  patt {} req {} held {} balance {} dept {}  {}",
                v.created_at.format("%Y-%m-%d"),
                opt(&f.patt_no),
                num(f.qty_req),
                num(f.qty_held),
                num(f.balance),
                opt(&f.mand_dept),
                opt(&f.description),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
