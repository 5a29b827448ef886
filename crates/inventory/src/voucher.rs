//! Paper-form voucher registries: certified receipt, spares issue and demand
//! on the supply office.
//!
//! Vouchers are append-only and carry no quantity reconciliation; they only
//! record what was written on the form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, FormId};

use crate::record::clean_text;

/// Common behaviour of the voucher form bodies.
pub trait VoucherForm: Clone + core::fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Stable, human-readable kind name (also used in log events).
    const KIND: &'static str;

    /// Trim text, drop blanks, and reject forms without an identifying field.
    fn normalized(self) -> DomainResult<Self>;
}

/// A saved voucher: the form body plus identity and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher<F> {
    pub id: FormId,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub form: F,
}

impl<F: VoucherForm> Voucher<F> {
    pub fn issue(id: FormId, form: F, at: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id,
            created_at: at,
            form: form.normalized()?,
        })
    }
}

/// Certified Receipt Voucher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertifiedReceipt {
    pub set_no: Option<String>,
    pub part_no: Option<String>,
    pub item_desc: Option<String>,
    pub denom_qty: Option<String>,
    pub qty_received: Option<i64>,
    pub received_from: Option<String>,
    pub received_by: Option<String>,
    pub remarks: Option<String>,
}

impl VoucherForm for CertifiedReceipt {
    const KIND: &'static str = "certified_receipt";

    fn normalized(self) -> DomainResult<Self> {
        let form = Self {
            set_no: clean_text(self.set_no),
            part_no: clean_text(self.part_no),
            item_desc: clean_text(self.item_desc),
            denom_qty: clean_text(self.denom_qty),
            qty_received: self.qty_received,
            received_from: clean_text(self.received_from),
            received_by: clean_text(self.received_by),
            remarks: clean_text(self.remarks),
        };
        if form.part_no.is_none() && form.set_no.is_none() {
            return Err(DomainError::validation(
                "certified receipt needs a part number or set number",
            ));
        }
        Ok(form)
    }
}

/// Spares Issue Voucher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparesIssue {
    pub sl_no: Option<String>,
    pub part_no: Option<String>,
    pub description: Option<String>,
    pub lf_no: Option<String>,
    pub item: Option<String>,
    pub qty_issued: Option<i64>,
    pub balance: Option<i64>,
    pub issued_to: Option<String>,
    pub remarks: Option<String>,
}

impl VoucherForm for SparesIssue {
    const KIND: &'static str = "spares_issue";

    fn normalized(self) -> DomainResult<Self> {
        let form = Self {
            sl_no: clean_text(self.sl_no),
            part_no: clean_text(self.part_no),
            description: clean_text(self.description),
            lf_no: clean_text(self.lf_no),
            item: clean_text(self.item),
            qty_issued: self.qty_issued,
            balance: self.balance,
            issued_to: clean_text(self.issued_to),
            remarks: clean_text(self.remarks),
        };
        if form.part_no.is_none() && form.sl_no.is_none() {
            return Err(DomainError::validation(
                "spares issue needs a part number or serial number",
            ));
        }
        Ok(form)
    }
}

/// Demand on the Supply Office for Naval Stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandSupply {
    pub patt_no: Option<String>,
    pub description: Option<String>,
    pub mand_dept: Option<String>,
    pub lf_no: Option<String>,
    pub qty_req: Option<i64>,
    pub qty_held: Option<i64>,
    pub balance: Option<i64>,
    pub location: Option<String>,
    pub remarks: Option<String>,
}

impl VoucherForm for DemandSupply {
    const KIND: &'static str = "demand_supply";

    fn normalized(self) -> DomainResult<Self> {
        let form = Self {
            patt_no: clean_text(self.patt_no),
            description: clean_text(self.description),
            mand_dept: clean_text(self.mand_dept),
            lf_no: clean_text(self.lf_no),
            qty_req: self.qty_req,
            qty_held: self.qty_held,
            balance: self.balance,
            location: clean_text(self.location),
            remarks: clean_text(self.remarks),
        };
        if form.patt_no.is_none() && form.description.is_none() {
            return Err(DomainError::validation(
                "demand needs a pattern number or description",
            ));
        }
        Ok(form)
    }
}
