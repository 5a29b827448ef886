use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, RecordId};

/// Longest part number accepted by [`normalize_part_no`].
pub const MAX_PART_NO_LEN: usize = 64;

/// Descriptive, freely editable fields of an inventory record.
///
/// Everything except `part_no` is optional. Text fields are normalized by
/// [`RecordFields::normalized`]: surrounding whitespace is trimmed and blank
/// values become `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFields {
    pub part_no: String,
    pub s_no: Option<String>,
    pub sl_no_contract: Option<String>,
    pub set_patt_no: Option<String>,
    pub description: Option<String>,
    pub denomination: Option<String>,
    pub item_type: Option<String>,
    pub qty_per_gt: Option<i64>,
    pub mdnd_def: Option<String>,
    pub lf_no: Option<String>,
    pub location_bin: Option<String>,
    pub received_from: Option<String>,
    pub qty_received: Option<i64>,
    pub issued_to: Option<String>,
    pub qty_issued: Option<i64>,
    pub remarks: Option<String>,
}

impl RecordFields {
    /// Fields with only a part number set.
    pub fn with_part_no(part_no: impl Into<String>) -> Self {
        Self {
            part_no: part_no.into(),
            ..Self::default()
        }
    }

    /// Validate the key and normalize every text field.
    pub fn normalized(self) -> DomainResult<Self> {
        Ok(Self {
            part_no: normalize_part_no(&self.part_no)?,
            s_no: clean_text(self.s_no),
            sl_no_contract: clean_text(self.sl_no_contract),
            set_patt_no: clean_text(self.set_patt_no),
            description: clean_text(self.description),
            denomination: clean_text(self.denomination),
            item_type: clean_text(self.item_type),
            qty_per_gt: self.qty_per_gt,
            mdnd_def: clean_text(self.mdnd_def),
            lf_no: clean_text(self.lf_no),
            location_bin: clean_text(self.location_bin),
            received_from: clean_text(self.received_from),
            qty_received: self.qty_received,
            issued_to: clean_text(self.issued_to),
            qty_issued: self.qty_issued,
            remarks: clean_text(self.remarks),
        })
    }
}

/// Input of the create operation: descriptive fields plus the opening quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub fields: RecordFields,
    pub quantity: i64,
}

impl NewRecord {
    pub fn new(fields: RecordFields, quantity: i64) -> Self {
        Self { fields, quantity }
    }
}

/// An inventory item/part as stored in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: RecordId,
    pub fields: RecordFields,
    /// Quantity given at creation; never changes afterwards.
    pub opening_quantity: i64,
    /// Current quantity: `opening_quantity` plus every logged delta.
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// Build a brand-new record from validated input.
    pub fn create(id: RecordId, input: NewRecord, at: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id,
            fields: input.fields.normalized()?,
            opening_quantity: input.quantity,
            quantity: input.quantity,
            created_at: at,
            modified_at: at,
        })
    }

    pub fn part_no(&self) -> &str {
        &self.fields.part_no
    }
}

/// Ordering of a full record listing.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOrder {
    /// Newest first.
    #[default]
    CreatedDesc,
    /// Description ascending (case-insensitive), then part number.
    NameAsc,
}

/// Validate and normalize a part number (the business key).
pub fn normalize_part_no(raw: &str) -> DomainResult<String> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(DomainError::validation("part number cannot be empty"));
    }
    if key.chars().count() > MAX_PART_NO_LEN {
        return Err(DomainError::validation(format!(
            "part number longer than {MAX_PART_NO_LEN} characters"
        )));
    }
    if key.chars().any(char::is_control) {
        return Err(DomainError::validation(
            "part number cannot contain control characters",
        ));
    }
    Ok(key.to_string())
}

pub(crate) fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn create_sets_opening_and_current_quantity() {
        let rec = InventoryRecord::create(
            RecordId::new(),
            NewRecord::new(RecordFields::with_part_no("P-100"), 10),
            at(),
        )
        .unwrap();
        assert_eq!(rec.opening_quantity, 10);
        assert_eq!(rec.quantity, 10);
        assert_eq!(rec.created_at, rec.modified_at);
    }

    #[test]
    fn part_no_is_trimmed_and_required() {
        assert_eq!(normalize_part_no("  P-1 ").unwrap(), "P-1");
        assert!(matches!(
            normalize_part_no("   "),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            normalize_part_no("P\t1"),
            Err(DomainError::Validation(_))
        ));
        let long = "X".repeat(MAX_PART_NO_LEN + 1);
        assert!(normalize_part_no(&long).is_err());
    }

    #[test]
    fn blank_text_fields_become_none() {
        let fields = RecordFields {
            description: Some("  ".into()),
            remarks: Some(" keep dry ".into()),
            ..RecordFields::with_part_no("P-2")
        }
        .normalized()
        .unwrap();
        assert_eq!(fields.description, None);
        assert_eq!(fields.remarks.as_deref(), Some("keep dry"));
    }
}
