use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, RecordId, TransactionId};

use crate::record::normalize_part_no;

/// Direction of a quantity change, derived from the sign of the delta.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxKind {
    In,
    Out,
}

impl TxKind {
    /// `In` for positive deltas, `Out` otherwise.
    pub fn from_delta(delta: i64) -> Self {
        if delta > 0 { TxKind::In } else { TxKind::Out }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::In => "IN",
            TxKind::Out => "OUT",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "IN" => Ok(TxKind::In),
            "OUT" => Ok(TxKind::Out),
            other => Err(DomainError::validation(format!(
                "unknown transaction kind '{other}'"
            ))),
        }
    }
}

impl core::fmt::Display for TxKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an adjustment came from. Free text by convention; the two known
/// values get their own variants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Source {
    #[default]
    Manual,
    Scanner,
    Other(String),
}

impl Source {
    pub fn as_str(&self) -> &str {
        match self {
            Source::Manual => "manual",
            Source::Scanner => "scanner",
            Source::Other(s) => s,
        }
    }
}

impl From<&str> for Source {
    fn from(value: &str) -> Self {
        match value.trim() {
            "" | "manual" => Source::Manual,
            "scanner" => Source::Scanner,
            other => Source::Other(other.to_string()),
        }
    }
}

impl From<String> for Source {
    fn from(value: String) -> Self {
        Source::from(value.as_str())
    }
}

impl From<Source> for String {
    fn from(value: Source) -> Self {
        value.as_str().to_string()
    }
}

impl core::fmt::Display for Source {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to move the quantity of the record identified by `part_no`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustment {
    pub part_no: String,
    pub delta: i64,
    pub reason: String,
    pub source: Source,
}

impl Adjustment {
    pub fn new(part_no: impl Into<String>, delta: i64) -> Self {
        Self {
            part_no: part_no.into(),
            delta,
            reason: String::new(),
            source: Source::Manual,
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn source(mut self, source: impl Into<Source>) -> Self {
        self.source = source.into();
        self
    }

    /// Check the request before it touches any storage.
    pub fn validated(self) -> DomainResult<Self> {
        if self.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        Ok(Self {
            part_no: normalize_part_no(&self.part_no)?,
            delta: self.delta,
            reason: self.reason.trim().to_string(),
            source: self.source,
        })
    }
}

/// One immutable line of the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub id: TransactionId,
    pub record_id: RecordId,
    /// Part number of the record at the time of the adjustment.
    pub part_no: String,
    pub delta: i64,
    pub kind: TxKind,
    pub reason: String,
    pub source: Source,
    pub created_at: DateTime<Utc>,
}

impl TransactionEntry {
    /// Build the entry for an adjustment applied to `record_id`.
    pub fn for_adjustment(
        id: TransactionId,
        record_id: RecordId,
        adjustment: &Adjustment,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            record_id,
            part_no: adjustment.part_no.clone(),
            delta: adjustment.delta,
            kind: TxKind::from_delta(adjustment.delta),
            reason: adjustment.reason.clone(),
            source: adjustment.source.clone(),
            created_at: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_sign_of_delta() {
        assert_eq!(TxKind::from_delta(5), TxKind::In);
        assert_eq!(TxKind::from_delta(-3), TxKind::Out);
        assert_eq!(TxKind::parse("OUT").unwrap(), TxKind::Out);
        assert!(TxKind::parse("out").is_err());
    }

    #[test]
    fn source_round_trips_through_text() {
        assert_eq!(Source::from("scanner"), Source::Scanner);
        assert_eq!(Source::from(""), Source::Manual);
        assert_eq!(Source::from("import").as_str(), "import");
        assert_eq!(String::from(Source::Scanner), "scanner");
    }

    #[test]
    fn zero_delta_is_rejected() {
        let err = Adjustment::new("P-1", 0).validated().unwrap_err();
        assert_eq!(err, DomainError::validation("delta cannot be zero"));
    }

    #[test]
    fn validated_trims_key_and_reason() {
        let adj = Adjustment::new(" P-1 ", -2)
            .reason(" issue ")
            .source("scanner")
            .validated()
            .unwrap();
        assert_eq!(adj.part_no, "P-1");
        assert_eq!(adj.reason, "issue");
        assert_eq!(adj.source, Source::Scanner);
    }
}
