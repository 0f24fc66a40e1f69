//! Canonical permit schema and shared ingestion types for DPT.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

mod alias;
mod table;

pub use alias::{AliasTable, AliasTableError, ColumnLookup};
pub use table::{RawRecord, Table};

pub const CRATE_NAME: &str = "dpt-core";

pub const DEFAULT_STATUS: &str = "Pending";
pub const UNKNOWN_PERMIT_TYPE: &str = "Unknown";
pub const UNKNOWN_OPERATOR: &str = "Unknown Operator";
pub const UNKNOWN_COUNTY_PARISH: &str = "Unknown";
pub const UNKNOWN_WELL_NAME: &str = "Unknown Well";

pub const DAYS_TO_EXPIRY_COLUMN: &str = "days_to_expiry";
pub const INGESTED_AT_COLUMN: &str = "ingested_at_utc";

/// The ten columns every harmonized batch carries, in canonical order.
pub const CANONICAL_COLUMNS: [&str; 10] = [
    "permit_id",
    "state",
    "operator",
    "county_parish",
    "well_name",
    "permit_type",
    "status",
    "application_date",
    "approval_date",
    "expiration_date",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    PermitId,
    State,
    Operator,
    CountyParish,
    WellName,
    PermitType,
    Status,
    ApplicationDate,
    ApprovalDate,
    ExpirationDate,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 10] = [
        CanonicalField::PermitId,
        CanonicalField::State,
        CanonicalField::Operator,
        CanonicalField::CountyParish,
        CanonicalField::WellName,
        CanonicalField::PermitType,
        CanonicalField::Status,
        CanonicalField::ApplicationDate,
        CanonicalField::ApprovalDate,
        CanonicalField::ExpirationDate,
    ];

    pub const DATES: [CanonicalField; 3] = [
        CanonicalField::ApplicationDate,
        CanonicalField::ApprovalDate,
        CanonicalField::ExpirationDate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::PermitId => "permit_id",
            CanonicalField::State => "state",
            CanonicalField::Operator => "operator",
            CanonicalField::CountyParish => "county_parish",
            CanonicalField::WellName => "well_name",
            CanonicalField::PermitType => "permit_type",
            CanonicalField::Status => "status",
            CanonicalField::ApplicationDate => "application_date",
            CanonicalField::ApprovalDate => "approval_date",
            CanonicalField::ExpirationDate => "expiration_date",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == name)
    }

    pub fn is_date(self) -> bool {
        Self::DATES.contains(&self)
    }

    /// Value-level default applied during harmonization. `state` is absent here because
    /// its fallback is the fetch's jurisdiction, not a constant.
    pub fn sentinel(self) -> Option<&'static str> {
        match self {
            CanonicalField::Status => Some(DEFAULT_STATUS),
            CanonicalField::PermitType => Some(UNKNOWN_PERMIT_TYPE),
            CanonicalField::Operator => Some(UNKNOWN_OPERATOR),
            CanonicalField::CountyParish => Some(UNKNOWN_COUNTY_PARISH),
            CanonicalField::WellName => Some(UNKNOWN_WELL_NAME),
            _ => None,
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a dataset handed to normalization lacks canonical columns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dataset is missing required columns: {}", missing_columns.join(", "))]
pub struct SchemaError {
    pub missing_columns: Vec<String>,
}

/// Non-fatal, per-source ingestion failure surfaced as a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionIssue {
    pub source: String,
    pub message: String,
}

impl IngestionIssue {
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for IngestionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.source, self.message)
    }
}

/// Validated, metric-annotated permit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitRecord {
    pub permit_id: Option<String>,
    pub state: Option<String>,
    pub operator: Option<String>,
    pub county_parish: Option<String>,
    pub well_name: Option<String>,
    pub permit_type: Option<String>,
    pub status: Option<String>,
    pub application_date: Option<NaiveDate>,
    pub approval_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub days_to_expiry: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingested_at_utc: Option<DateTime<Utc>>,
}

impl PermitRecord {
    pub fn text(&self, field: CanonicalField) -> Option<&str> {
        match field {
            CanonicalField::PermitId => self.permit_id.as_deref(),
            CanonicalField::State => self.state.as_deref(),
            CanonicalField::Operator => self.operator.as_deref(),
            CanonicalField::CountyParish => self.county_parish.as_deref(),
            CanonicalField::WellName => self.well_name.as_deref(),
            CanonicalField::PermitType => self.permit_type.as_deref(),
            CanonicalField::Status => self.status.as_deref(),
            _ => None,
        }
    }

    pub fn date(&self, field: CanonicalField) -> Option<NaiveDate> {
        match field {
            CanonicalField::ApplicationDate => self.application_date,
            CanonicalField::ApprovalDate => self.approval_date,
            CanonicalField::ExpirationDate => self.expiration_date,
            _ => None,
        }
    }

    /// Row form with dates rendered as ISO calendar dates, suitable for re-normalization.
    pub fn to_raw(&self) -> RawRecord {
        let mut row = RawRecord::new();
        for field in CanonicalField::ALL {
            let value = if field.is_date() {
                self.date(field)
                    .map(|d| JsonValue::String(d.format("%Y-%m-%d").to_string()))
                    .unwrap_or(JsonValue::Null)
            } else {
                self.text(field)
                    .map(|s| JsonValue::String(s.to_string()))
                    .unwrap_or(JsonValue::Null)
            };
            row.insert(field.as_str().to_string(), value);
        }
        row.insert(
            DAYS_TO_EXPIRY_COLUMN.to_string(),
            self.days_to_expiry.map(JsonValue::from).unwrap_or(JsonValue::Null),
        );
        if let Some(ts) = self.ingested_at_utc {
            row.insert(INGESTED_AT_COLUMN.to_string(), JsonValue::String(ts.to_rfc3339()));
        }
        row
    }
}

/// Output of a normalization pass; `as_of` is the calendar day `days_to_expiry` was computed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitBatch {
    pub as_of: NaiveDate,
    pub records: Vec<PermitRecord>,
}

impl PermitBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stamp every row with the same ingestion instant.
    pub fn stamp_ingested_at(&mut self, ingested_at: DateTime<Utc>) {
        for record in &mut self.records {
            record.ingested_at_utc = Some(ingested_at);
        }
    }

    pub fn to_table(&self) -> Table {
        let mut columns: Vec<String> = CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect();
        columns.push(DAYS_TO_EXPIRY_COLUMN.to_string());
        if self.records.iter().any(|r| r.ingested_at_utc.is_some()) {
            columns.push(INGESTED_AT_COLUMN.to_string());
        }
        let mut table = Table::new(columns);
        for record in &self.records {
            table.push_row(record.to_raw());
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_fields_match_column_order() {
        let names: Vec<_> = CanonicalField::ALL.iter().map(|f| f.as_str()).collect();
        assert_eq!(names, CANONICAL_COLUMNS);
        assert_eq!(CanonicalField::from_name("county_parish"), Some(CanonicalField::CountyParish));
        assert_eq!(CanonicalField::from_name("days_to_expiry"), None);
    }

    #[test]
    fn sentinels_cover_only_defaulted_text_fields() {
        let defaulted: Vec<_> = CanonicalField::ALL
            .into_iter()
            .filter(|f| f.sentinel().is_some())
            .collect();
        assert_eq!(
            defaulted,
            vec![
                CanonicalField::Operator,
                CanonicalField::CountyParish,
                CanonicalField::WellName,
                CanonicalField::PermitType,
                CanonicalField::Status,
            ]
        );
        assert_eq!(CanonicalField::Status.sentinel(), Some("Pending"));
    }

    #[test]
    fn schema_error_lists_missing_columns() {
        let err = SchemaError {
            missing_columns: vec!["operator".into(), "status".into()],
        };
        assert_eq!(err.to_string(), "dataset is missing required columns: operator, status");
    }

    #[test]
    fn batch_table_carries_canonical_columns_and_metric() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let mut batch = PermitBatch {
            as_of: today,
            records: vec![PermitRecord {
                permit_id: Some("TX-1".into()),
                state: Some("TX".into()),
                operator: None,
                county_parish: None,
                well_name: None,
                permit_type: None,
                status: Some("Approved".into()),
                application_date: None,
                approval_date: None,
                expiration_date: NaiveDate::from_ymd_opt(2026, 3, 11),
                days_to_expiry: Some(10),
                ingested_at_utc: None,
            }],
        };

        let table = batch.to_table();
        assert_eq!(table.columns().len(), 11);
        assert_eq!(table.rows()[0]["expiration_date"], JsonValue::from("2026-03-11"));
        assert_eq!(table.rows()[0]["days_to_expiry"], JsonValue::from(10));

        batch.stamp_ingested_at(Utc::now());
        assert!(batch.to_table().has_column(INGESTED_AT_COLUMN));
    }
}
