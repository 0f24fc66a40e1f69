use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::CanonicalField;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AliasTableError {
    #[error("alias table has no entry for canonical field {0}")]
    MissingField(CanonicalField),
    #[error("alias table entry for {0} has no candidate names")]
    EmptyCandidates(CanonicalField),
}

/// Immutable mapping from canonical field to ordered, case-insensitive candidate headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<CanonicalField, Vec<String>>")]
#[serde(into = "BTreeMap<CanonicalField, Vec<String>>")]
pub struct AliasTable {
    entries: BTreeMap<CanonicalField, Vec<String>>,
}

impl AliasTable {
    /// Built-in alias set covering the TX RRC and LA SONRIS export headers.
    pub fn standard() -> Self {
        let entries = [
            (
                CanonicalField::PermitId,
                &["permit_id", "permit_number", "permit_no", "api_number", "api"][..],
            ),
            (CanonicalField::State, &["state", "jurisdiction"][..]),
            (
                CanonicalField::Operator,
                &["operator", "operator_name", "company", "organization"][..],
            ),
            (
                CanonicalField::CountyParish,
                &["county_parish", "county", "parish", "location"][..],
            ),
            (
                CanonicalField::WellName,
                &["well_name", "well", "wellbore_name", "lease_well_name"][..],
            ),
            (
                CanonicalField::PermitType,
                &["permit_type", "well_type", "drill_type", "permit_category"][..],
            ),
            (
                CanonicalField::Status,
                &["status", "permit_status", "approval_status"][..],
            ),
            (
                CanonicalField::ApplicationDate,
                &["application_date", "application_dt", "filed_date", "submitted_date"][..],
            ),
            (
                CanonicalField::ApprovalDate,
                &["approval_date", "approved_date", "approval_dt", "issue_date"][..],
            ),
            (
                CanonicalField::ExpirationDate,
                &["expiration_date", "expiry_date", "expiration_dt", "expires_on"][..],
            ),
        ]
        .into_iter()
        .map(|(field, names)| (field, names.iter().map(|n| n.to_string()).collect::<Vec<_>>()))
        .collect();
        Self { entries }
    }

    pub fn from_entries(
        entries: BTreeMap<CanonicalField, Vec<String>>,
    ) -> Result<Self, AliasTableError> {
        for field in CanonicalField::ALL {
            match entries.get(&field) {
                None => return Err(AliasTableError::MissingField(field)),
                Some(candidates) if candidates.iter().all(|c| c.trim().is_empty()) => {
                    return Err(AliasTableError::EmptyCandidates(field))
                }
                Some(_) => {}
            }
        }
        Ok(Self { entries })
    }

    pub fn candidates(&self, field: CanonicalField) -> &[String] {
        self.entries.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First candidate (in alias order) present among the observed columns.
    pub fn resolve<'a>(&self, field: CanonicalField, lookup: &ColumnLookup<'a>) -> Option<&'a str> {
        self.candidates(field)
            .iter()
            .find_map(|candidate| lookup.get(candidate))
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<BTreeMap<CanonicalField, Vec<String>>> for AliasTable {
    type Error = AliasTableError;

    fn try_from(entries: BTreeMap<CanonicalField, Vec<String>>) -> Result<Self, Self::Error> {
        Self::from_entries(entries)
    }
}

impl From<AliasTable> for BTreeMap<CanonicalField, Vec<String>> {
    fn from(table: AliasTable) -> Self {
        table.entries
    }
}

/// Observed column names keyed by their lower-cased, trimmed form.
///
/// When two columns normalize to the same key the later one wins.
#[derive(Debug, Clone)]
pub struct ColumnLookup<'a> {
    by_key: HashMap<String, &'a str>,
}

impl<'a> ColumnLookup<'a> {
    pub fn new(columns: &'a [String]) -> Self {
        let by_key = columns
            .iter()
            .map(|c| (normalize_header(c), c.as_str()))
            .collect();
        Self { by_key }
    }

    pub fn get(&self, candidate: &str) -> Option<&'a str> {
        self.by_key.get(&normalize_header(candidate)).copied()
    }
}

fn normalize_header(name: &str) -> String {
    name.trim().to_lowercase()
}
