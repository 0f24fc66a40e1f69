//! Read-only views over a validated batch: headline counts, filters, expiry horizon.

use std::collections::BTreeSet;

use dpt_core::{CanonicalField, PermitBatch, PermitRecord};
use serde::Serialize;

pub const DEFAULT_EXPIRY_HORIZON_DAYS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortfolioSummary {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub expiring_within_horizon: usize,
}

impl PortfolioSummary {
    /// Records without an expiration date never count as expiring.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PermitRecord>, horizon_days: i64) -> Self {
        let mut summary = Self {
            total: 0,
            pending: 0,
            approved: 0,
            expiring_within_horizon: 0,
        };
        for record in records {
            summary.total += 1;
            match record.status.as_deref() {
                Some("Pending") => summary.pending += 1,
                Some("Approved") => summary.approved += 1,
                _ => {}
            }
            if record.days_to_expiry.is_some_and(|d| d <= horizon_days) {
                summary.expiring_within_horizon += 1;
            }
        }
        summary
    }

    pub fn of(batch: &PermitBatch, horizon_days: i64) -> Self {
        Self::from_records(&batch.records, horizon_days)
    }
}

/// Set-membership filter; an empty set places no restriction on its field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermitFilter {
    pub states: BTreeSet<String>,
    pub statuses: BTreeSet<String>,
    pub operators: BTreeSet<String>,
}

impl PermitFilter {
    pub fn matches(&self, record: &PermitRecord) -> bool {
        allows(&self.states, record.state.as_deref())
            && allows(&self.statuses, record.status.as_deref())
            && allows(&self.operators, record.operator.as_deref())
    }

    pub fn apply<'a>(&self, batch: &'a PermitBatch) -> Vec<&'a PermitRecord> {
        batch.records.iter().filter(|r| self.matches(r)).collect()
    }
}

fn allows(set: &BTreeSet<String>, value: Option<&str>) -> bool {
    set.is_empty() || value.is_some_and(|v| set.contains(v))
}

/// Records expiring within `days` (already-expired included), soonest first.
pub fn expiring_within<'a>(records: &[&'a PermitRecord], days: i64) -> Vec<&'a PermitRecord> {
    let mut out: Vec<_> = records
        .iter()
        .copied()
        .filter(|r| r.days_to_expiry.is_some_and(|d| d <= days))
        .collect();
    out.sort_by_key(|r| r.days_to_expiry);
    out
}

/// Detail ordering: state, then operator, then expiration date. Missing values sort last.
pub fn sort_for_listing(records: &mut [&PermitRecord]) {
    records.sort_by(|a, b| {
        nulls_last(a.state.as_ref(), b.state.as_ref())
            .then_with(|| nulls_last(a.operator.as_ref(), b.operator.as_ref()))
            .then_with(|| nulls_last(a.expiration_date.as_ref(), b.expiration_date.as_ref()))
    });
}

fn nulls_last<T: Ord>(a: Option<&T>, b: Option<&T>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

/// Sorted distinct non-null values of a text field, e.g. to populate filter choices.
pub fn distinct_values(batch: &PermitBatch, field: CanonicalField) -> Vec<String> {
    batch
        .records
        .iter()
        .filter_map(|r| r.text(field))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
