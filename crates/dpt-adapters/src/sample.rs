//! Bundled demonstration permits, dated relative to the day they are requested.

use chrono::{Days, NaiveDate};
use dpt_core::{RawRecord, Table};
use serde_json::Value as JsonValue;

struct SamplePermit {
    permit_id: &'static str,
    state: &'static str,
    operator: &'static str,
    county_parish: &'static str,
    well_name: &'static str,
    permit_type: &'static str,
    status: &'static str,
    application_offset: i64,
    approval_offset: Option<i64>,
    expiration_offset: i64,
}

const SAMPLE_PERMITS: [SamplePermit; 4] = [
    SamplePermit {
        permit_id: "TX-2026-00123",
        state: "TX",
        operator: "Lone Star Energy",
        county_parish: "Reeves",
        well_name: "LSU 14H",
        permit_type: "Horizontal",
        status: "Approved",
        application_offset: -34,
        approval_offset: Some(-13),
        expiration_offset: 352,
    },
    SamplePermit {
        permit_id: "TX-2026-00188",
        state: "TX",
        operator: "Permian Delta Operating",
        county_parish: "Midland",
        well_name: "Delta Unit 5",
        permit_type: "Vertical",
        status: "Pending",
        application_offset: -21,
        approval_offset: None,
        expiration_offset: 344,
    },
    SamplePermit {
        permit_id: "LA-2026-0041",
        state: "LA",
        operator: "Bayou Hydrocarbons",
        county_parish: "Caddo",
        well_name: "BH Cotton Valley 3",
        permit_type: "Directional",
        status: "Approved",
        application_offset: -50,
        approval_offset: Some(-25),
        expiration_offset: 155,
    },
    SamplePermit {
        permit_id: "LA-2026-0057",
        state: "LA",
        operator: "Gulf Coast Resources",
        county_parish: "Lafourche",
        well_name: "GC Levee 1",
        permit_type: "Re-entry",
        status: "Expired",
        application_offset: -420,
        approval_offset: Some(-390),
        expiration_offset: -15,
    },
];

/// Canonical-shaped sample rows with ISO dates offset from `today`.
pub fn sample_permits(today: NaiveDate) -> Table {
    let mut table = Table::empty_canonical();
    for permit in &SAMPLE_PERMITS {
        let mut row = RawRecord::new();
        row.insert("permit_id".into(), permit.permit_id.into());
        row.insert("state".into(), permit.state.into());
        row.insert("operator".into(), permit.operator.into());
        row.insert("county_parish".into(), permit.county_parish.into());
        row.insert("well_name".into(), permit.well_name.into());
        row.insert("permit_type".into(), permit.permit_type.into());
        row.insert("status".into(), permit.status.into());
        row.insert(
            "application_date".into(),
            offset_date(today, Some(permit.application_offset)),
        );
        row.insert("approval_date".into(), offset_date(today, permit.approval_offset));
        row.insert(
            "expiration_date".into(),
            offset_date(today, Some(permit.expiration_offset)),
        );
        table.push_row(row);
    }
    table
}

fn offset_date(today: NaiveDate, offset: Option<i64>) -> JsonValue {
    let Some(offset) = offset else {
        return JsonValue::Null;
    };
    let shifted = if offset >= 0 {
        today.checked_add_days(Days::new(offset.unsigned_abs()))
    } else {
        today.checked_sub_days(Days::new(offset.unsigned_abs()))
    };
    shifted
        .map(|d| JsonValue::String(d.format("%Y-%m-%d").to_string()))
        .unwrap_or(JsonValue::Null)
}
