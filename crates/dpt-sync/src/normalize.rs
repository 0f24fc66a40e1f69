//! Schema validation, lenient date coercion and the `days_to_expiry` metric.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use dpt_core::{
    CanonicalField, PermitBatch, PermitRecord, RawRecord, SchemaError, Table, CANONICAL_COLUMNS,
    INGESTED_AT_COLUMN,
};
use serde_json::Value as JsonValue;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Validate and annotate `table` against today's local calendar date.
pub fn normalize_and_validate(table: &Table) -> Result<PermitBatch, SchemaError> {
    normalize_and_validate_as_of(table, Local::now().date_naive())
}

/// Fails when any canonical column is absent; values themselves may be null.
/// Unparseable dates become null rather than failing the batch.
pub fn normalize_and_validate_as_of(table: &Table, today: NaiveDate) -> Result<PermitBatch, SchemaError> {
    let missing_columns = table.missing_columns(CANONICAL_COLUMNS);
    if !missing_columns.is_empty() {
        return Err(SchemaError { missing_columns });
    }

    let records = table.rows().iter().map(|row| normalize_row(row, today)).collect();
    Ok(PermitBatch { as_of: today, records })
}

fn normalize_row(row: &RawRecord, today: NaiveDate) -> PermitRecord {
    let text = |field: CanonicalField| row.get(field.as_str()).and_then(text_value);
    let date = |field: CanonicalField| row.get(field.as_str()).and_then(parse_date_value);

    let expiration_date = date(CanonicalField::ExpirationDate);
    PermitRecord {
        permit_id: text(CanonicalField::PermitId),
        state: text(CanonicalField::State),
        operator: text(CanonicalField::Operator),
        county_parish: text(CanonicalField::CountyParish),
        well_name: text(CanonicalField::WellName),
        permit_type: text(CanonicalField::PermitType),
        status: text(CanonicalField::Status),
        application_date: date(CanonicalField::ApplicationDate),
        approval_date: date(CanonicalField::ApprovalDate),
        expiration_date,
        days_to_expiry: days_to_expiry(expiration_date, today),
        ingested_at_utc: row
            .get(INGESTED_AT_COLUMN)
            .and_then(JsonValue::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| ts.with_timezone(&Utc)),
    }
}

pub fn days_to_expiry(expiration_date: Option<NaiveDate>, today: NaiveDate) -> Option<i64> {
    expiration_date.map(|exp| (exp - today).num_days())
}

fn text_value(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn parse_date_value(value: &JsonValue) -> Option<NaiveDate> {
    value.as_str().and_then(parse_date)
}

/// Calendar date from the common export spellings; date-times are truncated to their date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
        return compact_date(raw);
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|ts| ts.date_naive()))
        .or_else(|| {
            DATE_TIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn compact_date(raw: &str) -> Option<NaiveDate> {
    let year = raw.get(0..4)?.parse().ok()?;
    let month = raw.get(4..6)?.parse().ok()?;
    let day = raw.get(6..8)?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;
    use dpt_core::DAYS_TO_EXPIRY_COLUMN;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn canonical_row(overrides: JsonValue) -> RawRecord {
        let mut row: RawRecord = CANONICAL_COLUMNS
            .iter()
            .map(|c| (c.to_string(), JsonValue::Null))
            .collect();
        for (k, v) in overrides.as_object().cloned().unwrap() {
            row.insert(k, v);
        }
        row
    }

    fn iso(date: NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    #[test]
    fn missing_operator_is_the_only_reported_column() {
        let mut row = canonical_row(json!({"permit_id": "TX-1"}));
        row.remove("operator");
        let table = Table::from_records(vec![row]);

        let err = normalize_and_validate_as_of(&table, today()).unwrap_err();
        assert_eq!(err.missing_columns, vec!["operator".to_string()]);
    }

    #[test]
    fn empty_canonical_table_is_valid() {
        let batch = normalize_and_validate_as_of(&Table::empty_canonical(), today()).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn days_to_expiry_counts_whole_days_from_today() {
        let past = today().checked_sub_days(Days::new(15)).unwrap();
        let future = today().checked_add_days(Days::new(60)).unwrap();
        let table = Table::from_records(vec![
            canonical_row(json!({"permit_id": "a", "expiration_date": iso(past)})),
            canonical_row(json!({"permit_id": "b", "expiration_date": iso(future)})),
            canonical_row(json!({"permit_id": "c"})),
        ]);

        let batch = normalize_and_validate_as_of(&table, today()).unwrap();
        let days: Vec<_> = batch.records.iter().map(|r| r.days_to_expiry).collect();
        assert_eq!(days, vec![Some(-15), Some(60), None]);
    }

    #[test]
    fn unparseable_and_non_string_dates_become_null() {
        let table = Table::from_records(vec![canonical_row(json!({
            "permit_id": "a",
            "application_date": "not-a-date",
            "approval_date": 20260101,
            "expiration_date": "",
        }))]);

        let record = &normalize_and_validate_as_of(&table, today()).unwrap().records[0];
        assert_eq!(record.application_date, None);
        assert_eq!(record.approval_date, None);
        assert_eq!(record.expiration_date, None);
        assert_eq!(record.days_to_expiry, None);
    }

    #[test]
    fn common_date_spellings_parse() {
        let expected = NaiveDate::from_ymd_opt(2026, 1, 19);
        for raw in [
            "2026-01-19",
            "2026/01/19",
            "01/19/2026",
            "20260119",
            "2026-01-19T00:00:00Z",
            "2026-01-19T23:30:00-06:00",
            "2026-01-19 08:15:00",
            "2026-01-19T08:15:00.250",
            " 2026-01-19 ",
        ] {
            assert_eq!(parse_date(raw), expected, "{raw}");
        }
        assert_eq!(parse_date("20261319"), None);
        assert_eq!(parse_date("19 Jan 2026"), None);
    }

    #[test]
    fn scalar_text_values_are_stringified() {
        let table = Table::from_records(vec![canonical_row(json!({"permit_id": 4238931001_u64, "state": "TX"}))]);
        let record = &normalize_and_validate_as_of(&table, today()).unwrap().records[0];
        assert_eq!(record.permit_id.as_deref(), Some("4238931001"));
        assert_eq!(record.operator, None);
    }

    #[test]
    fn renormalizing_output_on_the_same_day_is_stable() {
        let table = Table::from_records(vec![
            canonical_row(json!({"permit_id": "a", "expiration_date": "03/31/2026", "approval_date": "2026-01-02T10:00:00Z"})),
            canonical_row(json!({"permit_id": "b", "expiration_date": "garbage"})),
        ]);

        let first = normalize_and_validate_as_of(&table, today()).unwrap();
        let rerun_input = first.to_table();
        assert!(rerun_input.has_column(DAYS_TO_EXPIRY_COLUMN));
        let second = normalize_and_validate_as_of(&rerun_input, today()).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.records[0].days_to_expiry, Some(30));
    }

    #[test]
    fn ingestion_stamp_survives_a_second_pass() {
        let table = Table::from_records(vec![canonical_row(json!({"permit_id": "a"}))]);
        let mut batch = normalize_and_validate_as_of(&table, today()).unwrap();
        let stamp = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        batch.stamp_ingested_at(stamp);

        let again = normalize_and_validate_as_of(&batch.to_table(), today()).unwrap();
        assert_eq!(again.records[0].ingested_at_utc, Some(stamp));
    }
}
