use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One row of named fields as observed in a source payload.
pub type RawRecord = serde_json::Map<String, JsonValue>;

/// Rows of named fields plus the ordered set of observed column names.
///
/// Every key of every row is listed in `columns`; a column may be absent from an
/// individual row, which reads as null.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<RawRecord>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        let mut table = Self::default();
        for column in columns {
            table.add_column(&column);
        }
        table
    }

    /// Zero rows, canonical column set.
    pub fn empty_canonical() -> Self {
        Self::new(crate::CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect())
    }

    pub fn from_records(records: Vec<RawRecord>) -> Self {
        let mut table = Self::default();
        for record in records {
            table.push_row(record);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[RawRecord] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<RawRecord> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn push_row(&mut self, row: RawRecord) {
        for key in row.keys() {
            if !self.has_column(key) {
                self.columns.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    /// Row-wise concatenation; columns are unioned, values are kept as-is.
    pub fn append(&mut self, other: Table) {
        for column in &other.columns {
            self.add_column(column);
        }
        self.rows.extend(other.rows);
    }

    /// Value of `column` in row `index`; `None` for a missing key or a JSON null.
    pub fn value(&self, index: usize, column: &str) -> Option<&JsonValue> {
        self.rows
            .get(index)
            .and_then(|row| row.get(column))
            .filter(|v| !v.is_null())
    }

    /// Required names that are not columns of this table, in the order given.
    pub fn missing_columns<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        required
            .into_iter()
            .filter(|name| !self.has_column(name))
            .map(ToString::to_string)
            .collect()
    }

    fn add_column(&mut self, name: &str) {
        if !self.has_column(name) {
            self.columns.push(name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: JsonValue) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn columns_are_the_union_of_row_keys() {
        let table = Table::from_records(vec![
            record(json!({"a": 1, "b": 2})),
            record(json!({"c": 3})),
        ]);
        assert_eq!(table.columns(), ["a", "b", "c"]);
        assert_eq!(table.value(1, "a"), None);
        assert_eq!(table.value(1, "c"), Some(&json!(3)));
    }

    #[test]
    fn append_preserves_rows_and_unions_columns() {
        let mut left = Table::from_records(vec![record(json!({"state": "TX"}))]);
        let right = Table::from_records(vec![
            record(json!({"state": "LA", "extra": true})),
            record(json!({"state": "LA"})),
        ]);
        left.append(right);
        assert_eq!(left.len(), 3);
        assert_eq!(left.columns(), ["state", "extra"]);
        assert_eq!(left.value(2, "state"), Some(&json!("LA")));
    }

    #[test]
    fn empty_canonical_has_no_missing_columns() {
        let table = Table::empty_canonical();
        assert!(table.is_empty());
        assert!(table.missing_columns(crate::CANONICAL_COLUMNS).is_empty());
    }

    #[test]
    fn null_values_read_as_absent() {
        let table = Table::from_records(vec![record(json!({"permit_id": null}))]);
        assert!(table.has_column("permit_id"));
        assert_eq!(table.value(0, "permit_id"), None);
    }
}
