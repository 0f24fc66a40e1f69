//! Alias-driven mapping of arbitrary source columns onto the canonical permit schema.

use std::sync::Arc;

use dpt_core::{AliasTable, CanonicalField, ColumnLookup, RawRecord, Table};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone)]
pub struct SchemaHarmonizer {
    aliases: Arc<AliasTable>,
}

impl Default for SchemaHarmonizer {
    fn default() -> Self {
        Self::new(Arc::new(AliasTable::standard()))
    }
}

impl SchemaHarmonizer {
    pub fn new(aliases: Arc<AliasTable>) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Map `input` onto exactly the canonical columns.
    ///
    /// Identifiers are synthesized as `{jurisdiction}-AUTO-{n:06}` only when no row
    /// carries one; a batch with any identifier keeps its remaining nulls.
    pub fn harmonize(&self, input: &Table, fallback_jurisdiction: &str) -> Table {
        let lookup = ColumnLookup::new(input.columns());
        let sources: Vec<(CanonicalField, Option<&str>)> = CanonicalField::ALL
            .into_iter()
            .map(|field| (field, self.aliases.resolve(field, &lookup)))
            .collect();

        let id_column = sources
            .iter()
            .find(|(field, _)| *field == CanonicalField::PermitId)
            .and_then(|(_, column)| *column);
        let synthesize_ids = match id_column {
            Some(column) => input.rows().iter().all(|row| is_null(row.get(column))),
            None => true,
        };

        let mut out = Table::empty_canonical();
        for (idx, row) in input.rows().iter().enumerate() {
            let mut record = RawRecord::new();
            for (field, column) in &sources {
                let value = column
                    .and_then(|c| row.get(c))
                    .filter(|v| !v.is_null())
                    .cloned()
                    .unwrap_or_else(|| fallback_value(*field, fallback_jurisdiction));
                record.insert(field.as_str().to_string(), value);
            }
            if synthesize_ids {
                record.insert(
                    CanonicalField::PermitId.as_str().to_string(),
                    JsonValue::String(synthetic_permit_id(fallback_jurisdiction, idx + 1)),
                );
            }
            out.push_row(record);
        }
        out
    }
}

pub fn synthetic_permit_id(jurisdiction: &str, sequence: usize) -> String {
    format!("{jurisdiction}-AUTO-{sequence:06}")
}

fn fallback_value(field: CanonicalField, jurisdiction: &str) -> JsonValue {
    match field {
        CanonicalField::State => JsonValue::String(jurisdiction.to_string()),
        other => other
            .sentinel()
            .map(|s| JsonValue::String(s.to_string()))
            .unwrap_or(JsonValue::Null),
    }
}

fn is_null(value: Option<&JsonValue>) -> bool {
    value.map_or(true, JsonValue::is_null)
}
