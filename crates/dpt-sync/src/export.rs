//! Parquet snapshot of a validated batch plus a digest manifest.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{Date32Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field as ArrowField, Schema};
use chrono::{Datelike, NaiveDate};
use dpt_core::{CanonicalField, PermitBatch, DAYS_TO_EXPIRY_COLUMN, INGESTED_AT_COLUMN};
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;

pub const SNAPSHOT_DIR: &str = "snapshots";
pub const PERMITS_SNAPSHOT_FILE: &str = "permits.parquet";
pub const MANIFEST_FILE: &str = "manifest.json";

const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParquetManifest {
    pub schema_version: u32,
    pub as_of: NaiveDate,
    pub files: Vec<ParquetManifestFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParquetManifestFile {
    pub name: String,
    pub path: String,
    pub rows: usize,
    pub sha256: String,
    pub bytes: u64,
}

/// Write `snapshots/permits.parquet` and `snapshots/manifest.json` under `run_dir`.
pub async fn export_snapshot(run_dir: &Path, batch: &PermitBatch) -> Result<PathBuf> {
    let snapshot_dir = run_dir.join(SNAPSHOT_DIR);
    fs::create_dir_all(&snapshot_dir)
        .await
        .with_context(|| format!("creating {}", snapshot_dir.display()))?;

    let permits_path = snapshot_dir.join(PERMITS_SNAPSHOT_FILE);
    write_permits_parquet(&permits_path, batch)?;

    let manifest = ParquetManifest {
        schema_version: 1,
        as_of: batch.as_of,
        files: vec![manifest_entry("permits", run_dir, &permits_path, batch.len())?],
    };
    let manifest_path = snapshot_dir.join(MANIFEST_FILE);
    let bytes = serde_json::to_vec_pretty(&manifest).context("serializing parquet manifest")?;
    fs::write(&manifest_path, bytes)
        .await
        .with_context(|| format!("writing {}", manifest_path.display()))?;
    Ok(manifest_path)
}

pub fn permits_schema() -> Schema {
    let mut fields: Vec<ArrowField> = CanonicalField::ALL
        .into_iter()
        .map(|field| {
            let data_type = if field.is_date() { DataType::Date32 } else { DataType::Utf8 };
            ArrowField::new(field.as_str(), data_type, true)
        })
        .collect();
    fields.push(ArrowField::new(DAYS_TO_EXPIRY_COLUMN, DataType::Int64, true));
    fields.push(ArrowField::new(INGESTED_AT_COLUMN, DataType::Utf8, true));
    Schema::new(fields)
}

pub fn write_permits_parquet(path: &Path, batch: &PermitBatch) -> Result<()> {
    let mut columns: Vec<Arc<dyn arrow_array::Array>> = Vec::new();
    for field in CanonicalField::ALL {
        if field.is_date() {
            let days = batch
                .records
                .iter()
                .map(|r| r.date(field).map(days_since_epoch))
                .collect::<Vec<_>>();
            columns.push(Arc::new(Date32Array::from(days)));
        } else {
            let values = batch.records.iter().map(|r| r.text(field)).collect::<Vec<_>>();
            columns.push(Arc::new(StringArray::from(values)));
        }
    }
    columns.push(Arc::new(Int64Array::from(
        batch.records.iter().map(|r| r.days_to_expiry).collect::<Vec<_>>(),
    )));
    columns.push(Arc::new(StringArray::from(
        batch
            .records
            .iter()
            .map(|r| r.ingested_at_utc.map(|ts| ts.to_rfc3339()))
            .collect::<Vec<_>>(),
    )));

    let record_batch = RecordBatch::try_new(Arc::new(permits_schema()), columns)
        .context("building permits record batch")?;
    write_parquet(path, record_batch)
}

fn write_parquet(path: &Path, batch: RecordBatch) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .with_context(|| format!("opening parquet writer {}", path.display()))?;
    writer
        .write(&batch)
        .with_context(|| format!("writing record batch {}", path.display()))?;
    writer
        .close()
        .with_context(|| format!("closing parquet writer {}", path.display()))?;
    Ok(())
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn manifest_entry(name: &str, base: &Path, path: &Path, rows: usize) -> Result<ParquetManifestFile> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let rel = path.strip_prefix(base).unwrap_or(path).display().to_string();
    Ok(ParquetManifestFile {
        name: name.to_string(),
        path: rel,
        rows,
        sha256: sha256_hex(&bytes),
        bytes: bytes.len() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::Array;
    use chrono::{TimeZone, Utc};
    use dpt_adapters::sample_permits;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    use crate::normalize::normalize_and_validate_as_of;

    fn stamped_sample() -> PermitBatch {
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let mut batch = normalize_and_validate_as_of(&sample_permits(today), today).unwrap();
        batch.stamp_ingested_at(Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap());
        batch
    }

    #[test]
    fn epoch_offset_matches_unix_epoch() {
        assert_eq!(days_since_epoch(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
        assert_eq!(days_since_epoch(NaiveDate::from_ymd_opt(1970, 1, 31).unwrap()), 30);
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_parquet_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let batch = stamped_sample();

        let manifest_path = export_snapshot(dir.path(), &batch).await.unwrap();
        let manifest: ParquetManifest =
            serde_json::from_slice(&std::fs::read(&manifest_path).unwrap()).unwrap();

        assert_eq!(manifest.as_of, batch.as_of);
        assert_eq!(manifest.files.len(), 1);
        let entry = &manifest.files[0];
        assert_eq!(entry.path, "snapshots/permits.parquet");
        assert_eq!(entry.rows, 4);

        let parquet_bytes = std::fs::read(dir.path().join(&entry.path)).unwrap();
        assert_eq!(entry.sha256, sha256_hex(&parquet_bytes));
        assert_eq!(entry.bytes, parquet_bytes.len() as u64);

        let file = File::open(dir.path().join(&entry.path)).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file).unwrap().build().unwrap();
        let batches: Vec<_> = reader.map(|b| b.unwrap()).collect();
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 4);

        let first = &batches[0];
        assert_eq!(first.schema().fields().len(), 12);
        let approval = first
            .column_by_name("approval_date")
            .unwrap()
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap();
        assert!(approval.is_null(1));
        let days = first
            .column_by_name("days_to_expiry")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(days.value(3), -15);
    }
}
