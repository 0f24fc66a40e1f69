//! Standalone batch ingestion: live pull, validate, stamp, persist, snapshot.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use dpt_adapters::SourceFetcher;
use dpt_core::{IngestionIssue, PermitBatch};
use serde::Serialize;
use tokio::fs;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{SourceEndpoint, SyncConfig};
use crate::export::export_snapshot;
use crate::ingest::load_live;
use crate::normalize::normalize_and_validate;
use crate::persist::{PgPermitSink, TableName};

pub const SUMMARY_FILE: &str = "ingest_summary.json";

#[derive(Debug, Clone)]
pub struct BatchIngestOptions {
    pub sources: Vec<SourceEndpoint>,
    pub database_url: Option<String>,
    pub permits_table: String,
    pub reports_dir: PathBuf,
}

impl BatchIngestOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            sources: config.sources(),
            database_url: config.database_url.clone(),
            permits_table: config.permits_table.clone(),
            reports_dir: config.reports_dir.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Persistence {
    Appended { table: String, rows: u64 },
    SnapshotOnly,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub ingested_at_utc: DateTime<Utc>,
    pub rows: usize,
    pub rows_by_jurisdiction: BTreeMap<String, usize>,
    pub issues: Vec<IngestionIssue>,
    pub persistence: Persistence,
    pub reports_dir: String,
    pub parquet_manifest: String,
}

pub async fn run_batch_ingest_from_env() -> Result<IngestRunSummary> {
    let config = SyncConfig::from_env();
    let fetcher = config.build_fetcher()?;
    run_batch_ingest(&fetcher, &BatchIngestOptions::from_config(&config)).await
}

/// One ingestion run. Fails when no source yields rows or the merged batch is not canonical;
/// per-source failures are recorded in the summary instead.
pub async fn run_batch_ingest(fetcher: &SourceFetcher, options: &BatchIngestOptions) -> Result<IngestRunSummary> {
    let run_id = Uuid::new_v4();
    run_once(run_id, fetcher, options)
        .instrument(info_span!("batch_ingest", %run_id))
        .await
}

async fn run_once(run_id: Uuid, fetcher: &SourceFetcher, options: &BatchIngestOptions) -> Result<IngestRunSummary> {
    let started_at = Utc::now();
    let target = match &options.database_url {
        Some(url) => Some((url.as_str(), TableName::parse(&options.permits_table)?)),
        None => None,
    };

    let live = load_live(fetcher, &options.sources).await;
    if live.batch.is_empty() {
        let causes = live
            .issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        bail!("no rows loaded from any source: {causes}");
    }

    let mut batch = normalize_and_validate(&live.batch).context("validating harmonized batch")?;
    let ingested_at_utc = Utc::now();
    batch.stamp_ingested_at(ingested_at_utc);

    let run_dir = options.reports_dir.join(run_id.to_string());
    let manifest_path = export_snapshot(&run_dir, &batch).await?;

    let persistence = match target {
        Some((url, table)) => {
            let sink = PgPermitSink::connect(url, table).await?;
            sink.ensure_table().await?;
            let rows = sink.append(&batch).await?;
            Persistence::Appended {
                table: sink.table().to_string(),
                rows,
            }
        }
        None => {
            warn!("no database URL configured; writing snapshot only");
            Persistence::SnapshotOnly
        }
    };

    let summary = IngestRunSummary {
        run_id,
        started_at,
        finished_at: Utc::now(),
        ingested_at_utc,
        rows: batch.len(),
        rows_by_jurisdiction: rows_by_jurisdiction(&batch),
        issues: live.issues,
        persistence,
        reports_dir: run_dir.display().to_string(),
        parquet_manifest: manifest_path.display().to_string(),
    };

    let summary_path = run_dir.join(SUMMARY_FILE);
    let bytes = serde_json::to_vec_pretty(&summary).context("serializing ingest summary")?;
    fs::write(&summary_path, bytes)
        .await
        .with_context(|| format!("writing {}", summary_path.display()))?;

    info!(rows = summary.rows, issues = summary.issues.len(), "batch ingest complete");
    Ok(summary)
}

fn rows_by_jurisdiction(batch: &PermitBatch) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in &batch.records {
        let state = record.state.clone().unwrap_or_default();
        *counts.entry(state).or_default() += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use dpt_core::AliasTable;
    use dpt_storage::StaticTransport;

    fn options(dir: &std::path::Path, tx: Option<&str>, la: Option<&str>) -> BatchIngestOptions {
        BatchIngestOptions {
            sources: vec![
                SourceEndpoint::new("TX", tx.map(str::to_string)),
                SourceEndpoint::new("LA", la.map(str::to_string)),
            ],
            database_url: None,
            permits_table: "drilling_permits".into(),
            reports_dir: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn run_without_database_writes_snapshot_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let transport = StaticTransport::new().with_payload(
            "mem://tx",
            "text/csv",
            "API_Number,Operator_Name,Expires_On\n42-1,Lone Star Energy,2030-01-01\n42-2,,\n",
        );
        let fetcher = SourceFetcher::new(Arc::new(transport), Arc::new(AliasTable::standard()));

        let summary = run_batch_ingest(&fetcher, &options(dir.path(), Some("mem://tx"), None))
            .await
            .unwrap();

        assert_eq!(summary.rows, 2);
        assert_eq!(summary.rows_by_jurisdiction.get("TX"), Some(&2));
        assert_eq!(summary.persistence, Persistence::SnapshotOnly);
        assert_eq!(summary.issues, vec![IngestionIssue::new("LA", "source URL is empty")]);

        let run_dir = dir.path().join(summary.run_id.to_string());
        assert!(run_dir.join("snapshots").join("permits.parquet").exists());
        assert!(run_dir.join("snapshots").join("manifest.json").exists());

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(run_dir.join(SUMMARY_FILE)).unwrap()).unwrap();
        assert_eq!(written["persistence"]["mode"], "snapshot_only");
        assert_eq!(written["rows"], 2);
    }

    #[tokio::test]
    async fn run_with_no_rows_fails_with_every_cause() {
        let dir = tempfile::tempdir().unwrap();
        let transport = StaticTransport::new().with_status("mem://la", 503);
        let fetcher = SourceFetcher::new(Arc::new(transport), Arc::new(AliasTable::standard()));

        let err = run_batch_ingest(&fetcher, &options(dir.path(), None, Some("mem://la")))
            .await
            .unwrap_err()
            .to_string();

        assert!(err.starts_with("no rows loaded from any source"));
        assert!(err.contains("[TX] source URL is empty"));
        assert!(err.contains("[LA] LA fetch failed: http status 503"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn invalid_table_name_is_rejected_before_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(StaticTransport::new());
        let fetcher = SourceFetcher::new(transport.clone(), Arc::new(AliasTable::standard()));
        let mut opts = options(dir.path(), Some("mem://tx"), None);
        opts.database_url = Some("postgres://localhost/permits".into());
        opts.permits_table = "permits; drop".into();

        let err = run_batch_ingest(&fetcher, &opts).await.unwrap_err();
        assert!(err.to_string().contains("invalid table name"));
        assert_eq!(transport.calls(), 0);
    }
}
