use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use dpt_adapters::decode_upload;
use dpt_core::{CanonicalField, CANONICAL_COLUMNS};
use dpt_sync::{
    distinct_values, expiring_within, load_dataset, run_batch_ingest, sort_for_listing,
    BatchIngestOptions, DataMode, Dataset, DatasetInput, PermitFilter, PortfolioSummary, SyncConfig,
    DEFAULT_EXPIRY_HORIZON_DAYS,
};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "dpt-cli")]
#[command(about = "TX/LA drilling permit ingestion and harmonization")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Pull both jurisdictions, validate, stamp and persist one batch.
    Ingest {
        #[command(flatten)]
        sources: SourceArgs,
        #[arg(long)]
        table: Option<String>,
        #[arg(long)]
        reports_dir: Option<PathBuf>,
    },
    /// Load a dataset and print its portfolio view as JSON.
    Load {
        #[arg(long, default_value = "live")]
        mode: DataMode,
        #[arg(long, required_if_eq("mode", "upload"))]
        upload: Option<PathBuf>,
        #[command(flatten)]
        sources: SourceArgs,
        #[arg(long = "state")]
        states: Vec<String>,
        #[arg(long = "status")]
        statuses: Vec<String>,
        #[arg(long = "operator")]
        operators: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_EXPIRY_HORIZON_DAYS)]
        horizon_days: i64,
    },
    /// Check an upload for the canonical columns.
    Validate { path: PathBuf },
}

#[derive(Debug, Args)]
struct SourceArgs {
    #[arg(long)]
    tx_url: Option<String>,
    #[arg(long)]
    la_url: Option<String>,
}

impl SourceArgs {
    fn apply(self, config: &mut SyncConfig) {
        if let Some(url) = self.tx_url {
            config.tx_url = Some(url);
        }
        if let Some(url) = self.la_url {
            config.la_url = Some(url);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dpt=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Resolve the dataset for `mode`. Only live mode builds a fetcher.
async fn load_for_mode(
    config: &SyncConfig,
    mode: DataMode,
    upload: Option<&Path>,
    today: NaiveDate,
) -> Result<Dataset> {
    let fetcher;
    let endpoints;
    let body;
    let file_name;
    let input = match (mode, upload) {
        (DataMode::Live, _) => {
            fetcher = config.build_fetcher()?;
            endpoints = config.sources();
            DatasetInput::Live {
                fetcher: &fetcher,
                sources: &endpoints,
            }
        }
        (DataMode::Upload, Some(path)) => {
            body = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            file_name = path.display().to_string();
            DatasetInput::Upload {
                file_name: file_name.as_str(),
                body: body.as_slice(),
            }
        }
        (DataMode::Upload, None) => anyhow::bail!("--upload is required with --mode upload"),
        (DataMode::Sample, _) => DatasetInput::Sample,
    };
    Ok(load_dataset(input, today).await?)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let mut config = SyncConfig::from_env();

    match cli.command {
        Commands::Ingest {
            sources,
            table,
            reports_dir,
        } => {
            sources.apply(&mut config);
            if let Some(table) = table {
                config.permits_table = table;
            }
            if let Some(dir) = reports_dir {
                config.reports_dir = dir;
            }
            let fetcher = config.build_fetcher()?;
            let summary = run_batch_ingest(&fetcher, &BatchIngestOptions::from_config(&config)).await?;
            println!(
                "ingest complete: run_id={} rows={} issues={} reports={}",
                summary.run_id,
                summary.rows,
                summary.issues.len(),
                summary.reports_dir
            );
        }
        Commands::Load {
            mode,
            upload,
            sources,
            states,
            statuses,
            operators,
            horizon_days,
        } => {
            sources.apply(&mut config);
            let today = Local::now().date_naive();
            let dataset = load_for_mode(&config, mode, upload.as_deref(), today).await?;
            let filter = PermitFilter {
                states: states.into_iter().collect(),
                statuses: statuses.into_iter().collect(),
                operators: operators.into_iter().collect(),
            };
            let mut filtered = filter.apply(&dataset.batch);
            sort_for_listing(&mut filtered);
            let expiring = expiring_within(&filtered, horizon_days);
            info!(rows = filtered.len(), expiring = expiring.len(), "portfolio view ready");

            let report = json!({
                "requested": dataset.requested,
                "origin": dataset.origin,
                "as_of": dataset.batch.as_of,
                "issues": dataset.issues,
                "summary": PortfolioSummary::of(&dataset.batch, horizon_days),
                "choices": {
                    "state": distinct_values(&dataset.batch, CanonicalField::State),
                    "status": distinct_values(&dataset.batch, CanonicalField::Status),
                    "operator": distinct_values(&dataset.batch, CanonicalField::Operator),
                },
                "filtered": filtered,
                "expiring": expiring,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Validate { path } => {
            let body = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            let file_name = path.display().to_string();
            let table = decode_upload(&file_name, &body).with_context(|| format!("decoding {file_name}"))?;
            let missing = table.missing_columns(CANONICAL_COLUMNS);
            if !missing.is_empty() {
                eprintln!(
                    "{file_name} is missing required columns: {}\nexpected columns: {}",
                    missing.join(", "),
                    CANONICAL_COLUMNS.join(", ")
                );
                return Ok(ExitCode::FAILURE);
            }
            println!("{file_name}: {} rows, all canonical columns present", table.len());
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_missing_aliases() -> SyncConfig {
        let mut config = SyncConfig::from_vars(|_| None);
        config.aliases_path = Some(PathBuf::from("/nonexistent/dpt-aliases.yaml"));
        config
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[tokio::test]
    async fn sample_mode_ignores_fetcher_configuration() {
        let dataset = load_for_mode(&config_with_missing_aliases(), DataMode::Sample, None, today())
            .await
            .unwrap();
        assert_eq!(dataset.origin, DataMode::Sample);
        assert!(!dataset.batch.is_empty());
    }

    #[tokio::test]
    async fn live_mode_reports_a_bad_alias_file() {
        let err = load_for_mode(&config_with_missing_aliases(), DataMode::Live, None, today())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("dpt-aliases.yaml"));
    }

    #[tokio::test]
    async fn upload_mode_requires_a_path() {
        let err = load_for_mode(&SyncConfig::from_vars(|_| None), DataMode::Upload, None, today())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--upload"));
    }
}
