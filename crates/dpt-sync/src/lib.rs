//! Ingestion orchestration: multi-source live loads, normalization, dataset modes,
//! portfolio views and the standalone batch ingestion run.

pub mod batch;
pub mod config;
pub mod dataset;
pub mod export;
pub mod ingest;
pub mod normalize;
pub mod persist;
pub mod portfolio;

pub use batch::{run_batch_ingest, run_batch_ingest_from_env, BatchIngestOptions, IngestRunSummary, Persistence};
pub use config::{SourceEndpoint, SyncConfig, LA_JURISDICTION, TX_JURISDICTION};
pub use dataset::{load_dataset, DataMode, Dataset, DatasetError, DatasetInput};
pub use export::{export_snapshot, ParquetManifest, ParquetManifestFile};
pub use ingest::{load_live, LiveLoad};
pub use normalize::{days_to_expiry, normalize_and_validate, normalize_and_validate_as_of, parse_date};
pub use persist::{InvalidTableName, PgPermitSink, TableName};
pub use portfolio::{
    distinct_values, expiring_within, sort_for_listing, PermitFilter, PortfolioSummary,
    DEFAULT_EXPIRY_HORIZON_DAYS,
};

pub const CRATE_NAME: &str = "dpt-sync";
