//! Mode selection for the interactive data path: live pull, user upload, or bundled sample.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use dpt_adapters::{decode_upload, sample_permits, DecodeError, SourceFetcher};
use dpt_core::{IngestionIssue, PermitBatch, SchemaError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SourceEndpoint;
use crate::ingest::load_live;
use crate::normalize::normalize_and_validate_as_of;

pub const SAMPLE_SOURCE: &str = "sample";
pub const SAMPLE_FALLBACK_MESSAGE: &str = "live sources returned no rows; showing sample data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataMode {
    Live,
    Upload,
    Sample,
}

impl DataMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DataMode::Live => "live",
            DataMode::Upload => "upload",
            DataMode::Sample => "sample",
        }
    }
}

impl fmt::Display for DataMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(DataMode::Live),
            "upload" => Ok(DataMode::Upload),
            "sample" => Ok(DataMode::Sample),
            other => Err(format!("unknown data mode `{other}` (expected live, upload or sample)")),
        }
    }
}

pub enum DatasetInput<'a> {
    Live {
        fetcher: &'a SourceFetcher,
        sources: &'a [SourceEndpoint],
    },
    /// Uploads are decoded but never harmonized.
    Upload { file_name: &'a str, body: &'a [u8] },
    Sample,
}

impl DatasetInput<'_> {
    pub fn mode(&self) -> DataMode {
        match self {
            DatasetInput::Live { .. } => DataMode::Live,
            DatasetInput::Upload { .. } => DataMode::Upload,
            DatasetInput::Sample => DataMode::Sample,
        }
    }
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("could not decode upload {file_name}: {source}")]
    Upload {
        file_name: String,
        #[source]
        source: DecodeError,
    },
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// A validated dataset together with where its rows actually came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub requested: DataMode,
    pub origin: DataMode,
    pub batch: PermitBatch,
    pub issues: Vec<IngestionIssue>,
}

impl Dataset {
    pub fn fell_back_to_sample(&self) -> bool {
        self.requested != self.origin
    }
}

/// Load, validate and annotate rows for `input`.
///
/// A live pull that yields no rows is replaced by the sample set, with an extra issue
/// saying so. Missing canonical columns are fatal in every mode.
pub async fn load_dataset(input: DatasetInput<'_>, today: NaiveDate) -> Result<Dataset, DatasetError> {
    let requested = input.mode();
    let (origin, table, issues) = match input {
        DatasetInput::Live { fetcher, sources } => {
            let mut live = load_live(fetcher, sources).await;
            if live.batch.is_empty() {
                warn!(issues = live.issues.len(), "no live rows; substituting sample data");
                live.issues
                    .push(IngestionIssue::new(SAMPLE_SOURCE, SAMPLE_FALLBACK_MESSAGE));
                (DataMode::Sample, sample_permits(today), live.issues)
            } else {
                (DataMode::Live, live.batch, live.issues)
            }
        }
        DatasetInput::Upload { file_name, body } => {
            let table = decode_upload(file_name, body).map_err(|source| DatasetError::Upload {
                file_name: file_name.to_string(),
                source,
            })?;
            (DataMode::Upload, table, Vec::new())
        }
        DatasetInput::Sample => (DataMode::Sample, sample_permits(today), Vec::new()),
    };

    let batch = normalize_and_validate_as_of(&table, today)
        .inspect_err(|err| warn!(mode = %requested, error = %err, "dataset failed schema validation"))?;
    info!(
        requested = %requested,
        origin = %origin,
        rows = batch.len(),
        issues = issues.len(),
        "dataset loaded"
    );
    Ok(Dataset {
        requested,
        origin,
        batch,
        issues,
    })
}
