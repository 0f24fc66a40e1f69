//! Partial-failure ingestion across the configured jurisdiction sources.

use dpt_adapters::{FetchError, SourceFetcher};
use dpt_core::{IngestionIssue, Table};
use tracing::{info, warn};

use crate::config::SourceEndpoint;

pub const EMPTY_URL_CAUSE: &str = "source URL is empty";

/// Concatenated rows from every source that produced any, plus one issue per source that did not.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveLoad {
    pub batch: Table,
    pub issues: Vec<IngestionIssue>,
}

enum SourceOutcome {
    Loaded(Table),
    Empty,
    Unconfigured,
    Failed(FetchError),
}

impl SourceOutcome {
    fn issue(&self, jurisdiction: &str) -> Option<IngestionIssue> {
        match self {
            SourceOutcome::Loaded(_) => None,
            SourceOutcome::Empty => Some(IngestionIssue::new(
                jurisdiction,
                format!("{jurisdiction} returned no rows"),
            )),
            SourceOutcome::Unconfigured => Some(IngestionIssue::new(jurisdiction, EMPTY_URL_CAUSE)),
            SourceOutcome::Failed(err) => Some(IngestionIssue::new(
                jurisdiction,
                format!("{jurisdiction} fetch failed: {}", err.cause),
            )),
        }
    }
}

async fn fetch_source(fetcher: &SourceFetcher, source: &SourceEndpoint) -> SourceOutcome {
    let Some(url) = source.usable_url() else {
        return SourceOutcome::Unconfigured;
    };
    match fetcher.fetch(url, &source.jurisdiction).await {
        Ok(table) if table.is_empty() => SourceOutcome::Empty,
        Ok(table) => SourceOutcome::Loaded(table),
        Err(err) => SourceOutcome::Failed(err),
    }
}

/// Fetch every source in order; a failing source never stops the others.
///
/// When nothing loads, the batch is the empty canonical table. Substituting other data
/// is left to the caller.
pub async fn load_live(fetcher: &SourceFetcher, sources: &[SourceEndpoint]) -> LiveLoad {
    let mut batch: Option<Table> = None;
    let mut issues = Vec::new();

    for source in sources {
        let outcome = fetch_source(fetcher, source).await;
        if let Some(issue) = outcome.issue(&source.jurisdiction) {
            warn!(jurisdiction = %source.jurisdiction, message = %issue.message, "ingestion issue");
            issues.push(issue);
        }
        if let SourceOutcome::Loaded(table) = outcome {
            match batch.as_mut() {
                Some(acc) => acc.append(table),
                None => batch = Some(table),
            }
        }
    }

    let batch = batch.unwrap_or_else(Table::empty_canonical);
    info!(
        sources = sources.len(),
        rows = batch.len(),
        issues = issues.len(),
        "live load finished"
    );
    LiveLoad { batch, issues }
}
