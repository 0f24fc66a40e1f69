//! Memoized per-jurisdiction retrieval: transport -> decode -> harmonize.

use std::sync::Arc;
use std::time::Duration;

use dpt_core::{AliasTable, Table};
use dpt_storage::{PayloadTransport, TransportError, TtlCache};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::decode::{decode_payload, DecodeError};
use crate::harmonize::SchemaHarmonizer;

pub const FETCH_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    pub url: String,
    pub jurisdiction: String,
}

#[derive(Debug, Error)]
pub enum FetchCause {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("could not decode payload: {0}")]
    Decode(#[from] DecodeError),
}

/// One source could not produce a batch; never partially successful.
#[derive(Debug, Error)]
#[error("{jurisdiction} source unavailable: {cause}")]
pub struct FetchError {
    pub jurisdiction: String,
    pub cause: FetchCause,
}

impl FetchError {
    fn new(jurisdiction: &str, cause: impl Into<FetchCause>) -> Self {
        Self {
            jurisdiction: jurisdiction.to_string(),
            cause: cause.into(),
        }
    }
}

pub struct SourceFetcher {
    transport: Arc<dyn PayloadTransport>,
    harmonizer: SchemaHarmonizer,
    cache: TtlCache<SourceKey, Table>,
}

impl SourceFetcher {
    pub fn new(transport: Arc<dyn PayloadTransport>, aliases: Arc<AliasTable>) -> Self {
        Self {
            transport,
            harmonizer: SchemaHarmonizer::new(aliases),
            cache: TtlCache::new(FETCH_CACHE_TTL),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = TtlCache::new(ttl);
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache.ttl()
    }

    /// Harmonized batch for one source, served from cache while fresh.
    ///
    /// The returned table is an independent copy of the cached one.
    pub async fn fetch(&self, url: &str, jurisdiction: &str) -> Result<Table, FetchError> {
        let key = SourceKey {
            url: url.to_string(),
            jurisdiction: jurisdiction.to_string(),
        };
        let (table, cached) = self
            .cache
            .get_or_try_insert_with(key, || self.fetch_uncached(url, jurisdiction))
            .await?;
        if cached {
            debug!(jurisdiction, url, rows = table.len(), "fetch cache hit");
        }
        Ok(table)
    }

    /// Clear every cached batch; the next fetch of any source goes to the network.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all().await;
        info!("fetch cache invalidated");
    }

    async fn fetch_uncached(&self, url: &str, jurisdiction: &str) -> Result<Table, FetchError> {
        let payload = self
            .transport
            .fetch_payload(url)
            .await
            .map_err(|err| FetchError::new(jurisdiction, err))
            .inspect_err(|err| warn!(jurisdiction, url, error = %err.cause, "source fetch failed"))?;

        let raw = decode_payload(&payload.body, &payload.content_type)
            .map_err(|err| FetchError::new(jurisdiction, err))
            .inspect_err(|err| {
                warn!(
                    jurisdiction,
                    url,
                    content_type = %payload.content_type,
                    error = %err.cause,
                    "source payload could not be decoded"
                )
            })?;

        let table = self.harmonizer.harmonize(&raw, jurisdiction);
        info!(
            jurisdiction,
            url,
            content_type = %payload.content_type,
            rows = table.len(),
            "fetched and harmonized source"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dpt_storage::StaticTransport;
    use serde_json::json;

    const TX_URL: &str = "https://rrc.example/tx/permits.csv";

    fn fetcher_with(transport: Arc<StaticTransport>) -> SourceFetcher {
        SourceFetcher::new(transport, Arc::new(AliasTable::standard()))
    }

    #[tokio::test]
    async fn repeated_fetch_within_ttl_hits_network_once() {
        let transport = Arc::new(StaticTransport::new().with_payload(
            TX_URL,
            "text/csv",
            "Permit_No,Operator\n001,Lone Star Energy\n",
        ));
        let fetcher = fetcher_with(transport.clone());

        let first = fetcher.fetch(TX_URL, "TX").await.unwrap();
        let second = fetcher.fetch(TX_URL, "TX").await.unwrap();

        assert_eq!(transport.calls(), 1);
        assert_eq!(first, second);
        assert_eq!(first.value(0, "operator"), Some(&json!("Lone Star Energy")));
        assert_eq!(first.value(0, "state"), Some(&json!("TX")));
    }

    #[tokio::test]
    async fn invalidation_forces_a_new_network_call() {
        let transport = Arc::new(StaticTransport::new().with_payload(TX_URL, "text/csv", "permit_no\n1\n"));
        let fetcher = fetcher_with(transport.clone());

        fetcher.fetch(TX_URL, "TX").await.unwrap();
        transport.replace_payload(TX_URL, "text/csv", "permit_no\n1\n2\n");
        fetcher.invalidate_all().await;
        let refreshed = fetcher.fetch(TX_URL, "TX").await.unwrap();

        assert_eq!(transport.calls(), 2);
        assert_eq!(refreshed.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_one_hour() {
        let transport = Arc::new(StaticTransport::new().with_payload(TX_URL, "text/csv", "permit_no\n1\n"));
        let fetcher = fetcher_with(transport.clone());

        fetcher.fetch(TX_URL, "TX").await.unwrap();
        tokio::time::advance(Duration::from_secs(59 * 60)).await;
        fetcher.fetch(TX_URL, "TX").await.unwrap();
        assert_eq!(transport.calls(), 1);

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        fetcher.fetch(TX_URL, "TX").await.unwrap();
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn cache_key_includes_jurisdiction() {
        let transport = Arc::new(StaticTransport::new().with_payload(TX_URL, "text/csv", "county\nReeves\n"));
        let fetcher = fetcher_with(transport.clone());

        let tx = fetcher.fetch(TX_URL, "TX").await.unwrap();
        let la = fetcher.fetch(TX_URL, "LA").await.unwrap();

        assert_eq!(transport.calls(), 2);
        assert_eq!(tx.value(0, "permit_id"), Some(&json!("TX-AUTO-000001")));
        assert_eq!(la.value(0, "permit_id"), Some(&json!("LA-AUTO-000001")));
    }

    #[tokio::test]
    async fn failures_are_not_cached_and_carry_jurisdiction() {
        let transport = Arc::new(StaticTransport::new().with_status(TX_URL, 502));
        let fetcher = fetcher_with(transport.clone());

        let err = fetcher.fetch(TX_URL, "TX").await.unwrap_err();
        assert_eq!(err.jurisdiction, "TX");
        assert!(matches!(
            err.cause,
            FetchCause::Transport(TransportError::HttpStatus { status: 502, .. })
        ));

        fetcher.fetch(TX_URL, "TX").await.unwrap_err();
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn undecodable_payload_is_a_fetch_error() {
        let transport = Arc::new(StaticTransport::new().with_payload(TX_URL, "application/json", "{not json"));
        let err = fetcher_with(transport).fetch(TX_URL, "TX").await.unwrap_err();
        assert!(matches!(err.cause, FetchCause::Decode(DecodeError::Json(_))));
        assert!(err.to_string().starts_with("TX source unavailable"));
    }

    #[tokio::test]
    async fn callers_get_independent_copies() {
        let transport = Arc::new(StaticTransport::new().with_payload(TX_URL, "text/csv", "permit_no\n1\n"));
        let fetcher = fetcher_with(transport.clone());

        let mut first = fetcher.fetch(TX_URL, "TX").await.unwrap();
        first.append(Table::empty_canonical());
        first.push_row(dpt_core::RawRecord::new());

        let second = fetcher.fetch(TX_URL, "TX").await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(transport.calls(), 1);
    }
}
