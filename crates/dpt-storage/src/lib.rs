//! HTTP payload transport + TTL fetch cache for DPT.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::{info_span, Instrument};

mod cache;
mod static_transport;

pub use cache::TtlCache;
pub use static_transport::StaticTransport;

pub const CRATE_NAME: &str = "dpt-storage";

/// Fixed per-fetch timeout; expiry is reported like any other transport failure.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            user_agent: None,
        }
    }
}

/// Successful response body plus the declared content type (lower-cased, possibly empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPayload {
    pub status: u16,
    pub final_url: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Request(err) if err.is_timeout())
    }
}

/// Single-attempt retrieval of a source payload.
#[async_trait]
pub trait PayloadTransport: Send + Sync {
    async fn fetch_payload(&self, url: &str) -> Result<FetchedPayload, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self { client })
    }

    async fn get_once(&self, url: &str) -> Result<FetchedPayload, TransportError> {
        let resp = self.client.get(url).send().await?;

        let status = resp.status();
        let final_url = resp.url().to_string();

        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                url: final_url,
            });
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let body = resp.bytes().await?.to_vec();

        Ok(FetchedPayload {
            status: status.as_u16(),
            final_url,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl PayloadTransport for HttpFetcher {
    async fn fetch_payload(&self, url: &str) -> Result<FetchedPayload, TransportError> {
        self.get_once(url)
            .instrument(info_span!("http_fetch", url))
            .await
    }
}
