use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dpt_adapters::{SourceFetcher, FETCH_CACHE_TTL};
use dpt_core::AliasTable;
use dpt_storage::{HttpClientConfig, HttpFetcher, DEFAULT_FETCH_TIMEOUT};

pub const TX_JURISDICTION: &str = "TX";
pub const LA_JURISDICTION: &str = "LA";
pub const DEFAULT_PERMITS_TABLE: &str = "drilling_permits";

/// One configured jurisdiction endpoint; a missing or blank URL is reported, not fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEndpoint {
    pub jurisdiction: String,
    pub url: Option<String>,
}

impl SourceEndpoint {
    pub fn new(jurisdiction: impl Into<String>, url: Option<String>) -> Self {
        Self {
            jurisdiction: jurisdiction.into(),
            url,
        }
    }

    /// The URL when it is set and not blank.
    pub fn usable_url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub tx_url: Option<String>,
    pub la_url: Option<String>,
    pub database_url: Option<String>,
    pub permits_table: String,
    pub http_timeout_secs: u64,
    pub fetch_cache_ttl_secs: u64,
    pub user_agent: String,
    pub reports_dir: PathBuf,
    pub aliases_path: Option<PathBuf>,
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from any variable lookup; blank values count as unset.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            tx_url: var("TX_RRC_EXPORT_URL"),
            la_url: var("LA_SONRIS_EXPORT_URL"),
            database_url: var("POSTGRES_URL").or_else(|| var("DATABASE_URL")),
            permits_table: var("PERMITS_TABLE").unwrap_or_else(|| DEFAULT_PERMITS_TABLE.to_string()),
            http_timeout_secs: var("DPT_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_FETCH_TIMEOUT.as_secs()),
            fetch_cache_ttl_secs: var("DPT_FETCH_CACHE_TTL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(FETCH_CACHE_TTL.as_secs()),
            user_agent: var("DPT_USER_AGENT").unwrap_or_else(|| "dpt-bot/0.1".to_string()),
            reports_dir: var("DPT_REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./reports")),
            aliases_path: var("DPT_ALIASES_PATH").map(PathBuf::from),
        }
    }

    /// Configured endpoints in fetch order: Texas, then Louisiana.
    pub fn sources(&self) -> Vec<SourceEndpoint> {
        vec![
            SourceEndpoint::new(TX_JURISDICTION, self.tx_url.clone()),
            SourceEndpoint::new(LA_JURISDICTION, self.la_url.clone()),
        ]
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_secs(self.http_timeout_secs),
            user_agent: Some(self.user_agent.clone()),
        }
    }

    pub fn fetch_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.fetch_cache_ttl_secs)
    }

    pub fn load_aliases(&self) -> Result<AliasTable> {
        match &self.aliases_path {
            Some(path) => load_alias_file(path),
            None => Ok(AliasTable::standard()),
        }
    }

    /// HTTP-backed fetcher wired with this configuration's timeout, TTL and aliases.
    pub fn build_fetcher(&self) -> Result<SourceFetcher> {
        let http = HttpFetcher::new(self.http_client_config())?;
        let aliases = self.load_aliases()?;
        Ok(SourceFetcher::new(Arc::new(http), Arc::new(aliases)).with_cache_ttl(self.fetch_cache_ttl()))
    }
}

pub fn load_alias_file(path: &Path) -> Result<AliasTable> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}
