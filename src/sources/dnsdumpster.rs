// src/sources/dnsdumpster.rs
use crate::error::{ReconError, Result};
use crate::session::Session;
use crate::sources::{pick_api_key, ProviderResult, Source};
use crate::types::{ProviderRecord, SourceInfo};
use async_trait::async_trait;
use log::info;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://api.dnsdumpster.com";

#[derive(Debug, Deserialize)]
struct DnsDumpsterResponse {
    #[serde(default)]
    a: Vec<DnsDumpsterHost>,
}

#[derive(Debug, Deserialize)]
struct DnsDumpsterHost {
    host: Option<String>,
    #[serde(default)]
    ips: Vec<DnsDumpsterIp>,
}

#[derive(Debug, Deserialize)]
struct DnsDumpsterIp {
    ip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DnsDumpsterSource {
    name: String,
    base_url: String,
    api_keys: Vec<String>,
}

impl Default for DnsDumpsterSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsDumpsterSource {
    pub fn new() -> Self {
        Self {
            name: "dnsdumpster".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_keys: Vec::new(),
        }
    }

    pub fn with_api_keys(mut self, keys: Vec<String>) -> Self {
        self.api_keys = keys;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    async fn fetch_records(&self, domain: &str, session: &Session) -> Result<Vec<ProviderRecord>> {
        let api_key = pick_api_key(&self.api_keys)
            .ok_or_else(|| ReconError::authentication(&self.name, "No API key configured"))?;

        let url = format!("{}/domain/{}", self.base_url, domain);
        let response: DnsDumpsterResponse = session
            .get_json(&self.name, &url, &[("X-API-Key", api_key.as_str())])
            .await?;

        let records: Vec<ProviderRecord> = response
            .a
            .into_iter()
            .filter_map(|entry| {
                let host = entry.host?.trim().to_string();
                if host.is_empty() {
                    return None;
                }
                let ips = entry
                    .ips
                    .into_iter()
                    .filter_map(|ip| ip.ip)
                    .map(|ip| ip.trim().to_string())
                    .filter(|ip| !ip.is_empty())
                    .collect();
                Some(ProviderRecord::new(host, ips))
            })
            .collect();

        info!("[{}] Found {} hosts", self.name, records.len());
        Ok(records)
    }
}

#[async_trait]
impl Source for DnsDumpsterSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name().to_string(),
            needs_key: true,
            paginated: false,
        }
    }

    fn clone_source(&self) -> Box<dyn Source> {
        Box::new(self.clone())
    }

    async fn fetch(&self, domain: &str, session: &Session) -> ProviderResult {
        info!("[{}] Fetching subdomains...", self.name);
        self.fetch_records(domain, session).await.into()
    }
}
