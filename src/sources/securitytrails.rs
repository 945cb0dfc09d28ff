// src/sources/securitytrails.rs
use crate::error::{ReconError, Result};
use crate::session::Session;
use crate::sources::{pick_api_key, ProviderResult, Source};
use crate::types::{ProviderRecord, SourceInfo};
use crate::utils::qualify_label;
use async_trait::async_trait;
use log::{info, warn};
use serde::Deserialize;
use std::collections::HashSet;

const DEFAULT_BASE_URL: &str = "https://api.securitytrails.com";

#[derive(Debug, Deserialize)]
struct SecurityTrailsResponse {
    meta: Option<SecurityTrailsMeta>,
    subdomains: Option<Vec<String>>,
    subdomain_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SecurityTrailsMeta {
    limit_reached: Option<bool>,
}

/// Returns labels only; every name it yields goes through DNS resolution.
#[derive(Debug, Clone)]
pub struct SecurityTrailsSource {
    name: String,
    base_url: String,
    api_keys: Vec<String>,
}

impl Default for SecurityTrailsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityTrailsSource {
    pub fn new() -> Self {
        Self {
            name: "securitytrails".to_string(),
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

        let url = format!("{}/v1/domain/{}/subdomains", self.base_url, domain);
        let response: SecurityTrailsResponse = session
            .get_json(
                &self.name,
                &url,
                &[("APIKEY", api_key.as_str()), ("Accept", "application/json")],
            )
            .await?;

        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for label in response.subdomains.unwrap_or_default() {
            let label = label.trim();
            if label.is_empty() {
                continue;
            }
            let hostname = qualify_label(label, domain);
            if seen.insert(hostname.clone()) {
                records.push(ProviderRecord::bare(hostname));
            }
        }

        if let Some(true) = response.meta.and_then(|meta| meta.limit_reached) {
            warn!(
                "[{}] Result limit reached, upstream reports {:?} subdomains in total",
                self.name, response.subdomain_count
            );
        }

        info!(
            "[{}] Found {} subdomains, queued for DNS resolution",
            self.name,
            records.len()
        );
        Ok(records)
    }
}

#[async_trait]
impl Source for SecurityTrailsSource {
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
