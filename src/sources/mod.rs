// src/sources/mod.rs
use crate::error::ReconError;
use crate::session::Session;
use crate::types::{Config, ProviderRecord, SourceInfo, DEFAULT_SOURCES};
use async_trait::async_trait;
use rand::seq::SliceRandom;

mod dnsdumpster;
mod hackertarget;
mod securitytrails;
mod virustotal;

pub use dnsdumpster::DnsDumpsterSource;
pub use hackertarget::HackerTargetSource;
pub use securitytrails::SecurityTrailsSource;
pub use virustotal::VirusTotalSource;

/// Everything one adapter invocation produced.
///
/// `records` holds whatever was collected before `error` occurred, so a
/// paginated source that fails on page three still hands back pages one and two.
#[derive(Debug, Default)]
pub struct ProviderResult {
    pub records: Vec<ProviderRecord>,
    pub pages: usize,
    pub error: Option<ReconError>,
}

impl ProviderResult {
    pub fn complete(records: Vec<ProviderRecord>, pages: usize) -> Self {
        Self { records, pages, error: None }
    }

    pub fn failed(error: ReconError) -> Self {
        Self { records: Vec::new(), pages: 0, error: Some(error) }
    }

    pub fn partial(records: Vec<ProviderRecord>, pages: usize, error: ReconError) -> Self {
        Self { records, pages, error: Some(error) }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl From<Result<Vec<ProviderRecord>, ReconError>> for ProviderResult {
    fn from(result: Result<Vec<ProviderRecord>, ReconError>) -> Self {
        match result {
            Ok(records) => ProviderResult::complete(records, 1),
            Err(error) => ProviderResult::failed(error),
        }
    }
}

#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;
    fn info(&self) -> SourceInfo;
    async fn fetch(&self, domain: &str, session: &Session) -> ProviderResult;
    fn clone_source(&self) -> Box<dyn Source>;
}

pub fn create_source(name: &str, config: &Config) -> Option<Box<dyn Source>> {
    let name = name.to_lowercase();
    let api_keys = config.api_keys.get(&name).cloned().unwrap_or_default();
    let endpoint = config.endpoints.get(&name).cloned();

    let source: Box<dyn Source> = match name.as_str() {
        "dnsdumpster" => {
            let mut source = DnsDumpsterSource::new().with_api_keys(api_keys);
            if let Some(url) = endpoint {
                source = source.with_base_url(url);
            }
            Box::new(source)
        }
        "securitytrails" => {
            let mut source = SecurityTrailsSource::new().with_api_keys(api_keys);
            if let Some(url) = endpoint {
                source = source.with_base_url(url);
            }
            Box::new(source)
        }
        "virustotal" => {
            let mut source = VirusTotalSource::new().with_api_keys(api_keys);
            if let Some(url) = endpoint {
                source = source.with_base_url(url);
            }
            Box::new(source)
        }
        "hackertarget" => {
            let mut source = HackerTargetSource::new().with_api_keys(api_keys);
            if let Some(url) = endpoint {
                source = source.with_base_url(url);
            }
            Box::new(source)
        }
        _ => return None,
    };

    Some(source)
}

/// All known sources in the fixed aggregation order.
pub fn get_all_sources(config: &Config) -> Vec<Box<dyn Source>> {
    DEFAULT_SOURCES
        .iter()
        .filter_map(|name| create_source(name, config))
        .collect()
}

pub fn requires_api_key(source_name: &str) -> bool {
    matches!(
        source_name.to_lowercase().as_str(),
        "dnsdumpster" | "securitytrails" | "virustotal"
    )
}

pub(crate) fn pick_api_key(keys: &[String]) -> Option<&String> {
    keys.choose(&mut rand::thread_rng())
}
