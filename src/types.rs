// src/types.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Provider order used when no explicit selection is given.
pub const DEFAULT_SOURCES: [&str; 4] = ["dnsdumpster", "virustotal", "securitytrails", "hackertarget"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub timeout: Duration,
    pub user_agent: String,
    pub proxy: Option<String>,
    /// Requests per minute, keyed by source name.
    pub rate_limits: HashMap<String, Option<u32>>,
    pub api_keys: HashMap<String, Vec<String>>,
    /// Pause between two pages of a paginated provider.
    pub page_delay: Duration,
    pub parallel: bool,
    /// Base URL overrides, keyed by source name.
    pub endpoints: HashMap<String, String>,
    pub output: OutputConfig,
    pub resolver: ResolverConfig,
    pub correlation: CorrelationConfig,
    pub sources: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let mut rate_limits = HashMap::new();
        rate_limits.insert("virustotal".to_string(), Some(4));
        rate_limits.insert("securitytrails".to_string(), Some(10));
        rate_limits.insert("dnsdumpster".to_string(), Some(30));
        rate_limits.insert("hackertarget".to_string(), None);

        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("reconmerge/{}", env!("CARGO_PKG_VERSION")),
            proxy: None,
            rate_limits,
            api_keys: HashMap::new(),
            page_delay: Duration::from_millis(1000),
            parallel: false,
            endpoints: HashMap::new(),
            output: OutputConfig::default(),
            resolver: ResolverConfig::default(),
            correlation: CorrelationConfig::default(),
            sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: Option<String>,
    pub verbose: bool,
    pub silent: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            file: None,
            verbose: false,
            silent: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub enabled: bool,
    pub threads: usize,
    pub timeout: Duration,
    pub nameservers: Vec<String>,
    pub use_system_resolver: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threads: 50,
            timeout: Duration::from_secs(5),
            nameservers: vec![
                "8.8.8.8:53".to_string(),
                "8.8.4.4:53".to_string(),
                "1.1.1.1:53".to_string(),
                "1.0.0.1:53".to_string(),
            ],
            use_system_resolver: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Extra substrings marking a TXT value as generic.
    pub generic_patterns: Vec<String>,
    pub use_default_patterns: bool,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            generic_patterns: Vec::new(),
            use_default_patterns: true,
        }
    }
}

/// One `(name, ips)` tuple as produced by a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRecord {
    pub name: String,
    pub ips: Vec<String>,
}

impl ProviderRecord {
    pub fn new(name: impl Into<String>, ips: Vec<String>) -> Self {
        Self { name: name.into(), ips }
    }

    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn needs_resolution(&self) -> bool {
        self.ips.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdomainRecord {
    pub subdomain: String,
    pub ips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub name: String,
    pub found: usize,
    pub pages: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStats {
    pub queued: usize,
    pub resolved: usize,
    pub unresolved_count: usize,
    pub already_found_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationReport {
    pub domain: String,
    pub subdomains: Vec<SubdomainRecord>,
    pub providers: Vec<ProviderSummary>,
    pub resolution: ResolutionStats,
    pub duration: Duration,
    pub timestamp: String,
}

impl AggregationReport {
    pub fn failed_providers(&self) -> usize {
        self.providers.iter().filter(|p| p.error.is_some()).count()
    }
}

pub struct SourceInfo {
    pub name: String,
    pub needs_key: bool,
    pub paginated: bool,
}

/// One corpus row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxtRecord {
    pub txt_text: String,
    pub query_name: String,
}

impl TxtRecord {
    pub fn new(txt_text: impl Into<String>, query_name: impl Into<String>) -> Self {
        Self {
            txt_text: txt_text.into(),
            query_name: query_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationHit {
    pub fingerprint: String,
    pub query_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub target: String,
    pub hits: Vec<CorrelationHit>,
    pub rows_scanned: usize,
    pub rows_skipped: usize,
    pub discriminating_fingerprints: usize,
    pub target_fingerprints: usize,
}
