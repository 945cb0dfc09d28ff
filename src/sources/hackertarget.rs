// src/sources/hackertarget.rs
use crate::error::{ReconError, Result};
use crate::session::Session;
use crate::sources::{pick_api_key, ProviderResult, Source};
use crate::types::{ProviderRecord, SourceInfo};
use async_trait::async_trait;
use log::info;

const DEFAULT_BASE_URL: &str = "https://api.hackertarget.com";

/// HackerTarget host search, `host,ip` per line.
#[derive(Debug, Clone)]
pub struct HackerTargetSource {
    name: String,
    base_url: String,
    api_keys: Vec<String>,
}

impl Default for HackerTargetSource {
    fn default() -> Self {
        Self::new()
    }
}

impl HackerTargetSource {
    pub fn new() -> Self {
        Self {
            name: "hackertarget".to_string(),
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
        let mut url = format!(
            "{}/hostsearch/?q={}",
            self.base_url,
            urlencoding::encode(domain)
        );
        if let Some(key) = pick_api_key(&self.api_keys) {
            url.push_str(&format!("&apikey={}", urlencoding::encode(key)));
        }

        let text = session.get_text(&self.name, &url, &[]).await?;
        parse_hostsearch(&self.name, &text)
    }
}

/// The service answers quota and argument problems with a 200 and a text message.
fn parse_hostsearch(source: &str, text: &str) -> Result<Vec<ProviderRecord>> {
    let trimmed = text.trim();
    let first_line = trimmed.lines().next().unwrap_or_default().to_lowercase();

    // Service messages are a single comma-free line; `host,ip` data never is.
    if !first_line.contains(',') {
        if first_line.is_empty() || first_line.starts_with("no records found") {
            return Ok(Vec::new());
        }
        if first_line.starts_with("error") || first_line.contains("api count exceeded") {
            return Err(ReconError::upstream(source, 200, trimmed));
        }
    }

    let records = trimmed
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.trim().split(',').collect();
            match parts.as_slice() {
                [host, ip] if !host.trim().is_empty() => {
                    let ip = ip.trim();
                    let ips = if ip.is_empty() { Vec::new() } else { vec![ip.to_string()] };
                    Some(ProviderRecord::new(host.trim(), ips))
                }
                _ => None,
            }
        })
        .collect();

    Ok(records)
}

#[async_trait]
impl Source for HackerTargetSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name().to_string(),
            needs_key: false,
            paginated: false,
        }
    }

    fn clone_source(&self) -> Box<dyn Source> {
        Box::new(self.clone())
    }

    async fn fetch(&self, domain: &str, session: &Session) -> ProviderResult {
        info!("[{}] Fetching subdomains...", self.name);
        let result: ProviderResult = self.fetch_records(domain, session).await.into();
        if result.is_ok() {
            info!("[{}] Found {} hosts", self.name, result.records.len());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Config;
    use mockito::Matcher;

    #[test]
    fn test_parse_lines() {
        let text = "www.example.com,93.184.216.34\n\nbroken-line\nmail.example.com,10.0.0.5\na,b,c\n";
        let records = parse_hostsearch("hackertarget", text).unwrap();
        assert_eq!(
            records,
            vec![
                ProviderRecord::new("www.example.com", vec!["93.184.216.34".to_string()]),
                ProviderRecord::new("mail.example.com", vec!["10.0.0.5".to_string()]),
            ]
        );
    }

    #[test]
    fn test_quota_message_is_upstream_error() {
        let err = parse_hostsearch("hackertarget", "API count exceeded - Increase Quota with Membership").unwrap_err();
        assert!(matches!(err, ReconError::UpstreamError { status: 200, .. }));

        let err = parse_hostsearch("hackertarget", "error check your search parameter").unwrap_err();
        assert!(matches!(err, ReconError::UpstreamError { .. }));
    }

    #[test]
    fn test_hosts_named_error_are_data() {
        let text = "errors.example.com,10.0.0.1\nwww.example.com,10.0.0.2\n";
        let records = parse_hostsearch("hackertarget", text).unwrap();
        assert_eq!(
            records,
            vec![
                ProviderRecord::new("errors.example.com", vec!["10.0.0.1".to_string()]),
                ProviderRecord::new("www.example.com", vec!["10.0.0.2".to_string()]),
            ]
        );

        let text = "error-pages.corp.example.com,10.0.0.3\napi-count-exceeded.example.com,10.0.0.4";
        assert_eq!(parse_hostsearch("hackertarget", text).unwrap().len(), 2);
    }

    #[test]
    fn test_no_records() {
        assert!(parse_hostsearch("hackertarget", "No records found").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_with_optional_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/hostsearch/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".to_string(), "example.com".to_string()),
                Matcher::UrlEncoded("apikey".to_string(), "ht".to_string()),
            ]))
            .with_body("api.example.com,10.1.1.1\n")
            .create_async()
            .await;

        let mut config = Config::default();
        config.rate_limits.clear();
        let session = Session::new(&config).unwrap();

        let source = HackerTargetSource::new()
            .with_api_keys(vec!["ht".to_string()])
            .with_base_url(server.url());
        let result = source.fetch("example.com", &session).await;

        mock.assert_async().await;
        assert_eq!(result.records, vec![ProviderRecord::new("api.example.com", vec!["10.1.1.1".to_string()])]);
    }

    #[tokio::test]
    async fn test_fetch_without_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/hostsearch/")
            .match_query(Matcher::Exact("q=example.com".to_string()))
            .with_body("www.example.com,10.2.2.2\n")
            .expect(1)
            .create_async()
            .await;

        let mut config = Config::default();
        config.rate_limits.clear();
        let session = Session::new(&config).unwrap();

        let source = HackerTargetSource::new().with_base_url(server.url());
        let result = source.fetch("example.com", &session).await;

        mock.assert_async().await;
        assert!(result.is_ok());
        assert_eq!(result.records, vec![ProviderRecord::new("www.example.com", vec!["10.2.2.2".to_string()])]);
    }
}
