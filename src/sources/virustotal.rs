// src/sources/virustotal.rs
use crate::error::ReconError;
use crate::session::Session;
use crate::sources::{pick_api_key, ProviderResult, Source};
use crate::types::{ProviderRecord, SourceInfo};
use async_trait::async_trait;
use log::{info, warn};
use serde::Deserialize;
use std::collections::HashSet;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.virustotal.com";
const PAGE_SIZE: usize = 40;

#[derive(Debug, Deserialize)]
struct VirusTotalResponse {
    #[serde(default)]
    data: Vec<VirusTotalData>,
    #[serde(default)]
    links: Option<VirusTotalLinks>,
}

#[derive(Debug, Deserialize)]
struct VirusTotalLinks {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VirusTotalData {
    id: String,
    #[serde(default)]
    attributes: Option<VirusTotalAttributes>,
}

#[derive(Debug, Deserialize)]
struct VirusTotalAttributes {
    #[serde(default)]
    last_dns_records: Option<Vec<DnsRecord>>,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    #[serde(rename = "type")]
    record_type: String,
    value: String,
}

impl VirusTotalData {
    fn into_record(self) -> Option<ProviderRecord> {
        let name = self.id.trim().to_string();
        if name.is_empty() {
            return None;
        }
        let ips = self
            .attributes
            .and_then(|attributes| attributes.last_dns_records)
            .unwrap_or_default()
            .into_iter()
            .filter(|record| record.record_type == "A")
            .map(|record| record.value)
            .collect();
        Some(ProviderRecord::new(name, ips))
    }
}

/// Walks the paginated subdomain listing, sleeping between pages.
#[derive(Debug, Clone)]
pub struct VirusTotalSource {
    name: String,
    base_url: String,
    api_keys: Vec<String>,
}

impl Default for VirusTotalSource {
    fn default() -> Self {
        Self::new()
    }
}

impl VirusTotalSource {
    pub fn new() -> Self {
        Self {
            name: "virustotal".to_string(),
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

    fn next_page(&self, links: Option<VirusTotalLinks>) -> Result<Option<String>, ReconError> {
        match links.and_then(|links| links.next) {
            Some(link) => Url::parse(&link)
                .map(|url| Some(url.into()))
                .map_err(|e| ReconError::parse(&self.name, format!("Invalid next page link: {}", e), &link)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Source for VirusTotalSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name().to_string(),
            needs_key: true,
            paginated: true,
        }
    }

    fn clone_source(&self) -> Box<dyn Source> {
        Box::new(self.clone())
    }

    async fn fetch(&self, domain: &str, session: &Session) -> ProviderResult {
        let api_key = match pick_api_key(&self.api_keys) {
            Some(key) => key,
            None => {
                return ProviderResult::failed(ReconError::authentication(&self.name, "No API key configured"));
            }
        };

        info!("[{}] Fetching subdomains...", self.name);

        let mut records = Vec::new();
        let mut visited = HashSet::new();
        let mut pages = 0;
        let mut next = Some(format!(
            "{}/api/v3/domains/{}/subdomains?limit={}",
            self.base_url, domain, PAGE_SIZE
        ));

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                warn!("[{}] Next page link repeats an earlier page, stopping", self.name);
                break;
            }
            if pages > 0 {
                session.pause_between_pages().await;
            }

            info!("[{}] Fetching page number {}...", self.name, pages + 1);
            let page: VirusTotalResponse = match session
                .get_json(&self.name, &url, &[("x-apikey", api_key.as_str())])
                .await
            {
                Ok(page) => page,
                Err(e) => return ProviderResult::partial(records, pages, e),
            };
            pages += 1;

            records.extend(page.data.into_iter().filter_map(VirusTotalData::into_record));

            next = match self.next_page(page.links) {
                Ok(next) => next,
                Err(e) => return ProviderResult::partial(records, pages, e),
            };
        }

        info!(
            "[{}] Found {} subdomains across {} pages",
            self.name,
            records.len(),
            pages
        );
        ProviderResult::complete(records, pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Config;
    use mockito::Matcher;
    use std::time::Duration;

    const PATH: &str = "/api/v3/domains/example.com/subdomains";

    fn session() -> Session {
        session_with_delay(Duration::from_millis(5))
    }

    fn session_with_delay(page_delay: Duration) -> Session {
        let mut config = Config::default();
        config.rate_limits.clear();
        config.page_delay = page_delay;
        Session::new(&config).unwrap()
    }

    fn page_body(items: &[(&str, &str)], next: Option<String>) -> String {
        let data: Vec<serde_json::Value> = items
            .iter()
            .map(|(id, ips)| {
                let records: Vec<serde_json::Value> = ips
                    .split_whitespace()
                    .map(|ip| serde_json::json!({"type": "A", "value": ip, "ttl": 300}))
                    .chain(std::iter::once(serde_json::json!({"type": "MX", "value": "mx.example.com"})))
                    .collect();
                serde_json::json!({"id": id, "type": "domain", "attributes": {"last_dns_records": records}})
            })
            .collect();
        let mut body = serde_json::json!({"data": data, "meta": {"count": items.len()}});
        if let Some(next) = next {
            body["links"] = serde_json::json!({"self": "ignored", "next": next});
        }
        body.to_string()
    }

    #[tokio::test]
    async fn test_follows_every_page_once() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        let first = server
            .mock("GET", PATH)
            .match_query(Matcher::Exact("limit=40".to_string()))
            .match_header("x-apikey", "vt-key")
            .with_body(page_body(
                &[("a.example.com", "10.0.0.1")],
                Some(format!("{}{}?limit=40&cursor=p2", base, PATH)),
            ))
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", PATH)
            .match_query(Matcher::UrlEncoded("cursor".to_string(), "p2".to_string()))
            .with_body(page_body(
                &[("b.example.com", "10.0.0.2 10.0.0.3"), ("c.example.com", "")],
                Some(format!("{}{}?limit=40&cursor=p3", base, PATH)),
            ))
            .expect(1)
            .create_async()
            .await;
        let third = server
            .mock("GET", PATH)
            .match_query(Matcher::UrlEncoded("cursor".to_string(), "p3".to_string()))
            .with_body(page_body(&[("d.example.com", "10.0.0.4")], None))
            .expect(1)
            .create_async()
            .await;

        let source = VirusTotalSource::new()
            .with_api_keys(vec!["vt-key".to_string()])
            .with_base_url(base.clone());
        let result = source.fetch("example.com", &session()).await;

        first.assert_async().await;
        second.assert_async().await;
        third.assert_async().await;

        assert!(result.is_ok());
        assert_eq!(result.pages, 3);
        assert_eq!(
            result.records,
            vec![
                ProviderRecord::new("a.example.com", vec!["10.0.0.1".to_string()]),
                ProviderRecord::new("b.example.com", vec!["10.0.0.2".to_string(), "10.0.0.3".to_string()]),
                ProviderRecord::bare("c.example.com"),
                ProviderRecord::new("d.example.com", vec!["10.0.0.4".to_string()]),
            ]
        );
    }

    #[tokio::test]
    async fn test_broken_page_keeps_earlier_pages() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        let _first = server
            .mock("GET", PATH)
            .match_query(Matcher::Exact("limit=40".to_string()))
            .with_body(page_body(
                &[("a.example.com", "10.0.0.1")],
                Some(format!("{}{}?limit=40&cursor=p2", base, PATH)),
            ))
            .create_async()
            .await;
        let _second = server
            .mock("GET", PATH)
            .match_query(Matcher::UrlEncoded("cursor".to_string(), "p2".to_string()))
            .with_body("{\"data\": [")
            .create_async()
            .await;

        let source = VirusTotalSource::new()
            .with_api_keys(vec!["vt-key".to_string()])
            .with_base_url(base);
        let result = source.fetch("example.com", &session()).await;

        assert!(matches!(result.error, Some(ReconError::ParseError { .. })));
        assert_eq!(result.pages, 1);
        assert_eq!(result.records, vec![ProviderRecord::new("a.example.com", vec!["10.0.0.1".to_string()])]);
    }

    #[tokio::test]
    async fn test_upstream_error_on_first_page() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", PATH)
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body(r#"{"error": {"code": "QuotaExceededError"}}"#)
            .create_async()
            .await;

        let source = VirusTotalSource::new()
            .with_api_keys(vec!["vt-key".to_string()])
            .with_base_url(server.url());
        let result = source.fetch("example.com", &session()).await;

        match result.error {
            Some(ReconError::UpstreamError { status, body, .. }) => {
                assert_eq!(status, 429);
                assert!(body.contains("QuotaExceededError"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(result.pages, 0);
    }

    #[tokio::test]
    async fn test_repeated_link_terminates() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        let looping = server
            .mock("GET", PATH)
            .match_query(Matcher::Exact("limit=40".to_string()))
            .with_body(page_body(
                &[("a.example.com", "10.0.0.1")],
                Some(format!("{}{}?limit=40", base, PATH)),
            ))
            .expect(1)
            .create_async()
            .await;

        let source = VirusTotalSource::new()
            .with_api_keys(vec!["vt-key".to_string()])
            .with_base_url(base);
        let result = source.fetch("example.com", &session()).await;

        looping.assert_async().await;
        assert!(result.is_ok());
        assert_eq!(result.pages, 1);
    }

    #[tokio::test]
    async fn test_sleeps_between_pages() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        let _first = server
            .mock("GET", PATH)
            .match_query(Matcher::Exact("limit=40".to_string()))
            .with_body(page_body(
                &[("a.example.com", "10.0.0.1")],
                Some(format!("{}{}?limit=40&cursor=p2", base, PATH)),
            ))
            .create_async()
            .await;
        let _second = server
            .mock("GET", PATH)
            .match_query(Matcher::UrlEncoded("cursor".to_string(), "p2".to_string()))
            .with_body(page_body(
                &[("b.example.com", "10.0.0.2")],
                Some(format!("{}{}?limit=40&cursor=p3", base, PATH)),
            ))
            .create_async()
            .await;
        let _third = server
            .mock("GET", PATH)
            .match_query(Matcher::UrlEncoded("cursor".to_string(), "p3".to_string()))
            .with_body(page_body(&[("c.example.com", "10.0.0.3")], None))
            .create_async()
            .await;

        let delay = Duration::from_millis(150);
        let source = VirusTotalSource::new()
            .with_api_keys(vec!["vt-key".to_string()])
            .with_base_url(base);

        let started = std::time::Instant::now();
        let result = source.fetch("example.com", &session_with_delay(delay)).await;
        let elapsed = started.elapsed();

        assert!(result.is_ok());
        assert_eq!(result.pages, 3);
        assert!(elapsed >= delay * 2, "three pages took only {:?}", elapsed);
    }
}
