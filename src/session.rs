// src/session.rs
use crate::error::{ReconError, Result};
use crate::types::Config;
use governor::{Jitter, Quota, RateLimiter};
use log::debug;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

type DirectLimiter = governor::DefaultDirectRateLimiter;

#[derive(Clone)]
pub struct Session {
    pub client: Client,
    rate_limiters: Arc<HashMap<String, Arc<DirectLimiter>>>,
    page_delay: Duration,
}

impl Session {
    pub fn new(config: &Config) -> Result<Self> {
        // Build HTTP client
        let mut client_builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .deflate(true)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10);

        if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| ReconError::ConfigError(format!("Invalid proxy URL: {}", e)))?;
            client_builder = client_builder.proxy(proxy);
        }

        let client = client_builder
            .build()
            .map_err(|e| ReconError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        // One limiter per source with a configured quota
        let mut rate_limiters = HashMap::new();
        for (source, rate_limit) in &config.rate_limits {
            if let Some(per_minute) = rate_limit.and_then(NonZeroU32::new) {
                let limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));
                rate_limiters.insert(source.clone(), limiter);
            }
        }

        Ok(Session {
            client,
            rate_limiters: Arc::new(rate_limiters),
            page_delay: config.page_delay,
        })
    }

    pub fn page_delay(&self) -> Duration {
        self.page_delay
    }

    pub async fn wait_for_rate_limit(&self, source: &str) {
        if let Some(limiter) = self.rate_limiters.get(source) {
            limiter.until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100))).await;
        }
    }

    /// Sleeps for the configured inter-page delay.
    pub async fn pause_between_pages(&self) {
        tokio::time::sleep(self.page_delay).await;
    }

    /// Issues a GET on behalf of `source` and returns the body of a 2xx response.
    ///
    /// Connection failures map to `TransportError`, 401/403 to
    /// `AuthenticationError` and any other non-success status to
    /// `UpstreamError` with the response body attached.
    pub async fn get_text(&self, source: &str, url: &str, headers: &[(&str, &str)]) -> Result<String> {
        self.wait_for_rate_limit(source).await;

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        debug!("[{}] GET {}", source, redact(url));
        let response = request
            .send()
            .await
            .map_err(|e| ReconError::transport(source, describe_transport(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ReconError::transport(source, format!("Failed to read response body: {}", e)))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ReconError::authentication(
                source,
                format!("API key rejected with status {}: {}", status.as_u16(), body.trim()),
            ));
        }
        if !status.is_success() {
            return Err(ReconError::upstream(source, status.as_u16(), &body));
        }

        Ok(body)
    }

    pub async fn get_json<T>(&self, source: &str, url: &str, headers: &[(&str, &str)]) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = self.get_text(source, url, headers).await?;
        serde_json::from_str(&body).map_err(|e| ReconError::parse(source, e.to_string(), &body))
    }
}

fn describe_transport(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {}", error)
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}

/// Drops the query string so keys passed as parameters never reach the log.
fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
