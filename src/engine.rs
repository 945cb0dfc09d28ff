use crate::cache::AggregationCache;
use crate::error::{ReconError, Result};
use crate::output::OutputManager;
use crate::resolver::{HostResolver, Resolver};
use crate::session::Session;
use crate::sources::{create_source, requires_api_key, ProviderResult, Source};
use crate::types::{AggregationReport, Config, ProviderSummary, ResolutionStats};
use crate::utils::is_valid_domain;
use futures::stream::{self, FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Providers currently in flight.
    Fetching(Vec<String>),
    Merging(String),
    Resolving,
    Done,
}

pub struct ReconEngine {
    config: Config,
    session: Session,
    sources: Vec<Box<dyn Source>>,
    resolver: Option<Arc<dyn HostResolver>>,
    cache: AggregationCache,
    phase: Phase,
}

impl ReconEngine {
    pub fn new(config: Config) -> Result<Self> {
        let mut sources = Vec::new();
        for name in &config.sources {
            match create_source(name, &config) {
                Some(source) => {
                    let has_key = config.api_keys.get(source.name()).map_or(false, |keys| !keys.is_empty());
                    if requires_api_key(source.name()) && !has_key {
                        warn!("No API key for {}, it will report an authentication error", source.name());
                    }
                    sources.push(source);
                }
                None => warn!("Unknown source: {}", name),
            }
        }

        let resolver: Option<Arc<dyn HostResolver>> = if config.resolver.enabled {
            Some(Arc::new(Resolver::new(&config.resolver)?))
        } else {
            None
        };

        Self::with_parts(config, sources, resolver)
    }

    /// Builds an engine around already constructed sources and resolver.
    pub fn with_parts(
        config: Config,
        sources: Vec<Box<dyn Source>>,
        resolver: Option<Arc<dyn HostResolver>>,
    ) -> Result<Self> {
        if sources.is_empty() {
            return Err(ReconError::ConfigError("No valid sources configured".to_string()));
        }

        let session = Session::new(&config)?;

        Ok(Self {
            config,
            session,
            sources,
            resolver,
            cache: AggregationCache::new(),
            phase: Phase::Idle,
        })
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn cache(&self) -> &AggregationCache {
        &self.cache
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Runs the aggregation and writes the report to the configured sink.
    ///
    /// Provider failures end up in the report; only a failed write is an error.
    pub async fn execute(&mut self, domain: &str) -> Result<AggregationReport> {
        let report = self.run(domain).await?;
        OutputManager::new(self.config.output.clone()).write_report(&report)?;
        Ok(report)
    }

    pub async fn run(&mut self, domain: &str) -> Result<AggregationReport> {
        let domain = domain.trim();
        if !is_valid_domain(domain) {
            return Err(ReconError::InvalidDomain(domain.to_string()));
        }

        info!("Collecting subdomains for: {}", domain);
        let start_time = Instant::now();
        self.cache = AggregationCache::new();

        let mut summaries: Vec<Option<ProviderSummary>> = vec![None; self.sources.len()];
        let mut queue = Vec::new();

        if self.config.parallel {
            self.fetch_parallel(domain, &mut summaries, &mut queue).await;
        } else {
            self.fetch_sequential(domain, &mut summaries, &mut queue).await;
        }

        let resolution = self.resolve_queue(queue).await;

        self.set_phase(Phase::Done);

        let providers: Vec<ProviderSummary> = summaries.into_iter().flatten().collect();
        for summary in &providers {
            match &summary.error {
                Some(e) => warn!("{}: {} entries before failure ({})", summary.name, summary.found, e),
                None => info!("{}: {} entries", summary.name, summary.found),
            }
        }
        info!(
            "Could not resolve IPs for {} subdomains. {} were found previously.",
            resolution.unresolved_count, resolution.already_found_count
        );
        info!("Found a total of {} unique subdomains.", self.cache.len());

        Ok(AggregationReport {
            domain: domain.to_string(),
            subdomains: self.cache.export(),
            providers,
            resolution,
            duration: start_time.elapsed(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        })
    }

    async fn fetch_sequential(
        &mut self,
        domain: &str,
        summaries: &mut [Option<ProviderSummary>],
        queue: &mut Vec<String>,
    ) {
        for index in 0..self.sources.len() {
            let source = self.sources[index].clone_source();
            self.set_phase(Phase::Fetching(vec![source.name().to_string()]));

            let started = Instant::now();
            let result = source.fetch(domain, &self.session).await;
            debug!("{}: fetch finished in {:?}", source.name(), started.elapsed());

            summaries[index] = Some(self.absorb(source.name(), result, queue));
        }
    }

    async fn fetch_parallel(
        &mut self,
        domain: &str,
        summaries: &mut [Option<ProviderSummary>],
        queue: &mut Vec<String>,
    ) {
        self.set_phase(Phase::Fetching(self.source_names()));

        let mut futures = FuturesUnordered::new();
        for (index, source) in self.sources.iter().enumerate() {
            let source = source.clone_source();
            let session = self.session.clone();
            let domain = domain.to_string();

            futures.push(async move {
                let result = source.fetch(&domain, &session).await;
                (index, source.name().to_string(), result)
            });
        }

        // Merges happen here, one completed provider at a time.
        while let Some((index, name, result)) = futures.next().await {
            summaries[index] = Some(self.absorb(&name, result, queue));
        }
    }

    /// Merges one provider's records; bare names are queued for resolution.
    fn absorb(&mut self, name: &str, result: ProviderResult, queue: &mut Vec<String>) -> ProviderSummary {
        self.set_phase(Phase::Merging(name.to_string()));

        let found = result.records.len();
        for record in result.records {
            if record.needs_resolution() {
                queue.push(record.name);
            } else {
                self.cache.merge(&record.name, record.ips);
            }
        }

        let error = result.error.map(|e| {
            error!("{}: {}", name, e);
            format!("{}: {}", e.kind(), e)
        });

        ProviderSummary {
            name: name.to_string(),
            found,
            pages: result.pages,
            error,
        }
    }

    async fn resolve_queue(&mut self, queue: Vec<String>) -> ResolutionStats {
        self.set_phase(Phase::Resolving);

        let mut stats = ResolutionStats {
            queued: queue.len(),
            ..ResolutionStats::default()
        };

        let mut seen = HashSet::new();
        let mut pending = Vec::new();
        for name in queue {
            if self.cache.contains(&name) || !seen.insert(name.clone()) {
                stats.already_found_count += 1;
            } else {
                pending.push(name);
            }
        }

        let resolver = match &self.resolver {
            Some(resolver) => resolver.clone(),
            None => {
                for name in pending {
                    self.cache.merge(&name, Vec::new());
                    stats.unresolved_count += 1;
                }
                return stats;
            }
        };

        if pending.is_empty() {
            return stats;
        }

        info!("Starting DNS resolution for {} subdomains...", pending.len());
        let progress = self.progress_bar(pending.len() as u64);

        let mut lookups = stream::iter(pending)
            .map(|name| {
                let resolver = resolver.clone();
                async move {
                    let answer = resolver.resolve(&name).await;
                    (name, answer)
                }
            })
            .buffer_unordered(self.config.resolver.threads.max(1));

        while let Some((name, answer)) = lookups.next().await {
            match answer {
                Ok(Some(ip)) => {
                    self.cache.merge(&name, vec![ip.to_string()]);
                    stats.resolved += 1;
                }
                Ok(None) => {
                    debug!("No address records for {}", name);
                    self.cache.merge(&name, Vec::new());
                    stats.unresolved_count += 1;
                }
                Err(e) => {
                    debug!("{}", e);
                    self.cache.merge(&name, Vec::new());
                    stats.unresolved_count += 1;
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        stats
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if self.config.output.silent {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        let style = ProgressStyle::with_template("{spinner} DNS resolution [{bar:30}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar
    }

    fn set_phase(&mut self, phase: Phase) {
        debug!("Phase: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }
}
