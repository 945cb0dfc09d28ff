// src/correlation.rs
use crate::corpus::{CorpusReader, TxtCorpus};
use crate::error::ReconError;
use crate::types::{CorrelationConfig, CorrelationReport, TxtRecord};
use log::{info, warn};
use std::path::Path;

/// Substrings of TXT values that recur across unrelated domains:
/// mail policy records and common third-party verification tokens.
pub const DEFAULT_GENERIC_PATTERNS: [&str; 8] = [
    "v=DMARC1",
    "v=spf1",
    "include:",
    "dmarc",
    "yandex",
    "v=DKIM1",
    "proxy-ssl.webflow.com",
    "mailru-verification",
];

#[derive(Debug, Clone)]
pub struct CorrelationPolicy {
    generic_patterns: Vec<String>,
}

impl Default for CorrelationPolicy {
    fn default() -> Self {
        Self::from_config(&CorrelationConfig::default())
    }
}

impl CorrelationPolicy {
    pub fn from_config(config: &CorrelationConfig) -> Self {
        let mut generic_patterns: Vec<String> = Vec::new();
        if config.use_default_patterns {
            generic_patterns.extend(DEFAULT_GENERIC_PATTERNS.iter().map(|p| p.to_string()));
        }
        for pattern in &config.generic_patterns {
            if !pattern.is_empty() && !generic_patterns.contains(pattern) {
                generic_patterns.push(pattern.clone());
            }
        }
        Self { generic_patterns }
    }

    /// No exclusions at all.
    pub fn permissive() -> Self {
        Self {
            generic_patterns: Vec::new(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.generic_patterns
    }
}

/// Finds other domains sharing a non-generic TXT value with a target.
///
/// The target is a fragment matched as a case-sensitive substring of the
/// query name, so `verizon` covers every name containing it.
pub struct CorrelationEngine {
    policy: CorrelationPolicy,
}

impl CorrelationEngine {
    pub fn new(policy: CorrelationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CorrelationPolicy {
        &self.policy
    }

    /// Correlates an in-memory set of records.
    pub fn correlate<I>(&self, records: I, target: &str) -> CorrelationReport
    where
        I: IntoIterator<Item = TxtRecord>,
    {
        let records: Vec<TxtRecord> = records.into_iter().collect();
        match TxtCorpus::from_records(&records) {
            Ok(corpus) => self.correlate_corpus(&corpus, target),
            Err(e) => self.unavailable(target, e),
        }
    }

    /// Correlates a Parquet file or folder; an unreadable corpus gives an empty report.
    pub fn correlate_parquet(&self, path: &Path, target: &str) -> CorrelationReport {
        match TxtCorpus::open_parquet(path) {
            Ok(corpus) => self.correlate_corpus(&corpus, target),
            Err(e) => self.unavailable(target, e),
        }
    }

    pub fn correlate_corpus(&self, corpus: &dyn CorpusReader, target: &str) -> CorrelationReport {
        let matches = match corpus.shared_fingerprints(target, self.policy.patterns()) {
            Ok(matches) => matches,
            Err(e) => return self.unavailable(target, e),
        };

        info!(
            "Scanned {} rows from {} files ({} skipped)",
            matches.stats.rows, matches.stats.files, matches.stats.skipped
        );
        info!(
            "{} shared fingerprints, {} linked to {:?}, {} related rows",
            matches.discriminating_fingerprints,
            matches.target_fingerprints,
            target,
            matches.hits.len()
        );

        CorrelationReport {
            target: target.to_string(),
            hits: matches.hits,
            rows_scanned: matches.stats.rows,
            rows_skipped: matches.stats.skipped,
            discriminating_fingerprints: matches.discriminating_fingerprints,
            target_fingerprints: matches.target_fingerprints,
        }
    }

    fn unavailable(&self, target: &str, error: ReconError) -> CorrelationReport {
        warn!("Corpus unavailable, nothing to correlate: {}", error);
        CorrelationReport {
            target: target.to_string(),
            ..CorrelationReport::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::CorpusMatches;

    fn rows(pairs: &[(&str, &str)]) -> Vec<TxtRecord> {
        pairs.iter().map(|(text, name)| TxtRecord::new(*text, *name)).collect()
    }

    fn pairs(report: &CorrelationReport) -> Vec<(String, String)> {
        report
            .hits
            .iter()
            .map(|hit| (hit.fingerprint.clone(), hit.query_name.clone()))
            .collect()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let engine = CorrelationEngine::new(CorrelationPolicy::default());
        let report = engine.correlate(rows(&[("t1", "a.com"), ("t1", "b.com"), ("t2", "a.com")]), "a");

        assert_eq!(pairs(&report), vec![("t1".to_string(), "b.com".to_string())]);
        assert_eq!(report.hits.len(), 1);
        assert_eq!(report.rows_scanned, 3);
        assert_eq!(report.discriminating_fingerprints, 1);
    }

    #[test]
    fn test_shared_token_found_and_spf_excluded() {
        let engine = CorrelationEngine::new(CorrelationPolicy::default());
        let corpus = rows(&[
            ("unique-token-123", "alpha.com"),
            ("unique-token-123", "beta.net"),
            ("v=spf1 include:_spf.example.com", "alpha.com"),
            ("v=spf1 include:_spf.example.com", "beta.net"),
        ]);

        let report = engine.correlate(corpus, "alpha");

        assert_eq!(
            pairs(&report),
            vec![("unique-token-123".to_string(), "beta.net".to_string())]
        );
        assert!(report.hits.iter().all(|hit| !hit.fingerprint.contains("v=spf1")));
        assert!(report.hits.iter().all(|hit| !hit.query_name.contains("alpha")));
        assert_eq!(report.target_fingerprints, 2);
    }

    #[test]
    fn test_correlation_is_symmetric() {
        let engine = CorrelationEngine::new(CorrelationPolicy::default());
        let corpus = rows(&[("shared", "alpha.com"), ("shared", "beta.net")]);

        let from_alpha = engine.correlate(corpus.clone(), "alpha");
        let from_beta = engine.correlate(corpus, "beta");

        assert_eq!(pairs(&from_alpha), vec![("shared".to_string(), "beta.net".to_string())]);
        assert_eq!(pairs(&from_beta), vec![("shared".to_string(), "alpha.com".to_string())]);
    }

    #[test]
    fn test_singleton_fingerprints_never_reported() {
        let engine = CorrelationEngine::new(CorrelationPolicy::permissive());
        let corpus = rows(&[
            ("only-mine", "alpha.com"),
            ("only-theirs", "beta.net"),
            ("repeated", "alpha.com"),
            ("repeated", "alpha.com"),
        ]);

        let report = engine.correlate(corpus, "alpha");
        assert!(report.hits.is_empty());
        assert_eq!(report.discriminating_fingerprints, 0);
    }

    #[test]
    fn test_target_owned_names_excluded() {
        let engine = CorrelationEngine::new(CorrelationPolicy::permissive());
        let corpus = rows(&[
            ("token", "alpha.com"),
            ("token", "mail.alpha.com"),
            ("token", "gamma.org"),
            ("token", "beta.net"),
        ]);

        let report = engine.correlate(corpus, "alpha");
        assert_eq!(
            pairs(&report),
            vec![
                ("token".to_string(), "beta.net".to_string()),
                ("token".to_string(), "gamma.org".to_string()),
            ]
        );
    }

    #[test]
    fn test_output_sorted_and_distinct() {
        let engine = CorrelationEngine::new(CorrelationPolicy::permissive());
        let corpus = rows(&[
            ("zz", "alpha.com"),
            ("zz", "c.com"),
            ("aa", "alpha.com"),
            ("aa", "d.com"),
            ("aa", "d.com"),
            ("aa", "b.com"),
        ]);

        let report = engine.correlate(corpus, "alpha");
        assert_eq!(
            pairs(&report),
            vec![
                ("aa".to_string(), "b.com".to_string()),
                ("aa".to_string(), "d.com".to_string()),
                ("zz".to_string(), "c.com".to_string()),
            ]
        );
    }

    #[test]
    fn test_fingerprints_unrelated_to_target_ignored() {
        let engine = CorrelationEngine::new(CorrelationPolicy::permissive());
        let corpus = rows(&[("x", "b.com"), ("x", "c.com")]);
        assert!(engine.correlate(corpus, "alpha").hits.is_empty());
    }

    #[test]
    fn test_custom_patterns() {
        let config = CorrelationConfig {
            generic_patterns: vec!["google-site-verification".to_string()],
            use_default_patterns: false,
        };
        let policy = CorrelationPolicy::from_config(&config);
        assert_eq!(policy.patterns(), &["google-site-verification".to_string()]);

        let engine = CorrelationEngine::new(policy);
        let corpus = rows(&[
            ("google-site-verification=abc", "alpha.com"),
            ("google-site-verification=abc", "beta.net"),
            ("v=spf1 -all", "alpha.com"),
            ("v=spf1 -all", "beta.net"),
        ]);
        let report = engine.correlate(corpus, "alpha");
        assert_eq!(pairs(&report), vec![("v=spf1 -all".to_string(), "beta.net".to_string())]);
    }

    #[test]
    fn test_default_patterns_are_case_sensitive() {
        let policy = CorrelationPolicy::default();
        assert_eq!(policy.patterns().len(), DEFAULT_GENERIC_PATTERNS.len());

        let engine = CorrelationEngine::new(policy);
        let corpus = rows(&[
            ("v=DKIM1; k=rsa; p=MIGf", "alpha.com"),
            ("v=DKIM1; k=rsa; p=MIGf", "beta.net"),
            ("mailru-verification: 123", "alpha.com"),
            ("mailru-verification: 123", "beta.net"),
            ("V=SPF1 upper case", "alpha.com"),
            ("V=SPF1 upper case", "beta.net"),
        ]);
        let report = engine.correlate(corpus, "alpha");
        assert_eq!(pairs(&report), vec![("V=SPF1 upper case".to_string(), "beta.net".to_string())]);
    }

    #[test]
    fn test_duplicate_patterns_collapsed() {
        let config = CorrelationConfig {
            generic_patterns: vec!["v=spf1".to_string(), String::new(), "x".to_string()],
            use_default_patterns: true,
        };
        let policy = CorrelationPolicy::from_config(&config);
        assert_eq!(policy.patterns().len(), DEFAULT_GENERIC_PATTERNS.len() + 1);
    }

    #[test]
    fn test_unreadable_corpus_is_empty_result() {
        let engine = CorrelationEngine::new(CorrelationPolicy::default());
        let report = engine.correlate_parquet(Path::new("/nonexistent/txt-corpus"), "alpha");
        assert!(report.hits.is_empty());
        assert_eq!(report.target, "alpha");
    }

    #[test]
    fn test_corpus_reader_seam() {
        let engine = CorrelationEngine::new(CorrelationPolicy::default());
        let corpus = TxtCorpus::from_records(&rows(&[("t1", "a.com"), ("t1", "b.com")])).unwrap();
        let report = engine.correlate_corpus(&corpus, "a");
        assert_eq!(pairs(&report), vec![("t1".to_string(), "b.com".to_string())]);
        assert_eq!(report.rows_scanned, 2);
    }

    struct BrokenCorpus;

    impl CorpusReader for BrokenCorpus {
        fn shared_fingerprints(&self, _target: &str, _patterns: &[String]) -> crate::error::Result<CorpusMatches> {
            Err(ReconError::CorpusError("column txt_text not found".to_string()))
        }
    }

    #[test]
    fn test_failing_query_is_empty_result() {
        let engine = CorrelationEngine::new(CorrelationPolicy::default());
        let report = engine.correlate_corpus(&BrokenCorpus, "alpha");
        assert!(report.hits.is_empty());
        assert_eq!(report.target, "alpha");
    }
}
