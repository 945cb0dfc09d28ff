// src/error.rs
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReconError>;

/// Longest slice of an upstream body kept in error messages.
const BODY_EXCERPT_LEN: usize = 512;

#[derive(Debug, Error)]
pub enum ReconError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("[{source_name}] transport error: {message}")]
    TransportError {
        source_name: String,
        message: String,
    },

    #[error("[{source_name}] upstream returned status {status}. Body: {body}")]
    UpstreamError {
        source_name: String,
        status: u16,
        body: String,
    },

    #[error("[{source_name}] failed to parse response: {message}\nBody: {body}")]
    ParseError {
        source_name: String,
        message: String,
        body: String,
    },

    #[error("[{source_name}] authentication failed: {message}")]
    AuthenticationError {
        source_name: String,
        message: String,
    },

    #[error("Resolution error: {0}")]
    ResolutionError(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Corpus error: {0}")]
    CorpusError(String),

    #[error("Output error: {0}")]
    OutputError(String),
}

impl ReconError {
    pub fn transport(source_name: &str, message: impl Into<String>) -> Self {
        ReconError::TransportError {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    pub fn upstream(source_name: &str, status: u16, body: &str) -> Self {
        ReconError::UpstreamError {
            source_name: source_name.to_string(),
            status,
            body: excerpt(body),
        }
    }

    pub fn parse(source_name: &str, message: impl Into<String>, body: &str) -> Self {
        ReconError::ParseError {
            source_name: source_name.to_string(),
            message: message.into(),
            body: excerpt(body),
        }
    }

    pub fn authentication(source_name: &str, message: impl Into<String>) -> Self {
        ReconError::AuthenticationError {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    /// Short tag used in the per-provider summary.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconError::ConfigError(_) => "config",
            ReconError::TransportError { .. } => "transport",
            ReconError::UpstreamError { .. } => "upstream",
            ReconError::ParseError { .. } => "parse",
            ReconError::AuthenticationError { .. } => "authentication",
            ReconError::ResolutionError(_) => "resolution",
            ReconError::InvalidDomain(_) => "invalid-domain",
            ReconError::CorpusError(_) => "corpus",
            ReconError::OutputError(_) => "output",
        }
    }
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.len() <= BODY_EXCERPT_LEN {
        return body.to_string();
    }
    let mut end = BODY_EXCERPT_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
