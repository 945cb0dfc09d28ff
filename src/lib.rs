// src/lib.rs
pub mod cache;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod output;
pub mod resolver;
pub mod session;
pub mod sources;
pub mod types;
pub mod utils;

pub use cache::AggregationCache;
pub use cli::Args;
pub use correlation::{CorrelationEngine, CorrelationPolicy};
pub use engine::ReconEngine;
pub use error::{ReconError, Result};
pub use types::{AggregationReport, Config, CorrelationReport, SubdomainRecord};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
