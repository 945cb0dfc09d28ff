use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIME"),
    ")"
);

#[derive(Parser, Debug, Clone)]
#[command(
    name = "reconmerge",
    version,
    long_version = LONG_VERSION,
    about = "Passive DNS reconnaissance aggregator",
    long_about = "reconmerge merges subdomain and IP data from several DNS intelligence providers into one view,\nand mines TXT record corpora for domains sharing ownership fingerprints with a target."
)]
pub struct Args {
    /// Silent mode (only warnings and results)
    #[arg(long = "silent", global = true)]
    pub silent: bool,

    /// Verbose mode
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short = 'c', long = "config", global = true)]
    pub config_path: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Collect subdomains and IPs for a domain from all providers
    Subdomains(SubdomainArgs),

    /// Find domains sharing TXT record fingerprints with a domain
    #[command(name = "txt-correlate")]
    TxtCorrelate(CorrelateArgs),

    /// List all available sources
    ListSources,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SubdomainArgs {
    /// Target domain
    #[arg(short = 'd', long = "domain", value_name = "DOMAIN")]
    pub domain: String,

    /// Output file (stdout when omitted)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_file: Option<String>,

    /// Output in JSON format
    #[arg(long = "json", conflicts_with = "csv")]
    pub json: bool,

    /// Output in CSV format
    #[arg(long = "csv")]
    pub csv: bool,

    /// Specific sources to use (comma-separated)
    #[arg(short = 's', long = "sources", value_delimiter = ',')]
    pub sources: Option<Vec<String>>,

    /// Query all providers concurrently
    #[arg(long = "parallel")]
    pub parallel: bool,

    /// Disable DNS resolution of names returned without addresses
    #[arg(long = "no-resolve")]
    pub no_resolve: bool,

    /// Delay between result pages in milliseconds
    #[arg(long = "page-delay-ms", value_name = "MS")]
    pub page_delay_ms: Option<u64>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CorrelateArgs {
    /// Parquet file or folder of Parquet files with txt_text and query_name columns
    #[arg(value_name = "CORPUS")]
    pub corpus: PathBuf,

    /// Domain fragment to search for (e.g. verizon)
    #[arg(value_name = "DOMAIN")]
    pub domain: String,

    /// Output file (stdout when omitted)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_file: Option<String>,

    /// Output in JSON format
    #[arg(long = "json")]
    pub json: bool,

    /// Additional generic TXT substring to exclude (repeatable)
    #[arg(short = 'e', long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Do not apply the built-in generic fingerprint list
    #[arg(long = "no-default-exclusions")]
    pub no_default_exclusions: bool,
}
