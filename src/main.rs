use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use reconmerge::cli::{Args, Command, CorrelateArgs, SubdomainArgs};
use reconmerge::config;
use reconmerge::output::OutputManager;
use reconmerge::sources;
use reconmerge::types::{Config, OutputFormat};
use reconmerge::{CorrelationEngine, CorrelationPolicy, ReconEngine};
use std::time::Duration;

const BANNER: &str = r#"
  _ __ ___  ___ ___  _ __  _ __ ___   ___ _ __ __ _  ___
 | '__/ _ \/ __/ _ \| '_ \| '_ ` _ \ / _ \ '__/ _` |/ _ \
 | | |  __/ (_| (_) | | | | | | | | |  __/ | | (_| |  __/
 |_|  \___|\___\___/|_| |_|_| |_| |_|\___|_|  \__, |\___|
                                              |___/
        Passive DNS reconnaissance aggregator
"#;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    init_logging(&args);

    if !args.silent {
        eprintln!("{}", BANNER);
        eprintln!("        {} v{}\n", reconmerge::NAME, reconmerge::VERSION);
    }

    let mut config =
        config::load_config(args.config_path.as_deref()).context("Failed to load configuration")?;
    config.output.verbose = args.verbose;
    config.output.silent = args.silent;

    match args.command.clone() {
        Command::ListSources => {
            list_sources(&config);
            Ok(())
        }
        Command::Subdomains(sub) => run_subdomains(config, sub).await,
        Command::TxtCorrelate(correlate) => run_correlation(config, correlate),
    }
}

fn init_logging(args: &Args) {
    let level = if args.verbose {
        log::LevelFilter::Debug
    } else if args.silent {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

async fn run_subdomains(mut config: Config, args: SubdomainArgs) -> Result<()> {
    if let Some(file) = args.output_file {
        config.output.file = Some(file);
    }
    if args.json {
        config.output.format = OutputFormat::Json;
    }
    if args.csv {
        config.output.format = OutputFormat::Csv;
    }
    if let Some(sources) = args.sources {
        config.sources = sources;
    }
    if args.parallel {
        config.parallel = true;
    }
    if args.no_resolve {
        config.resolver.enabled = false;
    }
    if let Some(ms) = args.page_delay_ms {
        config.page_delay = Duration::from_millis(ms);
    }
    config::validate_config(&config)?;

    let mut engine = ReconEngine::new(config)?;
    let report = engine.execute(&args.domain).await.context("Aggregation failed")?;

    info!(
        "Completed {}: {} unique subdomains from {} providers ({} failed) in {:.2}s",
        report.domain,
        report.subdomains.len(),
        report.providers.len(),
        report.failed_providers(),
        report.duration.as_secs_f64()
    );

    Ok(())
}

fn run_correlation(mut config: Config, args: CorrelateArgs) -> Result<()> {
    if let Some(file) = args.output_file {
        config.output.file = Some(file);
    }
    if args.json {
        config.output.format = OutputFormat::Json;
    }
    if args.no_default_exclusions {
        config.correlation.use_default_patterns = false;
    }
    config.correlation.generic_patterns.extend(args.exclude);

    let policy = CorrelationPolicy::from_config(&config.correlation);
    info!(
        "Correlating TXT fingerprints for {:?} ({} generic patterns)",
        args.domain,
        policy.patterns().len()
    );

    let engine = CorrelationEngine::new(policy);
    let report = engine.correlate_parquet(&args.corpus, &args.domain);

    OutputManager::new(config.output.clone())
        .write_correlation(&report)
        .context("Failed to write correlation results")?;

    Ok(())
}

fn list_sources(config: &Config) {
    println!("Available sources (in aggregation order):\n");

    for source in sources::get_all_sources(config) {
        let info = source.info();
        let mut notes = Vec::new();
        if info.needs_key {
            let configured = config.api_keys.get(&info.name).map_or(false, |keys| !keys.is_empty());
            notes.push(if configured { "key configured" } else { "key missing" });
        }
        if info.paginated {
            notes.push("paginated");
        }
        if notes.is_empty() {
            println!("  {}", info.name);
        } else {
            println!("  {} ({})", info.name, notes.join(", "));
        }
    }

    println!("\nAPI keys are read from API_KEY_DNSDUMPSTER, API_KEY_SECURITYTRAILS,");
    println!("API_KEY_VIRUSTOTAL and API_KEY_HACKERTARGET (a .env file is honoured),");
    println!("or from the [api_keys] table of the file passed with --config.");
}
