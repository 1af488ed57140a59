//! Polite-Fetch main entry point
//!
//! This is the command-line interface for the Polite-Fetch page fetcher.

use clap::Parser;
use polite_fetch::config::{config_from_env, load_config, Config};
use polite_fetch::Dispatcher;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Polite-Fetch: a policy-aware page fetcher
///
/// Fetches pages directly while respecting robots.txt, or through a
/// FlareSolverr-compatible proxy when FLARESOLVERR_URL (or `[proxy] endpoint`)
/// is set. Page bodies are written to stdout.
#[derive(Parser, Debug)]
#[command(name = "polite-fetch")]
#[command(version)]
#[command(about = "A policy-aware page fetcher", long_about = None)]
struct Cli {
    /// URLs to fetch, in order
    #[arg(value_name = "URL", required = true)]
    urls: Vec<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
        }
        None => config_from_env(),
    }
    .inspect_err(|e| tracing::error!("Failed to load configuration: {}", e))?;

    default_robots_base(&mut config, &cli.urls);

    let dispatcher = Dispatcher::from_config(&config)?;
    if dispatcher.is_proxied() {
        tracing::info!("Routing {} URL(s) through the proxy", cli.urls.len());
    } else {
        tracing::info!("Fetching {} URL(s) directly", cli.urls.len());
    }

    let mut stdout = std::io::stdout().lock();
    for url in &cli.urls {
        let body = dispatcher.fetch(url).await?;
        stdout.write_all(body.as_bytes())?;
        if !body.ends_with('\n') {
            stdout.write_all(b"\n")?;
        }
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so page bodies on stdout stay clean.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("polite_fetch=info,warn"),
            1 => EnvFilter::new("polite_fetch=debug,info"),
            2 => EnvFilter::new("polite_fetch=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Uses the first URL's site for robots.txt when none is configured
fn default_robots_base(config: &mut Config, urls: &[String]) {
    if config.proxy.endpoint.is_some() || config.robots.base_url.is_some() {
        return;
    }

    if let Some(first) = urls.first() {
        tracing::debug!("Using robots.txt of {} for direct fetches", first);
        config.robots.base_url = Some(first.clone());
    }
}
