use anyhow::{Context, Result};
use clap::Parser;
use kitscout::config::Config;
use kitscout::crawler::Crawler;
use kitscout::probe::Probe;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Get the default config file path (~/.config/kitscout/config.toml)
fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("kitscout")
            .join("config.toml"),
    )
}

#[derive(Parser, Debug)]
#[command(
    name = "kitscout",
    about = "Hunt phishing kits on URLs reported by urlscan.io, OpenPhish and PhishTank"
)]
struct Args {
    /// Probe every directory level of each URL, not only its origin
    #[arg(long)]
    directory_traveling: bool,

    /// Number of urlscan.io results to fetch (max 100,000)
    #[arg(long, value_name = "N")]
    size: Option<u32>,

    /// Maximum number of concurrent probes
    #[arg(long, short = 't', value_name = "N")]
    threads: Option<usize>,

    /// Print progress for every probed URL
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Download discovered kits into this directory
    #[arg(long, value_name = "DIR")]
    download_to: Option<PathBuf>,

    /// Print findings as JSON
    #[arg(long)]
    json: bool,

    /// Config file (defaults to ~/.config/kitscout/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct Finding<'a> {
    url: &'a str,
    kits: &'a [String],
    downloaded: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "kitscout=info"
    } else {
        "kitscout=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match args.config.clone().or_else(default_config_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    // Flags override the config file
    config.directory_traveling |= args.directory_traveling;
    config.verbose |= args.verbose;
    if let Some(size) = args.size {
        config.size = size;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if args.json {
        // Keep stdout machine-readable
        config.verbose = false;
    }
    if args.download_to.is_some() {
        config.download_to = args.download_to.clone();
    }
    tracing::debug!(config = ?config, "Effective configuration");

    let crawler = Crawler::new(config.crawl_options()).context("Invalid crawler configuration")?;
    let websites = crawler.run_websites().await;

    let mut findings = Vec::with_capacity(websites.len());
    for website in &websites {
        let downloaded = match &config.download_to {
            Some(dir) => website.download_kits(dir).await,
            None => Vec::new(),
        };
        findings.push(Finding {
            url: website.url(),
            kits: website.kits(),
            downloaded,
        });
    }

    if args.json {
        let out = serde_json::to_string_pretty(&findings).context("Failed to encode findings")?;
        println!("{}", out);
        return Ok(());
    }

    print_findings(&findings);
    Ok(())
}

fn print_findings(findings: &[Finding<'_>]) {
    if findings.is_empty() {
        println!("No phishing kits found.");
        return;
    }

    for finding in findings {
        println!(
            "{}: it might contain phishing kit(s): ({})",
            finding.url,
            finding.kits.join(", ")
        );
        for path in &finding.downloaded {
            println!("  downloaded to {}", path.display());
        }
    }
}
