//! The crawl orchestrator.
//!
//! A [`Crawler`] pulls raw URLs from every feed, breaks them down into
//! candidates, and probes each candidate in its own task with at most
//! `threads` tasks in flight. Only construction can fail; feed, URL and probe
//! failures (panics included) all degrade to fewer candidates or fewer
//! positives.

use crate::candidate::{breakdown, CandidateSet};
use crate::feed::{Endpoints, FeedSource};
use crate::http::build_client;
use crate::probe::{Probe, Website};
use futures::future;
use secrecy::SecretString;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tokio::task::{self, JoinSet};

/// Hard upper bound on the urlscan result size.
pub const MAX_SIZE: u32 = 100_000;

/// Invalid crawler construction parameters.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("size must be less than or equal to 100,000 (got {0})")]
    SizeTooLarge(u32),
    #[error("threads must be at least 1")]
    ZeroThreads,
    #[error("timeout must be greater than zero")]
    ZeroTimeout,
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Construction parameters for a [`Crawler`].
#[derive(Debug)]
pub struct CrawlOptions {
    /// Probe every path prefix of a URL, not only its origin.
    pub directory_traveling: bool,
    /// Number of urlscan records requested (at most [`MAX_SIZE`]).
    pub size: u32,
    /// Maximum number of probes in flight.
    pub threads: usize,
    /// Print progress lines (stdout unless
    /// [`Crawler::with_progress_writer`] says otherwise).
    pub verbose: bool,
    /// Per-request timeout for feeds and probes.
    pub timeout: Duration,
    pub urlscan_query: String,
    pub urlscan_api_key: Option<SecretString>,
    pub endpoints: Endpoints,
    /// Let the default probe reach loopback and private addresses.
    pub allow_private_targets: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            directory_traveling: false,
            size: 100,
            threads: 10,
            verbose: false,
            timeout: Duration::from_secs(10),
            urlscan_query: "certstream-suspicious".to_string(),
            urlscan_api_key: None,
            endpoints: Endpoints::default(),
            allow_private_targets: false,
        }
    }
}

pub struct Crawler {
    directory_traveling: bool,
    threads: usize,
    verbose: bool,
    timeout: Duration,
    allow_private_targets: bool,
    client: reqwest::Client,
    feeds: Vec<FeedSource>,
    candidates: OnceCell<CandidateSet>,
    progress: Mutex<Box<dyn Write + Send>>,
}

impl Crawler {
    /// Validates `options` and prepares the feed clients.
    ///
    /// No network access happens here.
    pub fn new(options: CrawlOptions) -> Result<Self, ConfigurationError> {
        if options.size > MAX_SIZE {
            return Err(ConfigurationError::SizeTooLarge(options.size));
        }
        if options.threads == 0 {
            return Err(ConfigurationError::ZeroThreads);
        }
        if options.timeout.is_zero() {
            return Err(ConfigurationError::ZeroTimeout);
        }

        let client = build_client(options.timeout)?;
        let Endpoints {
            urlscan,
            openphish,
            phishtank,
        } = options.endpoints;

        let feeds = vec![
            FeedSource::Urlscan {
                base: urlscan,
                query: options.urlscan_query,
                size: options.size,
                api_key: options.urlscan_api_key,
            },
            FeedSource::OpenPhish { base: openphish },
            FeedSource::PhishTank { base: phishtank },
        ];

        Ok(Self {
            directory_traveling: options.directory_traveling,
            threads: options.threads,
            verbose: options.verbose,
            timeout: options.timeout,
            allow_private_targets: options.allow_private_targets,
            client,
            feeds,
            candidates: OnceCell::new(),
            progress: Mutex::new(Box::new(std::io::stdout())),
        })
    }

    /// Sends verbose progress lines to `writer` instead of stdout.
    pub fn with_progress_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.progress = Mutex::new(Box::new(writer));
        self
    }

    /// Builds a crawler and runs it with the default [`Website`] probe.
    pub async fn execute(options: CrawlOptions) -> Result<Vec<Website>, ConfigurationError> {
        let crawler = Self::new(options)?;
        Ok(crawler.run_websites().await)
    }

    pub fn feeds(&self) -> &[FeedSource] {
        &self.feeds
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// The run's candidate set, fetched from the feeds on first call only.
    pub async fn suspicious_urls(&self) -> &CandidateSet {
        self.candidates
            .get_or_init(|| async {
                let fetches = self
                    .feeds
                    .iter()
                    .map(|feed| feed.fetch(&self.client, self.timeout));
                let raw_urls: Vec<String> = future::join_all(fetches)
                    .await
                    .into_iter()
                    .flatten()
                    .collect();

                let candidates = CandidateSet::from_lists(
                    raw_urls
                        .iter()
                        .map(|url| breakdown(url, self.directory_traveling)),
                );

                tracing::info!(
                    raw = raw_urls.len(),
                    candidates = candidates.len(),
                    directory_traveling = self.directory_traveling,
                    "Candidate set built"
                );
                candidates
            })
            .await
    }

    /// Probes every candidate and returns the subjects that found a kit.
    ///
    /// `make_probe` builds one subject per candidate URL, which is then moved
    /// into its own task. At most `threads` tasks run at once; the set is
    /// refilled as tasks finish. Negatives, probe errors and panicking probes
    /// are all counted as "no kit". Returns once every task has finished;
    /// positives come back in completion order.
    pub async fn run<P, F>(&self, make_probe: F) -> Vec<P>
    where
        P: Probe + Send + 'static,
        F: Fn(&str) -> P,
    {
        let candidates = self.suspicious_urls().await;
        self.print_progress(format_args!("Loaded {} URLs to crawl.", candidates.len()));
        tracing::debug!(
            candidates = candidates.len(),
            threads = self.threads,
            "Dispatching probes"
        );

        let mut queue = candidates.iter();
        let mut tasks = JoinSet::new();
        // Lets a panicked task still be reported by URL
        let mut in_flight: HashMap<task::Id, &str> = HashMap::new();
        let mut found = Vec::new();

        loop {
            while tasks.len() < self.threads {
                let Some(url) = queue.next() else {
                    break;
                };
                let mut probe = make_probe(url.as_str());
                let handle = tasks.spawn(async move {
                    let outcome = probe.has_kit().await;
                    (probe, outcome)
                });
                in_flight.insert(handle.id(), url.as_str());
            }

            let Some(joined) = tasks.join_next_with_id().await else {
                break;
            };

            match joined {
                Ok((id, (mut probe, outcome))) => {
                    in_flight.remove(&id);
                    match outcome {
                        Ok(true) => {
                            tracing::info!(url = %probe.url(), "Phishing kit found");
                            found.push(probe);
                            continue;
                        }
                        Ok(false) => {}
                        Err(e) => {
                            tracing::debug!(url = %probe.url(), error = %e, "Probe failed, counting as negative");
                        }
                    }
                    self.report_negative(probe.url());
                    probe.cleanup();
                }
                Err(e) => {
                    let url = in_flight.remove(&e.id()).unwrap_or("<unknown>");
                    tracing::warn!(url = %url, error = %e, "Probe task died, counting as negative");
                    self.report_negative(url);
                }
            }
        }

        tracing::info!(
            probed = candidates.len(),
            found = found.len(),
            "Crawl finished"
        );
        found
    }

    fn report_negative(&self, url: &str) {
        self.print_progress(format_args!("{}: it doesn't contain a phishing kit.", url));
    }

    fn print_progress(&self, line: fmt::Arguments<'_>) {
        if !self.verbose {
            return;
        }
        if let Ok(mut out) = self.progress.lock() {
            // Progress output is best effort
            let _ = writeln!(out, "{}", line);
            let _ = out.flush();
        }
    }

    /// [`run`](Self::run) with the default [`Website`] probe.
    pub async fn run_websites(&self) -> Vec<Website> {
        let client = self.client.clone();
        let timeout = self.timeout;
        let allow_private = self.allow_private_targets;
        self.run(|url| {
            Website::new(url, client.clone(), timeout).allow_private_targets(allow_private)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(size: u32, threads: usize) -> CrawlOptions {
        CrawlOptions {
            size,
            threads,
            ..CrawlOptions::default()
        }
    }

    #[test]
    fn test_default_options() {
        let options = CrawlOptions::default();
        assert!(!options.directory_traveling);
        assert_eq!(options.size, 100);
        assert_eq!(options.threads, 10);
        assert!(!options.verbose);
    }

    #[test]
    fn test_size_at_limit_accepted() {
        assert!(Crawler::new(options(100_000, 10)).is_ok());
    }

    #[test]
    fn test_size_over_limit_rejected() {
        match Crawler::new(options(100_001, 10)) {
            Err(ConfigurationError::SizeTooLarge(100_001)) => {}
            Err(e) => panic!("Expected SizeTooLarge, got {:?}", e),
            Ok(_) => panic!("Expected SizeTooLarge, got a crawler"),
        }
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(matches!(
            Crawler::new(options(100, 0)),
            Err(ConfigurationError::ZeroThreads)
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let options = CrawlOptions {
            timeout: Duration::ZERO,
            ..CrawlOptions::default()
        };
        assert!(matches!(
            Crawler::new(options),
            Err(ConfigurationError::ZeroTimeout)
        ));
    }

    #[test]
    fn test_feeds_built_from_options() {
        let crawler = Crawler::new(options(250, 4)).unwrap();
        assert_eq!(crawler.threads(), 4);

        let names: Vec<_> = crawler.feeds().iter().map(FeedSource::name).collect();
        assert_eq!(names, vec!["urlscan", "openphish", "phishtank"]);
        assert_eq!(
            crawler.feeds()[0].url(),
            "https://urlscan.io/api/v1/search/?q=certstream-suspicious&size=250"
        );
    }
}
