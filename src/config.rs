//! Configuration file parser for ~/.config/kitscout/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as likely typos. Command-line
//! flags are applied on top of the loaded values by the binary.
use crate::crawler::CrawlOptions;
use crate::feed::Endpoints;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The custom Debug impl masks `urlscan_api_key`.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Probe every path prefix of each URL instead of only its origin.
    pub directory_traveling: bool,

    /// Number of urlscan.io search results to request (max 100,000).
    pub size: u32,

    /// Maximum number of concurrent probes.
    pub threads: usize,

    /// Print progress lines while crawling.
    pub verbose: bool,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Directory to download discovered kits into. No download when unset.
    pub download_to: Option<PathBuf>,

    /// urlscan.io search query.
    pub urlscan_query: String,

    /// urlscan.io API key (alternative to URLSCAN_API_KEY env var).
    /// Env var takes precedence over config file.
    pub urlscan_api_key: Option<String>,

    /// Allow probing loopback and private-network hosts.
    pub allow_private_targets: bool,

    /// Feed base URLs.
    pub endpoints: Endpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directory_traveling: false,
            size: 100,
            threads: 10,
            verbose: false,
            timeout_secs: 10,
            download_to: None,
            urlscan_query: "certstream-suspicious".to_string(),
            urlscan_api_key: None,
            allow_private_targets: false,
            endpoints: Endpoints::default(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("directory_traveling", &self.directory_traveling)
            .field("size", &self.size)
            .field("threads", &self.threads)
            .field("verbose", &self.verbose)
            .field("timeout_secs", &self.timeout_secs)
            .field("download_to", &self.download_to)
            .field("urlscan_query", &self.urlscan_query)
            .field(
                "urlscan_api_key",
                &self.urlscan_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("allow_private_targets", &self.allow_private_targets)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 10] = [
        "directory_traveling",
        "size",
        "threads",
        "verbose",
        "timeout_secs",
        "download_to",
        "urlscan_query",
        "urlscan_api_key",
        "allow_private_targets",
        "endpoints",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        // One byte past the cap is enough to tell an oversized file apart
        let mut content = String::new();
        file.take(Self::MAX_FILE_SIZE + 1)
            .read_to_string(&mut content)?;
        if content.len() as u64 > Self::MAX_FILE_SIZE {
            return Err(ConfigError::TooLarge(format!(
                "Config file exceeds {} bytes",
                Self::MAX_FILE_SIZE
            )));
        }

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Converts into crawler options, resolving the urlscan key against
    /// the `URLSCAN_API_KEY` environment variable.
    pub fn crawl_options(&self) -> CrawlOptions {
        self.crawl_options_with_env_key(std::env::var("URLSCAN_API_KEY").ok())
    }

    fn crawl_options_with_env_key(&self, env_key: Option<String>) -> CrawlOptions {
        let api_key = env_key
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.urlscan_api_key.clone())
            .map(SecretString::from);

        CrawlOptions {
            directory_traveling: self.directory_traveling,
            size: self.size,
            threads: self.threads,
            verbose: self.verbose,
            timeout: Duration::from_secs(self.timeout_secs),
            urlscan_query: self.urlscan_query.clone(),
            urlscan_api_key: api_key,
            endpoints: self.endpoints.clone(),
            allow_private_targets: self.allow_private_targets,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
