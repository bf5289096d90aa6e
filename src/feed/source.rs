use crate::feed::parser::{parse_openphish, parse_phishtank, parse_urlscan};
use crate::http::{get_bytes, get_text, FetchError};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

/// Base URLs of the three feeds.
///
/// Overridable from the config file so mirrors (or mock servers) can stand in
/// for the public services.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub urlscan: String,
    pub openphish: String,
    pub phishtank: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            urlscan: "https://urlscan.io/api/v1".to_string(),
            openphish: "https://openphish.com".to_string(),
            phishtank: "http://data.phishtank.com".to_string(),
        }
    }
}

/// One threat-intelligence feed, tagged by response shape.
pub enum FeedSource {
    /// JSON search API; `size` bounds the number of records requested.
    Urlscan {
        base: String,
        query: String,
        size: u32,
        api_key: Option<SecretString>,
    },
    /// Plaintext list, one URL per line.
    OpenPhish { base: String },
    /// CSV table with a `url` column.
    PhishTank { base: String },
}

impl FeedSource {
    pub fn name(&self) -> &'static str {
        match self {
            FeedSource::Urlscan { .. } => "urlscan",
            FeedSource::OpenPhish { .. } => "openphish",
            FeedSource::PhishTank { .. } => "phishtank",
        }
    }

    pub fn url(&self) -> String {
        match self {
            FeedSource::Urlscan {
                base, query, size, ..
            } => format!(
                "{}/search/?q={}&size={}",
                base.trim_end_matches('/'),
                url::form_urlencoded::byte_serialize(query.as_bytes()).collect::<String>(),
                size
            ),
            FeedSource::OpenPhish { base } => {
                format!("{}/feed.txt", base.trim_end_matches('/'))
            }
            FeedSource::PhishTank { base } => {
                format!("{}/data/online-valid.csv", base.trim_end_matches('/'))
            }
        }
    }

    /// Fetches and parses the feed.
    ///
    /// Never fails: any transport or parse error is logged and yields an
    /// empty list.
    pub async fn fetch(&self, client: &reqwest::Client, timeout: Duration) -> Vec<String> {
        match self.try_fetch(client, timeout).await {
            Ok(urls) => {
                tracing::debug!(feed = self.name(), urls = urls.len(), "Feed fetched");
                urls
            }
            Err(e) => {
                tracing::warn!(feed = self.name(), error = %e, "Feed fetch failed, skipping");
                Vec::new()
            }
        }
    }

    async fn try_fetch(
        &self,
        client: &reqwest::Client,
        timeout: Duration,
    ) -> Result<Vec<String>, FetchError> {
        let url = self.url();
        match self {
            FeedSource::Urlscan { api_key, .. } => {
                let mut headers = HeaderMap::new();
                if let Some(key) = api_key {
                    let value = HeaderValue::from_str(key.expose_secret())
                        .map_err(|_| FetchError::Parse("invalid urlscan API key".into()))?;
                    headers.insert("api-key", value);
                }
                let bytes = get_bytes(client, &url, headers, timeout).await?;
                parse_urlscan(&bytes).map_err(|e| FetchError::Parse(e.to_string()))
            }
            FeedSource::OpenPhish { .. } => {
                let body = get_text(client, &url, HeaderMap::new(), timeout).await?;
                Ok(parse_openphish(&body))
            }
            FeedSource::PhishTank { .. } => {
                let bytes = get_bytes(client, &url, HeaderMap::new(), timeout).await?;
                parse_phishtank(&bytes).map_err(|e| FetchError::Parse(e.to_string()))
            }
        }
    }
}

impl std::fmt::Debug for FeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSource")
            .field("name", &self.name())
            .field("url", &self.url())
            .finish()
    }
}
