//! Shared HTTP transport for feed clients and kit probes.
//!
//! Every request goes through one [`reqwest::Client`] built by [`build_client`]:
//! at most [`MAX_REDIRECTS`] hops are followed, and anything but a final
//! `200 OK` is reported as [`FetchError::HttpStatus`].

use futures::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Maximum number of redirect hops followed before a request fails.
pub const MAX_REDIRECTS: usize = 3;

/// Upper bound for any response body (feeds and kit archives alike).
pub const MAX_BODY_SIZE: usize = 32 * 1024 * 1024; // 32MB

/// Errors that can occur while fetching a URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, redirect limit, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Final response status was not 200
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded [`MAX_BODY_SIZE`]
    #[error("Response too large")]
    ResponseTooLarge,
    /// Body could not be decoded into the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Follows at most [`MAX_REDIRECTS`] hops and refuses to revisit a URL.
fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        let hops = attempt.previous().len();
        let revisit = attempt.previous().iter().any(|seen| seen == attempt.url());

        if hops > MAX_REDIRECTS {
            attempt.error(format!("more than {} redirects", MAX_REDIRECTS))
        } else if revisit {
            attempt.error("redirect loop")
        } else {
            tracing::trace!(to = %attempt.url(), hop = hops, "Following redirect");
            attempt.follow()
        }
    })
}

/// Builds the client used for every feed and probe request.
///
/// `timeout` bounds each request end to end; the same value is also applied
/// around body reads in [`get_bytes`].
pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(redirect_policy())
        .pool_idle_timeout(Duration::from_secs(30))
        .timeout(timeout)
        .user_agent(concat!("kitscout/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Fetches `url` and returns the body as bytes.
pub async fn get_bytes(
    client: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    tokio::time::timeout(timeout, async {
        let response = client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(FetchError::Network)?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, MAX_BODY_SIZE).await
    })
    .await
    .map_err(|_| FetchError::Timeout)?
}

/// Fetches `url` and returns the body as text (lossy UTF-8).
pub async fn get_text(
    client: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
    timeout: Duration,
) -> Result<String, FetchError> {
    let bytes = get_bytes(client, url, headers, timeout).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
