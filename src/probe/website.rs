use crate::http::{get_bytes, get_text};
use crate::probe::{validate_target, Probe, ProbeError};
use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Archive extensions that count as a downloadable kit.
pub const KIT_EXTENSIONS: [&str; 6] = [".zip", ".rar", ".7z", ".tar", ".gz", ".tgz"];

/// Default probe: flags open directory listings that link to archives.
///
/// A kit host typically leaves the web server's auto-index enabled, so the
/// candidate's page has an `Index of ...` title and links straight to the
/// kit archive.
#[derive(Debug, Clone)]
pub struct Website {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
    allow_private: bool,
    kits: Vec<String>,
}

impl Website {
    pub fn new(url: &str, client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            url: url.to_owned(),
            client,
            timeout,
            allow_private: false,
            kits: Vec::new(),
        }
    }

    /// Permits loopback and private-network targets (lab setups and tests).
    pub fn allow_private_targets(mut self, allow: bool) -> Self {
        self.allow_private = allow;
        self
    }

    /// Absolute URLs of the archives found by the last positive probe.
    pub fn kits(&self) -> &[String] {
        &self.kits
    }

    /// Downloads every discovered kit into `dir`.
    ///
    /// Files are named `<host>_<sha256 prefix>_<file name>` so identical
    /// archives from one host collapse into one file. Failures are logged
    /// per kit and skipped; the paths actually written are returned.
    pub async fn download_kits(&self, dir: &Path) -> Vec<PathBuf> {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to create download directory");
            return Vec::new();
        }

        let mut written = Vec::new();
        for kit in &self.kits {
            match self.download_kit(kit, dir).await {
                Ok(path) => {
                    tracing::info!(kit = %kit, path = %path.display(), "Kit downloaded");
                    written.push(path);
                }
                Err(e) => {
                    tracing::warn!(kit = %kit, error = %e, "Kit download failed");
                }
            }
        }
        written
    }

    async fn download_kit(&self, kit: &str, dir: &Path) -> Result<PathBuf> {
        let url = validate_target(kit, self.allow_private)?;
        let bytes = get_bytes(&self.client, url.as_str(), HeaderMap::new(), self.timeout).await?;

        let digest = format!("{:x}", Sha256::digest(&bytes));
        let host = url.host_str().unwrap_or("unknown");
        let file_name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .unwrap_or("kit");
        let path = dir.join(format!(
            "{}_{}_{}",
            sanitize_file_name(host),
            &digest[..12],
            sanitize_file_name(file_name)
        ));

        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write kit to '{}'", path.display()))?;
        Ok(path)
    }
}

impl Probe for Website {
    fn url(&self) -> &str {
        &self.url
    }

    async fn has_kit(&mut self) -> Result<bool, ProbeError> {
        let target = validate_target(&self.url, self.allow_private)?;
        let body = get_text(&self.client, target.as_str(), HeaderMap::new(), self.timeout).await?;

        if !is_directory_listing(&body) {
            return Ok(false);
        }

        self.kits = find_kit_links(&body, &listing_base(&target));
        Ok(!self.kits.is_empty())
    }

    fn cleanup(&mut self) {
        self.kits.clear();
    }
}

/// Checks for an auto-index page (`<title>Index of /...</title>`).
fn is_directory_listing(html: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    let Some(start) = lower.find("<title>") else {
        return false;
    };
    let title_start = start + "<title>".len();
    let title_end = lower[title_start..]
        .find("</title>")
        .map(|end| title_start + end)
        .unwrap_or(lower.len());
    lower[title_start..title_end].contains("index of")
}

/// Listing links are relative to the directory, so the base needs a
/// trailing slash even when the candidate URL lacks one.
fn listing_base(target: &Url) -> Url {
    let mut base = target.clone();
    base.set_query(None);
    base.set_fragment(None);
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

/// Collects `<a href>` targets that point at archives, resolved and deduplicated.
fn find_kit_links(html: &str, base: &Url) -> Vec<String> {
    // ASCII lowercasing keeps byte offsets valid for slicing `html`.
    let lower = html.to_ascii_lowercase();
    let mut seen = HashSet::new();
    let mut kits = Vec::new();
    let mut search_from = 0;

    while let Some(found) = lower[search_from..].find("<a") {
        let tag_start = search_from + found;
        let Some(tag_len) = lower[tag_start..].find('>') else {
            break;
        };
        let tag_end = tag_start + tag_len;
        search_from = tag_end + 1;

        // Skip <abbr>, <area>, <aside> and friends
        let is_anchor = lower[tag_start + 2..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_whitespace());
        if !is_anchor {
            continue;
        }

        let Some(href) = extract_href(&html[tag_start..tag_end]) else {
            continue;
        };
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        if !is_kit_path(resolved.path()) {
            continue;
        }

        let resolved = resolved.to_string();
        if seen.insert(resolved.clone()) {
            kits.push(resolved);
        }
    }

    kits
}

fn extract_href(tag: &str) -> Option<&str> {
    let lower = tag.to_ascii_lowercase();
    let value_start = lower.find("href=")? + "href=".len();
    let rest = &tag[value_start..];

    match rest.as_bytes().first()? {
        quote @ (b'"' | b'\'') => {
            let inner = &rest[1..];
            let end = inner.find(*quote as char)?;
            Some(&inner[..end])
        }
        _ => {
            let end = rest
                .find(|c: char| c.is_ascii_whitespace())
                .unwrap_or(rest.len());
            Some(&rest[..end])
        }
    }
}

fn is_kit_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    KIT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{build_client, FetchError};
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TIMEOUT: Duration = Duration::from_secs(5);

    const LISTING: &str = r#"<html><head><title>Index of /kits</title></head><body>
<h1>Index of /kits</h1>
<ul>
<li><a href="/">Parent Directory</a></li>
<li><a href="paypal.zip">paypal.zip</a></li>
<li><a href="notes.txt">notes.txt</a></li>
<li><a href="paypal.zip">paypal.zip (again)</a></li>
</ul></body></html>"#;

    fn website(url: &str) -> Website {
        Website::new(url, build_client(TIMEOUT).unwrap(), TIMEOUT).allow_private_targets(true)
    }

    fn base(url: &str) -> Url {
        listing_base(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_directory_listing_detection() {
        assert!(is_directory_listing(LISTING));
        assert!(is_directory_listing("<TITLE>INDEX OF /</TITLE>"));
        assert!(!is_directory_listing("<title>Sign in</title> Index of nothing"));
        assert!(!is_directory_listing("<html>no title</html>"));
    }

    #[test]
    fn test_listing_base_adds_trailing_slash() {
        assert_eq!(base("http://h/kits").as_str(), "http://h/kits/");
        assert_eq!(base("http://h/kits/?C=M;O=A").as_str(), "http://h/kits/");
        assert_eq!(base("http://h").as_str(), "http://h/");
    }

    #[test]
    fn test_find_kit_links_resolves_and_dedups() {
        assert_eq!(
            find_kit_links(LISTING, &base("http://h/kits")),
            vec!["http://h/kits/paypal.zip"]
        );
    }

    #[test]
    fn test_find_kit_links_variants() {
        let html = r#"
<A HREF="Office365.ZIP">a</A>
<a class="x" href='/other/bank.tar.gz'>b</a>
<a href=https://cdn.example/kit.7z>c</a>
<abbr href="fake.zip">d</abbr>
<a href="page.php?file=x.rar">e</a>
"#;
        assert_eq!(
            find_kit_links(html, &base("http://h/dir/")),
            vec![
                "http://h/dir/Office365.ZIP",
                "http://h/other/bank.tar.gz",
                "https://cdn.example/kit.7z",
            ]
        );
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("my kit (1).zip"), "my_kit__1_.zip");
        assert_eq!(sanitize_file_name("../../etc"), ".._.._etc");
    }

    #[tokio::test]
    async fn test_listing_with_archive_has_kit() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/kits/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
            .mount(&mock_server)
            .await;

        let mut site = website(&format!("{}/kits/", mock_server.uri()));
        assert!(site.has_kit().await.unwrap());
        assert_eq!(
            site.kits(),
            &[format!("{}/kits/paypal.zip", mock_server.uri())]
        );
    }

    #[tokio::test]
    async fn test_listing_without_archive_has_no_kit() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<title>Index of /</title><a href="readme.txt">readme.txt</a>"#,
            ))
            .mount(&mock_server)
            .await;

        let mut site = website(&mock_server.uri());
        assert!(!site.has_kit().await.unwrap());
        assert!(site.kits().is_empty());
    }

    #[tokio::test]
    async fn test_regular_page_has_no_kit() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<title>Sign in</title><a href="download.zip">get it</a>"#,
            ))
            .mount(&mock_server)
            .await;

        let mut site = website(&mock_server.uri());
        assert!(!site.has_kit().await.unwrap());
    }

    #[tokio::test]
    async fn test_http_error_is_probe_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let mut site = website(&mock_server.uri());
        match site.has_kit().await {
            Err(ProbeError::Fetch(FetchError::HttpStatus(404))) => {}
            other => panic!("Expected HttpStatus(404), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_private_target_refused_by_default() {
        let client = build_client(TIMEOUT).unwrap();
        let mut site = Website::new("http://127.0.0.1:1/", client, TIMEOUT);
        assert!(matches!(
            site.has_kit().await,
            Err(ProbeError::UnsafeTarget(_))
        ));
    }

    #[tokio::test]
    async fn test_cleanup_clears_kits() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
            .mount(&mock_server)
            .await;

        let mut site = website(&mock_server.uri());
        assert!(site.has_kit().await.unwrap());
        site.cleanup();
        assert!(site.kits().is_empty());
    }

    #[tokio::test]
    async fn test_download_kits_writes_archives() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/kits"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/kits/paypal.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04fake".to_vec()))
            .mount(&mock_server)
            .await;

        let dir = std::env::temp_dir().join("kitscout_test_download_kits");
        std::fs::remove_dir_all(&dir).ok();

        let mut site = website(&format!("{}/kits", mock_server.uri()));
        assert!(site.has_kit().await.unwrap());
        let written = site.download_kits(&dir).await;

        assert_eq!(written.len(), 1);
        let name = written[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("127.0.0.1_"), "unexpected name {name}");
        assert!(name.ends_with("_paypal.zip"), "unexpected name {name}");
        assert_eq!(std::fs::read(&written[0]).unwrap(), b"PK\x03\x04fake");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_download_failure_is_skipped() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/paypal.zip"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let dir = std::env::temp_dir().join("kitscout_test_download_failure");
        std::fs::remove_dir_all(&dir).ok();

        let mut site = website(&mock_server.uri());
        assert!(site.has_kit().await.unwrap());
        assert!(site.download_kits(&dir).await.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }
}
