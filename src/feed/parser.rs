use anyhow::{anyhow, Result};
use serde_json::Value;

/// Extracts `results[].task.url` from a urlscan.io search response.
///
/// Records without a string `task.url` are skipped. A body that is not JSON,
/// or has no `results` array, is an error.
pub fn parse_urlscan(bytes: &[u8]) -> Result<Vec<String>> {
    let response: Value = serde_json::from_slice(bytes)?;
    let results = response
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("missing `results` array"))?;

    let urls = results
        .iter()
        .filter_map(|record| record.pointer("/task/url").and_then(Value::as_str))
        .map(str::to_owned)
        .collect();

    Ok(urls)
}

/// Splits a plaintext feed into one URL per line.
pub fn parse_openphish(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Extracts the `url` column from a header-bearing CSV table.
///
/// Rows that fail to parse, or lack the column, are skipped. A table with no
/// `url` header is an error.
pub fn parse_phishtank(bytes: &[u8]) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let url_column = reader
        .headers()?
        .iter()
        .position(|h| h.trim() == "url")
        .ok_or_else(|| anyhow!("missing `url` column"))?;

    let mut urls = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        match record {
            Ok(row) => match row.get(url_column) {
                Some(url) if !url.is_empty() => urls.push(url.to_owned()),
                _ => skipped += 1,
            },
            Err(_) => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped = skipped, "Skipped malformed PhishTank rows");
    }

    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_urlscan_extracts_task_urls() {
        let body = br#"{"results": [
            {"task": {"url": "https://a.example/login"}},
            {"task": {"url": "https://b.example/"}}
        ]}"#;
        assert_eq!(
            parse_urlscan(body).unwrap(),
            vec!["https://a.example/login", "https://b.example/"]
        );
    }

    #[test]
    fn test_urlscan_skips_records_without_url() {
        let body = br#"{"results": [
            {"task": {"url": "https://a.example/"}},
            {"task": {}},
            {"page": {"url": "https://ignored.example/"}},
            {"task": {"url": 42}},
            {"task": "not-an-object"}
        ]}"#;
        assert_eq!(parse_urlscan(body).unwrap(), vec!["https://a.example/"]);
    }

    #[test]
    fn test_urlscan_empty_results() {
        assert!(parse_urlscan(br#"{"results": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_urlscan_missing_results_is_error() {
        assert!(parse_urlscan(br#"{"message": "rate limited"}"#).is_err());
    }

    #[test]
    fn test_urlscan_invalid_json_is_error() {
        assert!(parse_urlscan(b"<html>").is_err());
    }

    #[test]
    fn test_openphish_lines() {
        let body = "https://a.example/x\r\nhttps://b.example/y\n\nhttps://c.example/\n";
        assert_eq!(
            parse_openphish(body),
            vec![
                "https://a.example/x",
                "https://b.example/y",
                "https://c.example/"
            ]
        );
    }

    #[test]
    fn test_openphish_empty_body() {
        assert!(parse_openphish("").is_empty());
    }

    #[test]
    fn test_phishtank_url_column() {
        let body = b"phish_id,url,phish_detail_url,verified\n\
1,https://a.example/login.php,http://www.phishtank.com/phish_detail.php?phish_id=1,yes\n\
2,\"https://b.example/a,b\",http://www.phishtank.com/phish_detail.php?phish_id=2,yes\n";
        assert_eq!(
            parse_phishtank(body).unwrap(),
            vec!["https://a.example/login.php", "https://b.example/a,b"]
        );
    }

    #[test]
    fn test_phishtank_short_rows_skipped() {
        let body = b"phish_id,url\n1,https://a.example/\n2\n";
        assert_eq!(parse_phishtank(body).unwrap(), vec!["https://a.example/"]);
    }

    #[test]
    fn test_phishtank_missing_url_header_is_error() {
        assert!(parse_phishtank(b"id,link\n1,https://a.example/\n").is_err());
    }
}
