use url::Url;

/// Candidates ending in one of these are page scripts or documents, never kit
/// directories, and are dropped.
pub const DENYLISTED_EXTENSIONS: [&str; 5] = [".htm", ".html", ".php", ".asp", ".aspx"];

/// Breaks a raw feed URL down into the candidate URLs worth probing.
///
/// Without `expand_paths` the result is just the origin, `scheme://host`.
/// Port, credentials, query and fragment never make it into a candidate.
/// With it, every successive path prefix is produced as well, shortest first:
///
/// ```ignore
/// breakdown("http://h/a/b/c.html", true)
///     == ["http://h", "http://h/a", "http://h/a/b"]
/// ```
///
/// Each candidate is checked against [`DENYLISTED_EXTENSIONS`] on its own, so
/// a rejected full path does not affect its shorter prefixes. A URL that
/// does not parse, or has no host, yields nothing.
pub fn breakdown(raw: &str, expand_paths: bool) -> Vec<String> {
    let url = match Url::parse(raw.trim()) {
        Ok(url) => url,
        Err(e) => {
            tracing::trace!(url = %raw, error = %e, "Dropping unparseable URL");
            return Vec::new();
        }
    };

    let Some(host) = url.host_str() else {
        tracing::trace!(url = %raw, "Dropping URL without host");
        return Vec::new();
    };

    let origin = format!("{}://{}", url.scheme(), host);
    if !expand_paths {
        return vec![origin];
    }

    // The leading "" segment stands for the bare origin; trailing slashes
    // don't make a new level.
    let mut segments: Vec<&str> = url.path().split('/').collect();
    while segments.last() == Some(&"") {
        segments.pop();
    }
    if segments.is_empty() {
        return vec![origin];
    }

    (0..segments.len())
        .map(|idx| format!("{}{}", origin, segments[..=idx].join("/")))
        .filter(|candidate| !has_denylisted_extension(candidate))
        .collect()
}

fn has_denylisted_extension(candidate: &str) -> bool {
    DENYLISTED_EXTENSIONS
        .iter()
        .any(|ext| candidate.ends_with(ext))
}
