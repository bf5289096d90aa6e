use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Reasons a candidate URL is refused as a probe target.
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    #[error("Localhost not allowed")]
    Localhost,
}

/// Parses a candidate and checks it is a public http(s) target.
///
/// Feed data is attacker-controlled, so hosts that resolve to the local
/// machine or private networks are refused unless `allow_private` is set.
/// Only literal IPs are checked; hostnames are not resolved here.
pub fn validate_target(candidate: &str, allow_private: bool) -> Result<Url, TargetError> {
    let url = Url::parse(candidate)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(TargetError::UnsupportedScheme(scheme.to_owned())),
    }

    if allow_private {
        return Ok(url);
    }

    match url.host() {
        Some(url::Host::Domain(domain)) if domain.eq_ignore_ascii_case("localhost") => {
            return Err(TargetError::Localhost);
        }
        Some(url::Host::Ipv4(ip)) => check_ip(IpAddr::V4(ip))?,
        Some(url::Host::Ipv6(ip)) => check_ip(IpAddr::V6(ip))?,
        _ => {}
    }

    Ok(url)
}

fn check_ip(ip: IpAddr) -> Result<(), TargetError> {
    if ip.is_loopback() {
        return Err(TargetError::Localhost);
    }
    let private = match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link-local
            v6.is_unspecified() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    };
    if private {
        return Err(TargetError::PrivateIp(ip.to_string()));
    }
    Ok(())
}
