//! Private-address blocking for outbound requests.
//!
//! Direct favicon probes go to whatever domain a user bookmarked, so before
//! the client talks to a host it resolves it and refuses private, loopback
//! and otherwise reserved addresses.

use std::net::IpAddr;

use markcache_core::Error;
use url::{Host, Url};

/// Error type for SSRF validation failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SsrfError {
    #[error("blocked IP: {0} (private/reserved)")]
    BlockedIp(IpAddr),

    #[error("DNS resolution failed: {0}")]
    DnsError(String),

    #[error("URL has no host: {0}")]
    MissingHost(String),

    #[error("blocked host: {0}")]
    BlockedHost(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

impl From<SsrfError> for Error {
    fn from(err: SsrfError) -> Self {
        match err {
            SsrfError::DnsError(msg) => Error::HttpError(format!("DNS resolution failed: {msg}")),
            other => Error::SsrfBlocked(other.to_string()),
        }
    }
}

/// Check if an IP address is private, reserved, or otherwise blocked.
///
/// Covers loopback, RFC 1918, link-local, multicast, broadcast and
/// unspecified addresses, carrier-grade NAT (100.64/10), benchmarking
/// (198.18/15), IPv6 unique local (fc00::/7) and IPv4-mapped IPv6 forms of
/// all of the above.
pub fn is_private_or_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || a == 0
                || (a == 100 && (b & 0xc0) == 64)
                || (a == 198 && (b & 0xfe) == 18)
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_or_reserved(IpAddr::V4(mapped));
            }
            v6.is_loopback()
                || v6.is_multicast()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Validate that an IP address is not private or reserved.
pub fn validate_ip(ip: IpAddr) -> Result<(), SsrfError> {
    if is_private_or_reserved(ip) { Err(SsrfError::BlockedIp(ip)) } else { Ok(()) }
}

/// Check a URL without resolving it.
///
/// Used where no DNS lookup is possible, such as inside a redirect policy:
/// refuses non-http schemes, private IP literals and `localhost` names.
/// Other domain names pass.
pub fn ensure_public_target(url: &Url) -> Result<(), SsrfError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SsrfError::UnsupportedScheme(url.scheme().to_string()));
    }

    match url.host() {
        Some(Host::Ipv4(ip)) => validate_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => validate_ip(IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            if domain == "localhost" || domain.ends_with(".localhost") {
                Err(SsrfError::BlockedHost(domain))
            } else {
                Ok(())
            }
        }
        None => Err(SsrfError::MissingHost(url.to_string())),
    }
}

/// Resolve the URL's host and require every address to be public.
pub async fn ensure_public_host(url: &Url) -> Result<(), SsrfError> {
    let port = url.port_or_known_default().unwrap_or(443);

    match url.host() {
        Some(Host::Ipv4(ip)) => validate_ip(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => validate_ip(IpAddr::V6(ip)),
        Some(Host::Domain(domain)) => {
            let addrs = tokio::net::lookup_host((domain, port))
                .await
                .map_err(|e| SsrfError::DnsError(format!("{domain}: {e}")))?;

            let mut resolved = false;
            for addr in addrs {
                validate_ip(addr.ip())?;
                resolved = true;
            }

            if resolved { Ok(()) } else { Err(SsrfError::DnsError(format!("{domain}: no addresses"))) }
        }
        None => Err(SsrfError::MissingHost(url.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_private_v4_ranges() {
        for ip in [
            Ipv4Addr::new(127, 0, 0, 1),
            Ipv4Addr::new(10, 1, 2, 3),
            Ipv4Addr::new(172, 16, 0, 1),
            Ipv4Addr::new(192, 168, 1, 1),
            Ipv4Addr::new(169, 254, 169, 254),
            Ipv4Addr::new(100, 64, 0, 1),
            Ipv4Addr::new(198, 19, 255, 255),
            Ipv4Addr::new(0, 0, 0, 1),
            Ipv4Addr::BROADCAST,
        ] {
            assert!(is_private_or_reserved(IpAddr::V4(ip)), "{ip} should be blocked");
        }
    }

    #[test]
    fn test_public_v4() {
        for ip in [Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(100, 128, 0, 1), Ipv4Addr::new(198, 20, 0, 1)] {
            assert!(!is_private_or_reserved(IpAddr::V4(ip)), "{ip} should be allowed");
        }
    }

    #[test]
    fn test_v6_ranges() {
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1))));
        assert!(is_private_or_reserved(IpAddr::V6(Ipv4Addr::new(127, 0, 0, 1).to_ipv6_mapped())));
        assert!(!is_private_or_reserved(IpAddr::V6(Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888))));
    }

    #[tokio::test]
    async fn test_ensure_public_host_ip_literals() {
        let url = Url::parse("http://127.0.0.1/favicon.ico").unwrap();
        assert!(matches!(ensure_public_host(&url).await, Err(SsrfError::BlockedIp(_))));

        let url = Url::parse("http://[::1]:8080/").unwrap();
        assert!(matches!(ensure_public_host(&url).await, Err(SsrfError::BlockedIp(_))));

        let url = Url::parse("https://93.184.216.34/").unwrap();
        assert!(ensure_public_host(&url).await.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_public_host_localhost_name() {
        let url = Url::parse("http://localhost/").unwrap();
        let result = ensure_public_host(&url).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_ensure_public_target() {
        for blocked in [
            "http://127.0.0.1/admin",
            "http://10.0.0.5:8080/",
            "http://169.254.169.254/latest/meta-data/",
            "http://[::1]/",
            "http://localhost/",
            "http://api.localhost./",
            "file:///etc/passwd",
        ] {
            let url = Url::parse(blocked).unwrap();
            assert!(ensure_public_target(&url).is_err(), "{blocked} should be blocked");
        }

        for allowed in ["https://example.com/favicon.ico", "http://93.184.216.34/"] {
            let url = Url::parse(allowed).unwrap();
            assert!(ensure_public_target(&url).is_ok(), "{allowed} should be allowed");
        }
    }

    #[test]
    fn test_ssrf_error_into_error() {
        let err: Error = SsrfError::BlockedIp(IpAddr::V4(Ipv4Addr::LOCALHOST)).into();
        assert!(matches!(err, Error::SsrfBlocked(_)));
        let err: Error = SsrfError::BlockedHost("localhost".into()).into();
        assert!(matches!(err, Error::SsrfBlocked(_)));
        let err: Error = SsrfError::DnsError("nope".into()).into();
        assert!(matches!(err, Error::HttpError(_)));
    }
}
