//! Hostname verification
//!
//! A [`HostnameVerifier`] compares the requested target name against the
//! identity asserted by the peer certificate. The strategy invokes it
//! directly only under [`HostnameVerificationPolicy::Client`].
//!
//! [`HostnameVerificationPolicy::Client`]: super::policy::HostnameVerificationPolicy::Client

use super::cert::CertInfo;
use std::net::IpAddr;

/// Decides whether `peer` is a valid identity for `host`
pub trait HostnameVerifier: Send + Sync {
    fn verify(&self, host: &str, peer: &CertInfo) -> bool;
}

impl<F> HostnameVerifier for F
where
    F: Fn(&str, &CertInfo) -> bool + Send + Sync,
{
    fn verify(&self, host: &str, peer: &CertInfo) -> bool {
        self(host, peer)
    }
}

/// Accepts any peer. Disables identity checks when used with the client policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHostnameVerifier;

impl HostnameVerifier for NoopHostnameVerifier {
    fn verify(&self, _host: &str, _peer: &CertInfo) -> bool {
        true
    }
}

/// RFC 2818 / RFC 6125 matching against subject alternative names
///
/// IP literals match IP SANs only. DNS names match DNS SANs; the subject
/// common name is used only when the certificate carries no DNS SAN.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHostnameVerifier;

impl HostnameVerifier for DefaultHostnameVerifier {
    fn verify(&self, host: &str, peer: &CertInfo) -> bool {
        if let Some(ip) = host_ip(host) {
            return peer.ip_addresses().any(|san| san == ip);
        }

        let host = normalize(host);
        if host.is_empty() {
            return false;
        }

        let mut dns = peer.dns_names().peekable();
        if dns.peek().is_some() {
            return dns.any(|pattern| matches_identity(&host, pattern));
        }

        peer.common_name
            .as_deref()
            .is_some_and(|cn| matches_identity(&host, cn))
    }
}

/// IP literal hosts (optionally bracketed) are checked as addresses
pub(crate) fn host_ip(host: &str) -> Option<IpAddr> {
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    host.parse().ok()
}

fn normalize(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Match a host against a DNS identity, allowing a left-most label wildcard
pub fn matches_identity(host: &str, pattern: &str) -> bool {
    let host = normalize(host);
    let pattern = normalize(pattern);
    if host.is_empty() || pattern.is_empty() {
        return false;
    }

    let Some((pattern_label, pattern_domain)) = pattern.split_once('.') else {
        return !pattern.contains('*') && host == pattern;
    };
    if !pattern_label.contains('*') {
        return !pattern_domain.contains('*') && host == pattern;
    }

    // wildcard must cover a single left-most label under a domain with 2+ labels
    if pattern_domain.contains('*') || !pattern_domain.contains('.') {
        return false;
    }
    let Some((host_label, host_domain)) = host.split_once('.') else {
        return false;
    };
    if host_domain != pattern_domain || host_label.is_empty() {
        return false;
    }

    let Some((prefix, suffix)) = pattern_label.split_once('*') else {
        return false;
    };
    if suffix.contains('*') {
        return false;
    }
    let partial = !prefix.is_empty() || !suffix.is_empty();
    if partial && (host_label.starts_with("xn--") || pattern_label.starts_with("xn--")) {
        return false;
    }
    host_label.len() >= prefix.len() + suffix.len()
        && host_label.starts_with(prefix)
        && host_label.ends_with(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::cert::SubjectAltName;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn peer(cn: Option<&str>, sans: Vec<SubjectAltName>) -> CertInfo {
        CertInfo {
            subject: cn.map(|cn| format!("CN={}", cn)).unwrap_or_default(),
            issuer: "CN=Test CA".to_string(),
            common_name: cn.map(str::to_string),
            subject_alt_names: sans,
        }
    }

    fn dns(name: &str) -> SubjectAltName {
        SubjectAltName::Dns(name.to_string())
    }

    #[test]
    fn test_exact_match() {
        let cert = peer(Some("localhost"), vec![dns("localhost")]);
        assert!(DefaultHostnameVerifier.verify("localhost", &cert));
        assert!(DefaultHostnameVerifier.verify("LOCALHOST.", &cert));
        assert!(!DefaultHostnameVerifier.verify("some-other-host", &cert));
        assert!(!DefaultHostnameVerifier.verify("", &cert));
    }

    #[test]
    fn test_sans_take_precedence_over_cn() {
        let cert = peer(Some("cn.example.com"), vec![dns("san.example.com")]);
        assert!(DefaultHostnameVerifier.verify("san.example.com", &cert));
        assert!(!DefaultHostnameVerifier.verify("cn.example.com", &cert));

        let cn_only = peer(Some("cn.example.com"), vec![]);
        assert!(DefaultHostnameVerifier.verify("cn.example.com", &cn_only));
    }

    #[test]
    fn test_ip_literals_match_ip_sans_only() {
        let cert = peer(
            Some("127.0.0.1"),
            vec![
                dns("localhost"),
                SubjectAltName::Ip(IpAddr::V4(Ipv4Addr::LOCALHOST)),
                SubjectAltName::Ip(IpAddr::V6(Ipv6Addr::LOCALHOST)),
            ],
        );
        assert!(DefaultHostnameVerifier.verify("127.0.0.1", &cert));
        assert!(DefaultHostnameVerifier.verify("::1", &cert));
        assert!(DefaultHostnameVerifier.verify("[::1]", &cert));
        assert!(!DefaultHostnameVerifier.verify("127.0.0.2", &cert));

        let cn_ip = peer(Some("127.0.0.1"), vec![dns("localhost")]);
        assert!(!DefaultHostnameVerifier.verify("127.0.0.1", &cn_ip));
    }

    #[test]
    fn test_host_ip() {
        assert_eq!(host_ip("127.0.0.1"), Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert_eq!(host_ip("[::1]"), Some(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert_eq!(host_ip("localhost"), None);
    }

    #[test]
    fn test_wildcards() {
        assert!(matches_identity("www.example.com", "*.example.com"));
        assert!(matches_identity("WWW.Example.com", "*.example.COM"));
        assert!(!matches_identity("example.com", "*.example.com"));
        assert!(!matches_identity("a.b.example.com", "*.example.com"));
        assert!(!matches_identity("example.com", "*.com"));
        assert!(!matches_identity("www.example.com", "www.*.com"));
        assert!(!matches_identity("www.example.com", "**.example.com"));
    }

    #[test]
    fn test_partial_wildcards() {
        assert!(matches_identity("foo1.example.com", "foo*.example.com"));
        assert!(matches_identity("xfoo.example.com", "*foo.example.com"));
        assert!(!matches_identity("bar.example.com", "foo*.example.com"));
        assert!(!matches_identity("xn--bcher-kva.example.com", "xn--*.example.com"));
        assert!(matches_identity("xn--bcher-kva.example.com", "*.example.com"));
    }

    #[test]
    fn test_noop_and_closure_verifiers() {
        let cert = peer(Some("localhost"), vec![dns("localhost")]);
        assert!(NoopHostnameVerifier.verify("anything", &cert));

        let only_cn = |host: &str, peer: &CertInfo| peer.common_name.as_deref() == Some(host);
        assert!(only_cn.verify("localhost", &cert));
        assert!(!only_cn.verify("other", &cert));
    }
}
