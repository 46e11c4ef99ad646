//! Certificate handling
//!
//! This module extracts the peer identity information needed for hostname
//! verification and session metadata from X.509 certificates.

use openssl::nid::Nid;
use openssl::ssl::SslRef;
use openssl::x509::{X509NameRef, X509Ref};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Subject Alternative Name entry relevant to server identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectAltName {
    Dns(String),
    Ip(IpAddr),
}

impl fmt::Display for SubjectAltName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectAltName::Dns(name) => write!(f, "DNS:{}", name),
            SubjectAltName::Ip(ip) => write!(f, "IP:{}", ip),
        }
    }
}

/// Certificate information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    /// Subject distinguished name, most specific RDN first (`CN=..., O=..., C=...`)
    pub subject: String,
    /// Issuer distinguished name, same format as `subject`
    pub issuer: String,
    /// Subject Common Name, if present
    pub common_name: Option<String>,
    /// Subject Alternative Names (DNS names and IP addresses)
    pub subject_alt_names: Vec<SubjectAltName>,
}

impl CertInfo {
    /// Extract certificate information from an X.509 certificate
    pub fn from_x509(cert: &X509Ref) -> Self {
        CertInfo {
            subject: principal(cert.subject_name()),
            issuer: principal(cert.issuer_name()),
            common_name: common_name(cert.subject_name()),
            subject_alt_names: subject_alt_names(cert),
        }
    }

    /// DNS names from the SAN extension
    pub fn dns_names(&self) -> impl Iterator<Item = &str> {
        self.subject_alt_names.iter().filter_map(|san| match san {
            SubjectAltName::Dns(name) => Some(name.as_str()),
            SubjectAltName::Ip(_) => None,
        })
    }

    /// IP addresses from the SAN extension
    pub fn ip_addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.subject_alt_names.iter().filter_map(|san| match san {
            SubjectAltName::Ip(ip) => Some(*ip),
            SubjectAltName::Dns(_) => None,
        })
    }

    /// SANs rendered as `DNS:name` / `IP:addr`
    pub fn subject_alt_name_strings(&self) -> Vec<String> {
        self.subject_alt_names.iter().map(ToString::to_string).collect()
    }
}

/// Render a distinguished name in RFC 2253 order
pub fn principal(name: &X509NameRef) -> String {
    let mut rdns: Vec<String> = name
        .entries()
        .map(|entry| {
            let object = entry.object();
            let key = object
                .nid()
                .short_name()
                .map(str::to_string)
                .unwrap_or_else(|_| object.to_string());
            let value = entry
                .data()
                .as_utf8()
                .map(|s| escape_rdn_value(&s))
                .unwrap_or_default();
            format!("{}={}", key, value)
        })
        .collect();
    rdns.reverse();
    rdns.join(", ")
}

fn escape_rdn_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        let leading = i == 0 && (c == ' ' || c == '#');
        if leading || matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    if escaped.ends_with(' ') {
        escaped.pop();
        escaped.push_str("\\ ");
    }
    escaped
}

/// Get Common Name from X509_NAME
fn common_name(name: &X509NameRef) -> Option<String> {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|s| s.to_string())
}

/// Get Subject Alternative Names
fn subject_alt_names(cert: &X509Ref) -> Vec<SubjectAltName> {
    let mut names = Vec::new();

    if let Some(san_ext) = cert.subject_alt_names() {
        for name in san_ext {
            if let Some(dns) = name.dnsname() {
                names.push(SubjectAltName::Dns(dns.to_string()));
            } else if let Some(ip) = name.ipaddress() {
                if let Ok(v4) = <[u8; 4]>::try_from(ip) {
                    names.push(SubjectAltName::Ip(IpAddr::V4(Ipv4Addr::from(v4))));
                } else if let Ok(v6) = <[u8; 16]>::try_from(ip) {
                    names.push(SubjectAltName::Ip(IpAddr::V6(Ipv6Addr::from(v6))));
                }
            }
        }
    }

    names
}

/// Extract the peer certificate chain from an SSL connection (leaf first)
pub fn peer_chain(ssl: &SslRef) -> Vec<CertInfo> {
    // On the client side the peer chain already starts with the leaf
    if let Some(chain) = ssl.peer_cert_chain() {
        if chain.len() > 0 {
            return chain.iter().map(CertInfo::from_x509).collect();
        }
    }
    ssl.peer_certificate()
        .map(|cert| vec![CertInfo::from_x509(&cert)])
        .unwrap_or_default()
}
