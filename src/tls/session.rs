//! Secured sessions
//!
//! A [`SecuredSession`] is only ever constructed by the upgrade strategy,
//! after the handshake completed and the peer identity was accepted.

use super::cert::{peer_chain, CertInfo};
use super::config::TlsVersion;
use super::policy::IdentityCheck;
use super::transport::{close_quietly, Transport};
use openssl::ssl::{NameType, SslRef, SslStream};
use std::fmt;
use std::io::{self, Read, Write};

/// Metadata negotiated by a completed handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsDetails {
    /// Negotiated TLS version
    pub version: TlsVersion,

    /// Negotiated cipher suite (OpenSSL name)
    pub cipher: String,

    /// SNI servername sent to the peer
    pub servername: Option<String>,

    /// Negotiated ALPN protocol
    pub alpn: Option<String>,

    /// Peer certificate chain (index 0 is the leaf)
    pub cert_chain: Vec<CertInfo>,

    /// Whether the session was resumed
    pub sess_reused: bool,
}

impl TlsDetails {
    /// Collect metadata from a completed handshake
    pub(crate) fn from_ssl(ssl: &SslRef, version: TlsVersion) -> Self {
        TlsDetails {
            version,
            cipher: ssl
                .current_cipher()
                .map(|c| c.name().to_string())
                .unwrap_or_else(|| "<undef>".to_string()),
            servername: ssl.servername(NameType::HOST_NAME).map(|s| s.to_string()),
            alpn: ssl
                .selected_alpn_protocol()
                .map(|p| String::from_utf8_lossy(p).to_string()),
            cert_chain: peer_chain(ssl),
            sess_reused: ssl.session_reused(),
        }
    }

    /// Peer leaf certificate
    pub fn peer_certificate(&self) -> Option<&CertInfo> {
        self.cert_chain.first()
    }

    /// Peer principal (subject of the leaf), e.g. `CN=localhost, O=Example, C=US`
    pub fn peer_principal(&self) -> Option<&str> {
        self.peer_certificate().map(|cert| cert.subject.as_str())
    }
}

/// Handshake-completed, identity-verified TLS channel
pub struct SecuredSession<S: Transport> {
    stream: SslStream<S>,
    details: TlsDetails,
    identity_check: IdentityCheck,
    failed: bool,
}

impl<S: Transport> SecuredSession<S> {
    pub(crate) fn new(stream: SslStream<S>, details: TlsDetails, identity_check: IdentityCheck) -> Self {
        SecuredSession {
            stream,
            details,
            identity_check,
            failed: false,
        }
    }

    /// Negotiated session metadata
    pub fn details(&self) -> &TlsDetails {
        &self.details
    }

    /// Negotiated protocol version
    pub fn protocol(&self) -> TlsVersion {
        self.details.version
    }

    /// Negotiated cipher suite
    pub fn cipher(&self) -> &str {
        &self.details.cipher
    }

    /// Peer certificate chain, leaf first
    pub fn peer_certificates(&self) -> &[CertInfo] {
        &self.details.cert_chain
    }

    /// Subject of the peer certificate
    pub fn peer_principal(&self) -> Option<&str> {
        self.details.peer_principal()
    }

    /// Which check accepted the peer identity
    pub fn identity_check(&self) -> IdentityCheck {
        self.identity_check
    }

    /// Check if an I/O operation on the session failed
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Underlying engine session
    pub fn ssl(&self) -> &SslRef {
        self.stream.ssl()
    }

    /// Get reference to underlying transport
    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    /// Send close_notify (unless I/O already failed) and shut the transport down
    pub fn close(mut self) -> io::Result<()> {
        if !self.failed {
            if let Err(e) = self.stream.shutdown() {
                log::debug!("TLS shutdown incomplete: {}", e);
            }
        }
        self.stream.get_ref().close()
    }
}

impl<S: Transport> Read for SecuredSession<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).inspect_err(|_| self.failed = true)
    }
}

impl<S: Transport> Write for SecuredSession<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf).inspect_err(|_| self.failed = true)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush().inspect_err(|_| self.failed = true)
    }
}

impl<S: Transport> fmt::Debug for SecuredSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecuredSession")
            .field("details", &self.details)
            .field("identity_check", &self.identity_check)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

/// Shut the transport of a session that must not reach the caller
pub(crate) fn abandon<S: Transport>(stream: SslStream<S>) {
    close_quietly(stream.get_ref());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::cert::SubjectAltName;

    fn details() -> TlsDetails {
        TlsDetails {
            version: TlsVersion::Tls13,
            cipher: "TLS_AES_256_GCM_SHA384".to_string(),
            servername: Some("localhost".to_string()),
            alpn: None,
            cert_chain: vec![CertInfo {
                subject: "CN=localhost, C=US".to_string(),
                issuer: "CN=localhost, C=US".to_string(),
                common_name: Some("localhost".to_string()),
                subject_alt_names: vec![SubjectAltName::Dns("localhost".to_string())],
            }],
            sess_reused: false,
        }
    }

    #[test]
    fn test_peer_principal() {
        let details = details();
        assert_eq!(details.peer_principal(), Some("CN=localhost, C=US"));
        assert_eq!(
            details.peer_certificate().map(|c| c.common_name.as_deref()),
            Some(Some("localhost"))
        );
    }

    #[test]
    fn test_no_peer_certificate() {
        let mut details = details();
        details.cert_chain.clear();
        assert!(details.peer_principal().is_none());
    }
}
