//! Session context
//!
//! Caller-owned bookkeeping that receives connection metadata after a
//! successful upgrade. The strategy never writes to it on failure.

use super::cert::CertInfo;
use super::session::TlsDetails;

/// Receives metadata of a secured connection
///
/// Both hooks default to no-ops so a context only picks up what it needs.
pub trait SessionContext {
    /// Negotiated session metadata
    fn set_tls_details(&mut self, _details: &TlsDetails) {}

    /// Application protocol selected through ALPN
    fn set_application_protocol(&mut self, _protocol: &str) {}
}

/// Context that records nothing
impl SessionContext for () {}

/// Metadata bag for a single connection
#[derive(Debug, Clone, Default)]
pub struct ConnectionContext {
    details: Option<TlsDetails>,
    application_protocol: Option<String>,
}

impl ConnectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata of the secured session, if the upgrade succeeded
    pub fn tls_details(&self) -> Option<&TlsDetails> {
        self.details.as_ref()
    }

    /// Negotiated application protocol
    pub fn application_protocol(&self) -> Option<&str> {
        self.application_protocol.as_deref()
    }

    /// Certificate info by index (0 = peer cert, 1+ = chain)
    pub fn cert(&self, index: usize) -> Option<&CertInfo> {
        self.details.as_ref()?.cert_chain.get(index)
    }

    /// Look up a metadata variable by name
    ///
    /// Unknown names yield `None`; known names without a value yield `<undef>`.
    pub fn get(&self, name: &str) -> Option<String> {
        let details = self.details.as_ref();
        let undef = || "<undef>".to_string();

        match name {
            "tls.version" => Some(details.map(|d| d.version.to_string()).unwrap_or_else(undef)),
            "tls.cipher" => Some(details.map(|d| d.cipher.clone()).unwrap_or_else(undef)),
            "tls.servername" => Some(
                details
                    .and_then(|d| d.servername.clone())
                    .unwrap_or_else(undef),
            ),
            "tls.alpn" => Some(
                self.application_protocol
                    .clone()
                    .or_else(|| details.and_then(|d| d.alpn.clone()))
                    .unwrap_or_else(undef),
            ),
            "tls.sess_reused" => {
                let reused = details.is_some_and(|d| d.sess_reused);
                Some(if reused { "true" } else { "false" }.to_string())
            }
            "tls.peer_principal" => Some(
                details
                    .and_then(|d| d.peer_principal())
                    .map(str::to_string)
                    .unwrap_or_else(undef),
            ),
            _ if name.starts_with("tls.cert") => self.get_cert_var(name),
            _ => None,
        }
    }

    /// Parse tls.cert[N].field or tls.cert.field (N=0 implicit)
    fn get_cert_var(&self, name: &str) -> Option<String> {
        let remaining = name.strip_prefix("tls.cert")?;

        let (index, field) = match remaining.strip_prefix('.') {
            Some(field) => (0, field),
            None => {
                let (index, field) = remaining.split_once('.')?;
                (index.parse::<usize>().ok()?, field.trim())
            }
        };

        let cert = self.cert(index)?;

        match field {
            "subject" => Some(cert.subject.clone()),
            "issuer" => Some(cert.issuer.clone()),
            "subject_alt_names" => {
                if cert.subject_alt_names.is_empty() {
                    Some("<undef>".to_string())
                } else {
                    Some(cert.subject_alt_name_strings().join(", "))
                }
            }
            _ => None,
        }
    }
}

impl SessionContext for ConnectionContext {
    fn set_tls_details(&mut self, details: &TlsDetails) {
        self.details = Some(details.clone());
    }

    fn set_application_protocol(&mut self, protocol: &str) {
        self.application_protocol = Some(protocol.to_string());
    }
}
