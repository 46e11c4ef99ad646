//! TLS engine configuration
//!
//! This module provides the immutable client engine configuration and its
//! builder. A [`TlsEngineConfig`] is built once and shared read-only by every
//! upgrade performed with it.

use super::cipher::{self, CipherSelection};
use super::error::TlsError;
use super::trust::{self, TrustEvaluator};
use openssl::pkey::PKey;
use openssl::ssl::{SslContext, SslContextBuilder, SslMethod, SslOptions, SslVerifyMode, SslVersion};
use openssl::x509::X509;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// TLS version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TlsVersion {
    /// SSL 3.0 (never accepted by this crate)
    Ssl3,
    /// TLS 1.0
    Tls10,
    /// TLS 1.1
    Tls11,
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

/// Protocols enabled when none are configured
pub const DEFAULT_PROTOCOLS: &[TlsVersion] = &[TlsVersion::Tls12, TlsVersion::Tls13];

impl TlsVersion {
    /// Get OpenSSL protocol version constant
    pub fn to_openssl_version(&self) -> SslVersion {
        match self {
            TlsVersion::Ssl3 => SslVersion::SSL3,
            TlsVersion::Tls10 => SslVersion::TLS1,
            TlsVersion::Tls11 => SslVersion::TLS1_1,
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }

    /// Map a negotiated OpenSSL version back
    pub fn from_openssl_version(version: SslVersion) -> Option<Self> {
        [
            TlsVersion::Ssl3,
            TlsVersion::Tls10,
            TlsVersion::Tls11,
            TlsVersion::Tls12,
            TlsVersion::Tls13,
        ]
        .into_iter()
        .find(|v| v.to_openssl_version() == version)
    }

    /// Get version as string
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Ssl3 => "SSLv3",
            TlsVersion::Tls10 => "TLSv1.0",
            TlsVersion::Tls11 => "TLSv1.1",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }

    /// Option that switches this version off inside a min/max range
    fn disable_option(&self) -> SslOptions {
        match self {
            TlsVersion::Ssl3 => SslOptions::NO_SSLV3,
            TlsVersion::Tls10 => SslOptions::NO_TLSV1,
            TlsVersion::Tls11 => SslOptions::NO_TLSV1_1,
            TlsVersion::Tls12 => SslOptions::NO_TLSV1_2,
            TlsVersion::Tls13 => SslOptions::NO_TLSV1_3,
        }
    }
}

impl FromStr for TlsVersion {
    type Err = TlsError;

    /// Parse TLS version from string (case-insensitive)
    fn from_str(s: &str) -> Result<Self, TlsError> {
        match s.to_uppercase().as_str() {
            "SSLV3" | "SSL3" => Ok(TlsVersion::Ssl3),
            "TLSV1.0" | "TLS1.0" | "TLSV1" | "TLS1" => Ok(TlsVersion::Tls10),
            "TLSV1.1" | "TLS1.1" => Ok(TlsVersion::Tls11),
            "TLSV1.2" | "TLS1.2" => Ok(TlsVersion::Tls12),
            "TLSV1.3" | "TLS1.3" => Ok(TlsVersion::Tls13),
            _ => Err(TlsError::config(format!("invalid TLS version: {}", s))),
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client TLS engine configuration (immutable after building)
#[derive(Clone)]
pub struct TlsEngineConfig {
    pub(crate) ctx: SslContext,
    pub(crate) protocols: Vec<TlsVersion>,
    pub(crate) cipher_suites: Option<Vec<String>>,
    pub(crate) alpn: Vec<String>,
    pub(crate) handshake_timeout: Option<Duration>,
}

impl TlsEngineConfig {
    /// Create a new configuration builder
    pub fn builder() -> TlsEngineConfigBuilder {
        TlsEngineConfigBuilder::new()
    }

    /// Secure defaults: TLS 1.2/1.3, strong suites, system trust store
    pub fn with_defaults() -> Result<Self, TlsError> {
        Self::builder().build()
    }

    /// Protocol versions a session may negotiate, ascending
    pub fn protocols(&self) -> &[TlsVersion] {
        &self.protocols
    }

    /// True if `version` may be negotiated
    pub fn allows(&self, version: TlsVersion) -> bool {
        self.protocols.contains(&version)
    }

    /// Explicitly configured suites that survived weak filtering
    pub fn cipher_suites(&self) -> Option<&[String]> {
        self.cipher_suites.as_deref()
    }

    /// ALPN protocols offered to the server
    pub fn alpn_protocols(&self) -> &[String] {
        &self.alpn
    }

    /// Handshake deadline used when the caller supplies none
    pub fn handshake_timeout(&self) -> Option<Duration> {
        self.handshake_timeout
    }
}

impl fmt::Debug for TlsEngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsEngineConfig")
            .field("protocols", &self.protocols)
            .field("cipher_suites", &self.cipher_suites)
            .field("alpn", &self.alpn)
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}

/// Builder for [`TlsEngineConfig`]
///
/// Setters only record values; everything is validated in [`build`](Self::build).
pub struct TlsEngineConfigBuilder {
    protocols: Option<Vec<TlsVersion>>,
    cipher_suites: Option<Vec<String>>,
    trust_system_roots: bool,
    trust_anchors: Vec<Vec<u8>>,
    trust_evaluator: Option<Arc<dyn TrustEvaluator>>,
    alpn: Vec<String>,
    client_identity: Option<Vec<u8>>,
    handshake_timeout: Option<Duration>,
}

impl TlsEngineConfigBuilder {
    fn new() -> Self {
        TlsEngineConfigBuilder {
            protocols: None,
            cipher_suites: None,
            trust_system_roots: true,
            trust_anchors: Vec::new(),
            trust_evaluator: None,
            alpn: Vec::new(),
            client_identity: None,
            handshake_timeout: None,
        }
    }

    /// Set the enabled protocol versions
    pub fn protocols(mut self, versions: &[TlsVersion]) -> Self {
        self.protocols = Some(versions.to_vec());
        self
    }

    /// Set a single TLS version (both min and max)
    pub fn version(self, version: TlsVersion) -> Self {
        self.protocols(&[version])
    }

    /// Set TLS version range
    pub fn version_range(mut self, min: TlsVersion, max: TlsVersion) -> Self {
        self.protocols = Some(
            [
                TlsVersion::Ssl3,
                TlsVersion::Tls10,
                TlsVersion::Tls11,
                TlsVersion::Tls12,
                TlsVersion::Tls13,
            ]
            .into_iter()
            .filter(|v| *v >= min && *v <= max)
            .collect(),
        );
        self
    }

    /// Set the enabled cipher suites
    ///
    /// OpenSSL names (`ECDHE-RSA-AES128-GCM-SHA256`) for TLS 1.2 and below,
    /// IANA names (`TLS_AES_128_GCM_SHA256`) for TLS 1.3.
    pub fn cipher_suites<S: AsRef<str>>(mut self, suites: &[S]) -> Self {
        self.cipher_suites = Some(suites.iter().map(|s| s.as_ref().to_string()).collect());
        self
    }

    /// Trust the platform's default certificate store (on by default)
    pub fn trust_system_roots(mut self, enabled: bool) -> Self {
        self.trust_system_roots = enabled;
        self
    }

    /// Add PEM encoded trust anchors
    pub fn trust_anchor_pem(mut self, pem: &[u8]) -> Self {
        self.trust_anchors.push(pem.to_vec());
        self
    }

    /// Load PEM encoded trust anchors from a file
    pub fn trust_anchor_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, TlsError> {
        let pem = read_pem_file(path.as_ref())?;
        self.trust_anchors.push(pem);
        Ok(self)
    }

    /// Install a trust evaluator consulted when chain validation fails
    pub fn trust_evaluator<T: TrustEvaluator + 'static>(mut self, evaluator: T) -> Self {
        self.trust_evaluator = Some(Arc::new(evaluator));
        self
    }

    /// Set ALPN protocols
    pub fn alpn(mut self, protocols: &[&str]) -> Self {
        self.alpn = protocols.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Client certificate and private key (PEM, concatenated)
    pub fn client_identity_pem(mut self, pem: &[u8]) -> Self {
        self.client_identity = Some(pem.to_vec());
        self
    }

    /// Load client certificate and private key from a PEM file
    pub fn client_identity_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, TlsError> {
        self.client_identity = Some(read_pem_file(path.as_ref())?);
        Ok(self)
    }

    /// Handshake deadline used when `upgrade` is called without one
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// Build the TLS configuration
    pub fn build(self) -> Result<TlsEngineConfig, TlsError> {
        let mut ctx_builder = SslContextBuilder::new(SslMethod::tls_client())
            .map_err(|e| TlsError::config(format!("cannot create TLS context: {}", e)))?;

        let mut protocols = self.resolve_protocols()?;

        let selection = match &self.cipher_suites {
            Some(names) => {
                let selection = CipherSelection::from_names(names);
                if !selection.rejected.is_empty() {
                    log::warn!(
                        "dropping weak cipher suites from configuration: {}",
                        selection.rejected.join(", ")
                    );
                }
                if selection.is_empty() {
                    return Err(TlsError::config(
                        "no acceptable cipher suites configured (all weak or empty)",
                    ));
                }
                Some(selection)
            }
            None => None,
        };

        match &selection {
            Some(selection) => {
                match selection.legacy_cipher_list() {
                    Some(list) => ctx_builder.set_cipher_list(&list).map_err(|e| {
                        TlsError::config(format!("unusable cipher list {:?}: {}", list, e))
                    })?,
                    None => protocols.retain(|v| *v == TlsVersion::Tls13),
                }
                match selection.tls13_ciphersuites() {
                    Some(suites) => ctx_builder.set_ciphersuites(&suites).map_err(|e| {
                        TlsError::config(format!("unusable TLS 1.3 suites {:?}: {}", suites, e))
                    })?,
                    None => protocols.retain(|v| *v != TlsVersion::Tls13),
                }
                if protocols.is_empty() {
                    return Err(TlsError::config(
                        "configured cipher suites don't apply to any enabled protocol",
                    ));
                }
            }
            None => ctx_builder
                .set_cipher_list(cipher::DEFAULT_CIPHER_LIST)
                .map_err(|e| TlsError::config(format!("default cipher list rejected: {}", e)))?,
        }

        apply_protocols(&mut ctx_builder, &protocols)?;

        // TLS 1.0/1.1 sign with MD5/SHA-1, which any security level above 0 refuses
        if protocols.iter().any(|v| *v < TlsVersion::Tls12) {
            ctx_builder.set_security_level(0);
        }

        ctx_builder.set_options(SslOptions::NO_COMPRESSION | SslOptions::NO_SSLV2 | SslOptions::NO_SSLV3);

        self.apply_trust(&mut ctx_builder)?;

        if !self.alpn.is_empty() {
            ctx_builder
                .set_alpn_protos(&encode_alpn(&self.alpn)?)
                .map_err(|e| TlsError::config(format!("cannot set ALPN protocols: {}", e)))?;
        }

        if let Some(pem) = &self.client_identity {
            load_client_identity(&mut ctx_builder, pem)?;
        }

        Ok(TlsEngineConfig {
            ctx: ctx_builder.build(),
            protocols,
            cipher_suites: selection.map(|s| s.legacy.into_iter().chain(s.tls13).collect()),
            alpn: self.alpn,
            handshake_timeout: self.handshake_timeout,
        })
    }

    fn resolve_protocols(&self) -> Result<Vec<TlsVersion>, TlsError> {
        let mut protocols = self
            .protocols
            .clone()
            .unwrap_or_else(|| DEFAULT_PROTOCOLS.to_vec());
        protocols.sort();
        protocols.dedup();

        if protocols.is_empty() {
            return Err(TlsError::config("no protocol versions enabled"));
        }
        if protocols.contains(&TlsVersion::Ssl3) {
            return Err(TlsError::config("SSLv3 cannot be enabled"));
        }
        let legacy: Vec<&str> = protocols
            .iter()
            .filter(|v| **v < TlsVersion::Tls12)
            .map(TlsVersion::as_str)
            .collect();
        if !legacy.is_empty() {
            log::warn!(
                "legacy protocol versions explicitly enabled, lowering security level: {}",
                legacy.join(", ")
            );
        }
        Ok(protocols)
    }

    fn apply_trust(&self, ctx_builder: &mut SslContextBuilder) -> Result<(), TlsError> {
        if !self.trust_system_roots && self.trust_anchors.is_empty() && self.trust_evaluator.is_none() {
            return Err(TlsError::config(
                "no trust material: system roots disabled and no anchors or evaluator given",
            ));
        }

        if self.trust_system_roots {
            ctx_builder
                .set_default_verify_paths()
                .map_err(|e| TlsError::config(format!("cannot load system trust store: {}", e)))?;
        }

        for pem in &self.trust_anchors {
            let certs = X509::stack_from_pem(pem)
                .map_err(|e| TlsError::config(format!("invalid trust anchor PEM: {}", e)))?;
            if certs.is_empty() {
                return Err(TlsError::config("trust anchor PEM contains no certificates"));
            }
            for cert in certs {
                ctx_builder
                    .cert_store_mut()
                    .add_cert(cert)
                    .map_err(|e| TlsError::config(format!("cannot add trust anchor: {}", e)))?;
            }
        }

        match &self.trust_evaluator {
            Some(evaluator) => trust::install(ctx_builder, Arc::clone(evaluator)),
            None => ctx_builder.set_verify(SslVerifyMode::PEER),
        }
        Ok(())
    }
}

/// Clamp the context to the enabled set, switching off gaps inside the range
fn apply_protocols(ctx_builder: &mut SslContextBuilder, protocols: &[TlsVersion]) -> Result<(), TlsError> {
    let (min, max) = match (protocols.first(), protocols.last()) {
        (Some(min), Some(max)) => (*min, *max),
        _ => return Err(TlsError::config("no protocol versions enabled")),
    };

    ctx_builder
        .set_min_proto_version(Some(min.to_openssl_version()))
        .map_err(|e| TlsError::config(format!("cannot set minimum version {}: {}", min, e)))?;
    ctx_builder
        .set_max_proto_version(Some(max.to_openssl_version()))
        .map_err(|e| TlsError::config(format!("cannot set maximum version {}: {}", max, e)))?;

    let mut gaps = SslOptions::empty();
    for version in [TlsVersion::Tls10, TlsVersion::Tls11, TlsVersion::Tls12, TlsVersion::Tls13] {
        if version > min && version < max && !protocols.contains(&version) {
            gaps |= version.disable_option();
        }
    }
    if !gaps.is_empty() {
        ctx_builder.set_options(gaps);
    }
    Ok(())
}

/// Encode ALPN protocols (length-prefixed)
fn encode_alpn(protocols: &[String]) -> Result<Vec<u8>, TlsError> {
    let mut alpn_bytes = Vec::new();
    for proto in protocols {
        let len = u8::try_from(proto.len())
            .ok()
            .filter(|len| *len > 0)
            .ok_or_else(|| TlsError::config(format!("invalid ALPN protocol {:?}", proto)))?;
        alpn_bytes.push(len);
        alpn_bytes.extend_from_slice(proto.as_bytes());
    }
    Ok(alpn_bytes)
}

fn load_client_identity(ctx_builder: &mut SslContextBuilder, pem: &[u8]) -> Result<(), TlsError> {
    let mut certs = X509::stack_from_pem(pem)
        .map_err(|e| TlsError::config(format!("failed to load client certificate: {}", e)))?
        .into_iter();
    let cert = certs
        .next()
        .ok_or_else(|| TlsError::config("client identity PEM contains no certificate"))?;
    ctx_builder.set_certificate(&cert).map_err(|e| {
        TlsError::config(format!("cannot use client certificate: {}", e))
    })?;
    for extra in certs {
        ctx_builder
            .add_extra_chain_cert(extra)
            .map_err(|e| TlsError::config(format!("cannot add client chain certificate: {}", e)))?;
    }

    let key = PKey::private_key_from_pem(pem)
        .map_err(|e| TlsError::config(format!("failed to load client private key: {}", e)))?;
    ctx_builder
        .set_private_key(&key)
        .map_err(|e| TlsError::config(format!("cannot use client private key: {}", e)))?;
    ctx_builder
        .check_private_key()
        .map_err(|e| TlsError::config(format!("client key doesn't match certificate: {}", e)))?;
    Ok(())
}

fn read_pem_file(path: &Path) -> Result<Vec<u8>, TlsError> {
    let mut pem = Vec::new();
    File::open(path)
        .and_then(|mut f| f.read_to_end(&mut pem))
        .map_err(|e| TlsError::config(format!("cannot read {}: {}", path.display(), e)))?;
    Ok(pem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::testdata::LOCALHOST_PEM;

    #[test]
    fn test_tls_version_parsing() {
        assert_eq!("TLSv1.2".parse::<TlsVersion>().unwrap(), TlsVersion::Tls12);
        assert_eq!("tlsv1.3".parse::<TlsVersion>().unwrap(), TlsVersion::Tls13);
        assert_eq!("TLS1.0".parse::<TlsVersion>().unwrap(), TlsVersion::Tls10);
        assert!("invalid".parse::<TlsVersion>().is_err());
    }

    #[test]
    fn test_openssl_version_roundtrip() {
        assert_eq!(
            TlsVersion::from_openssl_version(SslVersion::TLS1_3),
            Some(TlsVersion::Tls13)
        );
        assert_eq!(TlsVersion::Tls11.to_string(), "TLSv1.1");
    }

    #[test]
    fn test_defaults() {
        let config = TlsEngineConfig::with_defaults().unwrap();
        assert_eq!(config.protocols(), &[TlsVersion::Tls12, TlsVersion::Tls13]);
        assert!(config.cipher_suites().is_none());
        assert!(config.handshake_timeout().is_none());
        assert!(!config.allows(TlsVersion::Tls11));
    }

    #[test]
    fn test_version_range() {
        let config = TlsEngineConfig::builder()
            .version_range(TlsVersion::Tls11, TlsVersion::Tls13)
            .build()
            .unwrap();
        assert_eq!(
            config.protocols(),
            &[TlsVersion::Tls11, TlsVersion::Tls12, TlsVersion::Tls13]
        );
    }

    #[test]
    fn test_explicit_legacy_versions_lower_security_level() {
        let legacy = TlsEngineConfig::builder()
            .version_range(TlsVersion::Tls10, TlsVersion::Tls12)
            .build()
            .unwrap();
        assert_eq!(legacy.ctx.security_level(), 0);

        // untouched: whatever the engine defaults to
        let engine_default = SslContextBuilder::new(SslMethod::tls_client())
            .unwrap()
            .build()
            .security_level();
        let modern = TlsEngineConfig::with_defaults().unwrap();
        assert_eq!(modern.ctx.security_level(), engine_default);
    }

    #[test]
    fn test_ssl3_rejected() {
        let err = TlsEngineConfig::builder()
            .protocols(&[TlsVersion::Ssl3, TlsVersion::Tls12])
            .build()
            .unwrap_err();
        assert!(matches!(err, TlsError::Configuration(_)));
    }

    #[test]
    fn test_empty_protocols_rejected() {
        let err = TlsEngineConfig::builder().protocols(&[]).build().unwrap_err();
        assert!(matches!(err, TlsError::Configuration(_)));
    }

    #[test]
    fn test_only_weak_ciphers_rejected() {
        let err = TlsEngineConfig::builder()
            .cipher_suites(&["RC4-SHA", "DES-CBC3-SHA", "NULL-SHA"])
            .build()
            .unwrap_err();
        assert!(matches!(err, TlsError::Configuration(_)));
    }

    #[test]
    fn test_weak_ciphers_filtered() {
        let config = TlsEngineConfig::builder()
            .cipher_suites(&["ECDHE-RSA-AES128-GCM-SHA256", "RC4-SHA", "TLS_AES_128_GCM_SHA256"])
            .build()
            .unwrap();
        assert_eq!(
            config.cipher_suites().unwrap(),
            &["ECDHE-RSA-AES128-GCM-SHA256".to_string(), "TLS_AES_128_GCM_SHA256".to_string()]
        );
    }

    #[test]
    fn test_tls13_only_suites_narrow_protocols() {
        let config = TlsEngineConfig::builder()
            .cipher_suites(&["TLS_AES_256_GCM_SHA384"])
            .build()
            .unwrap();
        assert_eq!(config.protocols(), &[TlsVersion::Tls13]);

        let err = TlsEngineConfig::builder()
            .version(TlsVersion::Tls12)
            .cipher_suites(&["TLS_AES_256_GCM_SHA384"])
            .build()
            .unwrap_err();
        assert!(matches!(err, TlsError::Configuration(_)));
    }

    #[test]
    fn test_trust_anchor_pem() {
        TlsEngineConfig::builder()
            .trust_system_roots(false)
            .trust_anchor_pem(LOCALHOST_PEM.as_bytes())
            .build()
            .unwrap();

        let err = TlsEngineConfig::builder()
            .trust_anchor_pem(b"not a certificate")
            .build()
            .unwrap_err();
        assert!(matches!(err, TlsError::Configuration(_)));
    }

    #[test]
    fn test_no_trust_material_rejected() {
        let err = TlsEngineConfig::builder()
            .trust_system_roots(false)
            .build()
            .unwrap_err();
        assert!(matches!(err, TlsError::Configuration(_)));
    }

    #[test]
    fn test_missing_trust_file() {
        let result = TlsEngineConfig::builder().trust_anchor_file("/nonexistent/ca.pem");
        assert!(matches!(result, Err(TlsError::Configuration(_))));
    }

    #[test]
    fn test_client_identity() {
        let config = TlsEngineConfig::builder()
            .client_identity_pem(LOCALHOST_PEM.as_bytes())
            .build();
        assert!(config.is_ok());
    }

    #[test]
    fn test_alpn_encoding() {
        let encoded = encode_alpn(&["h2".to_string(), "http/1.1".to_string()]).unwrap();
        assert_eq!(encoded, b"\x02h2\x08http/1.1");
        assert!(encode_alpn(&[String::new()]).is_err());
        assert!(encode_alpn(&["x".repeat(256)]).is_err());
    }
}
