//! Hostname verification policy
//!
//! Decides *when* the peer identity is checked relative to the handshake.
//! The policy is fixed when a strategy is built and is consulted at exactly
//! two points of every upgrade: when the engine session is prepared and once
//! the handshake has completed.

use super::cert::CertInfo;
use super::error::TlsError;
use super::verifier::{host_ip, HostnameVerifier};
use openssl::ssl::SslRef;
use openssl::x509::verify::X509CheckFlags;
use std::fmt;
use std::str::FromStr;

/// Where hostname verification happens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HostnameVerificationPolicy {
    /// Checked by the TLS engine during certificate validation; a mismatch
    /// aborts the handshake.
    #[default]
    Builtin,
    /// Checked by the strategy with its [`HostnameVerifier`] once the
    /// handshake has completed.
    Client,
}

/// How the identity of a secured session was established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityCheck {
    /// Accepted by the engine's own check during the handshake
    Engine,
    /// Accepted by the configured hostname verifier after the handshake
    Verifier,
}

impl HostnameVerificationPolicy {
    /// Arm the engine-side check on a fresh session (`Builtin` only)
    pub(crate) fn prepare(&self, ssl: &mut SslRef, host: &str) -> Result<(), TlsError> {
        match self {
            HostnameVerificationPolicy::Builtin => {
                let param = ssl.param_mut();
                param.set_hostflags(X509CheckFlags::NO_PARTIAL_WILDCARDS);
                let armed = match host_ip(host) {
                    Some(ip) => param.set_ip(ip),
                    None => param.set_host(host),
                };
                armed.map_err(|e| {
                    TlsError::handshake(host, format!("cannot bind identity check: {}", e))
                })
            }
            HostnameVerificationPolicy::Client => Ok(()),
        }
    }

    /// Confirm the peer identity of a completed handshake
    ///
    /// `Builtin` trusts the engine's outcome. `Client` runs `verifier` once
    /// against the leaf certificate.
    pub(crate) fn confirm(
        &self,
        verifier: &dyn HostnameVerifier,
        host: &str,
        leaf: Option<&CertInfo>,
    ) -> Result<IdentityCheck, TlsError> {
        match self {
            HostnameVerificationPolicy::Builtin => Ok(IdentityCheck::Engine),
            HostnameVerificationPolicy::Client => {
                let Some(leaf) = leaf else {
                    return Err(TlsError::IdentityVerification {
                        host: host.to_string(),
                        principal: "<none>".to_string(),
                        subject_alt_names: Vec::new(),
                    });
                };
                if verifier.verify(host, leaf) {
                    Ok(IdentityCheck::Verifier)
                } else {
                    Err(TlsError::IdentityVerification {
                        host: host.to_string(),
                        principal: leaf.subject.clone(),
                        subject_alt_names: leaf.subject_alt_name_strings(),
                    })
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HostnameVerificationPolicy::Builtin => "BUILTIN",
            HostnameVerificationPolicy::Client => "CLIENT",
        }
    }
}

impl FromStr for HostnameVerificationPolicy {
    type Err = TlsError;

    fn from_str(s: &str) -> Result<Self, TlsError> {
        match s.to_ascii_uppercase().as_str() {
            "BUILTIN" => Ok(HostnameVerificationPolicy::Builtin),
            "CLIENT" => Ok(HostnameVerificationPolicy::Client),
            _ => Err(TlsError::config(format!(
                "invalid hostname verification policy: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for HostnameVerificationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
