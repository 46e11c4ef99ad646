//! TLS upgrade errors
//!
//! Every per-call failure is fail-closed: by the time one of these reaches
//! the caller the underlying transport has already been shut down.

use std::io;
use std::time::Duration;

/// TLS upgrade errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    /// I/O failure on the underlying transport while securing it
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// The TLS engine refused to complete the handshake
    #[error("TLS handshake with {host} failed: {reason}")]
    Handshake { host: String, reason: String },

    /// The handshake did not finish before the deadline
    #[error("TLS handshake with {host} timed out{}", display_timeout(.timeout))]
    Timeout {
        host: String,
        timeout: Option<Duration>,
    },

    /// Handshake succeeded but the peer identity does not match the target
    #[error(
        "certificate for <{host}> doesn't match any of the subject alternative names: [{}] (peer: {principal})",
        join_names(.subject_alt_names)
    )]
    IdentityVerification {
        host: String,
        principal: String,
        subject_alt_names: Vec<String>,
    },

    /// Invalid engine configuration, detected when the strategy is built
    #[error("invalid TLS configuration: {0}")]
    Configuration(String),
}

fn join_names(names: &[String]) -> String {
    names.join(", ")
}

fn display_timeout(timeout: &Option<Duration>) -> String {
    match timeout {
        Some(t) => format!(" after {:?}", t),
        None => String::new(),
    }
}

impl TlsError {
    pub(crate) fn handshake(host: &str, reason: impl Into<String>) -> Self {
        TlsError::Handshake {
            host: host.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        TlsError::Configuration(msg.into())
    }

    /// True for [`TlsError::Timeout`]
    pub fn is_timeout(&self) -> bool {
        matches!(self, TlsError::Timeout { .. })
    }

    /// True when the peer could not be secured or authenticated, as opposed
    /// to a plain transport failure
    pub fn is_handshake_failure(&self) -> bool {
        matches!(
            self,
            TlsError::Handshake { .. } | TlsError::IdentityVerification { .. }
        )
    }
}
