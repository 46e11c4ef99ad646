//! tls-strategy - client-side TLS session establishment
//!
//! This crate secures already connected byte streams: it runs the TLS
//! handshake with OpenSSL, enforces protocol and cipher policy, validates the
//! peer chain and checks the peer identity against the requested host.

pub mod tls;

pub use tls::{
    ConnectionContext, HostnameVerificationPolicy, HostnameVerifier, SecuredSession, TlsEngineConfig,
    TlsError, TlsUpgradeStrategy, TlsVersion, TrustEvaluator,
};
