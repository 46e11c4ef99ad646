//! Client-side TLS upgrade
//!
//! This module turns an already connected plain transport into an encrypted,
//! identity-verified session using OpenSSL.
//!
//! # Architecture
//!
//! 1. `TlsEngineConfig` fixes protocols, cipher suites, trust material and ALPN
//! 2. `HostnameVerificationPolicy` decides whether the engine (`Builtin`) or a
//!    `HostnameVerifier` after the handshake (`Client`) checks the peer identity
//! 3. `TlsUpgradeStrategy::upgrade` runs the handshake and returns a
//!    `SecuredSession`, or closes the transport and returns a `TlsError`
//!
//! # Examples
//!
//! ```no_run
//! use tls_strategy::tls::{ConnectionContext, TlsEngineConfig, TlsUpgradeStrategy, TlsVersion};
//! use std::io::Write;
//! use std::net::TcpStream;
//! use std::time::Duration;
//!
//! let config = TlsEngineConfig::builder()
//!     .version_range(TlsVersion::Tls12, TlsVersion::Tls13)
//!     .alpn(&["http/1.1"])
//!     .build()
//!     .unwrap();
//! let strategy = TlsUpgradeStrategy::new(config);
//!
//! let tcp_stream = TcpStream::connect("example.com:443").unwrap();
//! let mut ctx = ConnectionContext::new();
//! let mut session = strategy
//!     .upgrade(tcp_stream, "example.com", 443, Some(Duration::from_secs(10)), &mut ctx)
//!     .unwrap();
//! session.write_all(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n").unwrap();
//! ```

pub mod cert;
pub mod cipher;
pub mod config;
pub mod context;
pub mod error;
mod handshake;
pub mod policy;
pub mod session;
pub mod strategy;
pub mod transport;
pub mod trust;
pub mod verifier;

#[cfg(test)]
mod testdata;

pub use cert::{CertInfo, SubjectAltName};
pub use config::{TlsEngineConfig, TlsEngineConfigBuilder, TlsVersion};
pub use context::{ConnectionContext, SessionContext};
pub use error::TlsError;
pub use policy::{HostnameVerificationPolicy, IdentityCheck};
pub use session::{SecuredSession, TlsDetails};
pub use strategy::TlsUpgradeStrategy;
pub use transport::Transport;
pub use trust::{TrustAll, TrustEvaluator, TrustSelfSigned};
pub use verifier::{DefaultHostnameVerifier, HostnameVerifier, NoopHostnameVerifier};

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;
