//! TLS upgrade strategy
//!
//! Turns a connected plaintext transport into a verified, encrypted session
//! or fails closed. The engine configuration is shared read-only, so one
//! strategy can upgrade any number of transports concurrently.

use super::cipher;
use super::config::{TlsEngineConfig, TlsVersion};
use super::context::SessionContext;
use super::error::TlsError;
use super::handshake;
use super::policy::{HostnameVerificationPolicy, IdentityCheck};
use super::session::{abandon, SecuredSession, TlsDetails};
use super::transport::{close_quietly, Transport};
use super::verifier::{host_ip, DefaultHostnameVerifier, HostnameVerifier};
use openssl::ssl::{Ssl, SslStream};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Client-side TLS upgrade strategy
#[derive(Clone)]
pub struct TlsUpgradeStrategy {
    config: TlsEngineConfig,
    policy: HostnameVerificationPolicy,
    verifier: Arc<dyn HostnameVerifier>,
}

impl TlsUpgradeStrategy {
    /// Engine-side hostname verification with the default verifier
    pub fn new(config: TlsEngineConfig) -> Self {
        Self::with_policy(
            config,
            HostnameVerificationPolicy::Builtin,
            DefaultHostnameVerifier,
        )
    }

    /// Post-handshake hostname verification with `verifier`
    pub fn with_verifier<V: HostnameVerifier + 'static>(config: TlsEngineConfig, verifier: V) -> Self {
        Self::with_policy(config, HostnameVerificationPolicy::Client, verifier)
    }

    /// Explicit policy and verifier; the verifier only runs under `Client`
    pub fn with_policy<V: HostnameVerifier + 'static>(
        config: TlsEngineConfig,
        policy: HostnameVerificationPolicy,
        verifier: V,
    ) -> Self {
        TlsUpgradeStrategy {
            config,
            policy,
            verifier: Arc::new(verifier),
        }
    }

    /// Hostname verification policy fixed at construction
    pub fn policy(&self) -> HostnameVerificationPolicy {
        self.policy
    }

    /// Shared engine configuration
    pub fn config(&self) -> &TlsEngineConfig {
        &self.config
    }

    /// Secure `socket` for `host`
    ///
    /// `timeout` bounds the whole handshake; without one the configured
    /// handshake timeout applies, and without that the transport's own I/O
    /// timeouts. `context` receives the session metadata on success only.
    ///
    /// On every error the transport has been shut down before this returns.
    pub fn upgrade<S: Transport>(
        &self,
        socket: S,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
        context: &mut dyn SessionContext,
    ) -> Result<SecuredSession<S>, TlsError> {
        if host.is_empty() {
            close_quietly(&socket);
            return Err(TlsError::config("target host must not be empty"));
        }

        log::debug!("TLS upgrade to {}:{} ({} policy)", host, port, self.policy);

        let previous_timeouts = match socket.io_timeouts() {
            Ok(previous) => previous,
            Err(e) => {
                close_quietly(&socket);
                return Err(e.into());
            }
        };

        let ssl = match self.new_session(host) {
            Ok(ssl) => ssl,
            Err(e) => {
                close_quietly(&socket);
                return Err(e);
            }
        };

        // On failure the transport is dropped with the engine state
        let mut stream = SslStream::new(ssl, socket)
            .map_err(|e| TlsError::handshake(host, format!("cannot attach TLS session: {}", e)))?;

        match self.secure(&mut stream, host, timeout, previous_timeouts) {
            Ok((details, identity_check)) => {
                log::debug!(
                    "TLS established with {}:{}: {} {} (peer: {})",
                    host,
                    port,
                    details.version,
                    details.cipher,
                    details.peer_principal().unwrap_or("<none>")
                );
                context.set_tls_details(&details);
                if let Some(alpn) = &details.alpn {
                    context.set_application_protocol(alpn);
                }
                Ok(SecuredSession::new(stream, details, identity_check))
            }
            Err(e) => {
                log::debug!("TLS upgrade to {}:{} failed: {}", host, port, e);
                abandon(stream);
                Err(e)
            }
        }
    }

    /// Engine session bound to `host`: SNI for DNS names, identity check per policy
    fn new_session(&self, host: &str) -> Result<Ssl, TlsError> {
        let mut ssl = Ssl::new(&self.config.ctx)
            .map_err(|e| TlsError::handshake(host, format!("cannot create TLS session: {}", e)))?;

        if host_ip(host).is_none() {
            ssl.set_hostname(host)
                .map_err(|e| TlsError::handshake(host, format!("invalid SNI name: {}", e)))?;
        }

        self.policy.prepare(&mut ssl, host)?;
        Ok(ssl)
    }

    fn secure<S: Transport>(
        &self,
        stream: &mut SslStream<S>,
        host: &str,
        timeout: Option<Duration>,
        (read_timeout, write_timeout): (Option<Duration>, Option<Duration>),
    ) -> Result<(TlsDetails, IdentityCheck), TlsError> {
        handshake::connect(stream, host, timeout.or(self.config.handshake_timeout))?;
        stream.get_ref().set_io_timeouts(read_timeout, write_timeout)?;

        let ssl = stream.ssl();
        let version = ssl
            .version2()
            .and_then(TlsVersion::from_openssl_version)
            .ok_or_else(|| TlsError::handshake(host, "unknown protocol version negotiated"))?;
        if !self.config.allows(version) {
            return Err(TlsError::handshake(
                host,
                format!("negotiated protocol {} is not enabled", version),
            ));
        }

        let details = TlsDetails::from_ssl(ssl, version);
        if cipher::is_weak(&details.cipher) {
            return Err(TlsError::handshake(
                host,
                format!("negotiated weak cipher suite {}", details.cipher),
            ));
        }

        let identity_check = self
            .policy
            .confirm(self.verifier.as_ref(), host, details.peer_certificate())?;
        Ok((details, identity_check))
    }
}

impl fmt::Debug for TlsUpgradeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsUpgradeStrategy")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
