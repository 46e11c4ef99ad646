//! Throwaway TLS server for integration tests
//!
//! Each server accepts a single TCP connection on 127.0.0.1, runs the server
//! side of the handshake and echoes whatever the client sends until EOF.

#![allow(dead_code)]

use openssl::pkey::PKey;
use openssl::ssl::{AlpnError, Ssl, SslContext, SslContextBuilder, SslMethod, SslVerifyMode, SslVersion};
use openssl::x509::X509;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

/// Self-signed `CN=localhost` certificate followed by its key
pub const LOCALHOST_PEM: &str = include_str!("../data/localhost.pem");

/// Server side settings
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    versions: Option<(SslVersion, SslVersion)>,
    cipher_list: Option<String>,
    security_level: Option<u32>,
    alpn: Vec<&'static str>,
    require_client_cert: bool,
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single TLS version (both min and max)
    pub fn version(mut self, version: SslVersion) -> Self {
        self.versions = Some((version, version));
        self
    }

    pub fn cipher_list(mut self, ciphers: &str) -> Self {
        self.cipher_list = Some(ciphers.to_string());
        self
    }

    /// Allow legacy algorithms the engine refuses at its default level
    pub fn security_level(mut self, level: u32) -> Self {
        self.security_level = Some(level);
        self
    }

    pub fn alpn(mut self, protocols: &[&'static str]) -> Self {
        self.alpn = protocols.to_vec();
        self
    }

    /// Require a client certificate issued by the test certificate
    pub fn require_client_cert(mut self) -> Self {
        self.require_client_cert = true;
        self
    }

    fn build(&self) -> Result<SslContext, openssl::error::ErrorStack> {
        let mut ctx_builder = SslContextBuilder::new(SslMethod::tls_server())?;

        if let Some(level) = self.security_level {
            ctx_builder.set_security_level(level);
        }
        if let Some((min, max)) = self.versions {
            ctx_builder.set_min_proto_version(Some(min))?;
            ctx_builder.set_max_proto_version(Some(max))?;
        }
        if let Some(ciphers) = &self.cipher_list {
            ctx_builder.set_cipher_list(ciphers)?;
        }

        let cert = X509::from_pem(LOCALHOST_PEM.as_bytes())?;
        let key = PKey::private_key_from_pem(LOCALHOST_PEM.as_bytes())?;
        ctx_builder.set_certificate(&cert)?;
        ctx_builder.set_private_key(&key)?;

        if !self.alpn.is_empty() {
            let protocols: Vec<Vec<u8>> = self.alpn.iter().map(|p| p.as_bytes().to_vec()).collect();
            ctx_builder.set_alpn_select_callback(move |_ssl, client_protos| {
                // Server preference order over the length-prefixed client list
                for proto in &protocols {
                    let mut pos = 0;
                    while pos < client_protos.len() {
                        let len = client_protos[pos] as usize;
                        let start = pos + 1;
                        if start + len > client_protos.len() {
                            break;
                        }
                        let client_proto = &client_protos[start..start + len];
                        if client_proto == proto.as_slice() {
                            return Ok(client_proto);
                        }
                        pos = start + len;
                    }
                }
                Err(AlpnError::NOACK)
            });
        }

        if self.require_client_cert {
            ctx_builder.cert_store_mut().add_cert(cert)?;
            ctx_builder.set_verify(SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT);
        }

        Ok(ctx_builder.build())
    }
}

/// One-shot TLS echo server
pub struct TestServer {
    pub addr: SocketAddr,
    handle: JoinHandle<bool>,
}

impl TestServer {
    /// Start serving a single connection; a server whose settings the engine
    /// refuses just drops the connection
    pub fn start(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = thread::spawn(move || {
            let (stream, _) = match listener.accept() {
                Ok(conn) => conn,
                Err(_) => return false,
            };
            let ctx = match config.build() {
                Ok(ctx) => ctx,
                Err(_) => return false,
            };
            let ssl = match Ssl::new(&ctx) {
                Ok(ssl) => ssl,
                Err(_) => return false,
            };
            let mut tls = match ssl.accept(stream) {
                Ok(tls) => tls,
                Err(_) => return false,
            };

            let mut buf = [0u8; 1024];
            loop {
                match tls.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tls.write_all(&buf[..n]).is_err() {
                            break;
                        }
                    }
                }
            }
            true
        });

        TestServer { addr, handle }
    }

    /// Connect a plain TCP stream to the server
    pub fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).unwrap()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Wait for the server; true if its handshake completed
    pub fn join(self) -> bool {
        self.handle.join().unwrap()
    }
}
