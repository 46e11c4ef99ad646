//! Test certificate for unit tests
//!
//! Self-signed `CN=localhost` certificate with SAN `DNS:localhost, IP:127.0.0.1`,
//! followed by its RSA private key.

pub const LOCALHOST_PEM: &str = include_str!("../../tests/data/localhost.pem");
