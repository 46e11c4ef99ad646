//! Pluggable trust evaluation
//!
//! A [`TrustEvaluator`] gets a say only when the engine's own chain
//! validation reports an error. It can accept a chain the trust store would
//! reject, but it can never override a host or IP mismatch found by the
//! engine's built-in hostname check.

use openssl::pkey::Id;
use openssl::ssl::{SslContextBuilder, SslVerifyMode};
use openssl::x509::{X509Ref, X509StoreContextRef, X509};
use std::sync::Arc;

// From x509_vfy.h; these are raised by the built-in identity check.
const X509_V_ERR_HOSTNAME_MISMATCH: i32 = 62;
const X509_V_ERR_EMAIL_MISMATCH: i32 = 63;
const X509_V_ERR_IP_ADDRESS_MISMATCH: i32 = 64;

/// Decides whether a presented certificate chain is trusted
///
/// `chain` is leaf first. `auth_type` is the key algorithm of the leaf
/// (`"RSA"`, `"EC"`, `"Ed25519"`, `"Ed448"`, `"DSA"` or `"UNKNOWN"`).
pub trait TrustEvaluator: Send + Sync {
    fn is_trusted(&self, chain: &[X509], auth_type: &str) -> bool;
}

impl<F> TrustEvaluator for F
where
    F: Fn(&[X509], &str) -> bool + Send + Sync,
{
    fn is_trusted(&self, chain: &[X509], auth_type: &str) -> bool {
        self(chain, auth_type)
    }
}

/// Trusts every chain. Only meant for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustAll;

impl TrustEvaluator for TrustAll {
    fn is_trusted(&self, _chain: &[X509], _auth_type: &str) -> bool {
        true
    }
}

/// Trusts a chain consisting of a single self-issued certificate
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustSelfSigned;

impl TrustEvaluator for TrustSelfSigned {
    fn is_trusted(&self, chain: &[X509], _auth_type: &str) -> bool {
        match chain {
            [leaf] => leaf.issued(leaf).as_raw() == 0,
            _ => false,
        }
    }
}

/// Key algorithm of a certificate, as reported to evaluators
pub fn auth_type(cert: &X509Ref) -> &'static str {
    let Ok(id) = cert.public_key().map(|key| key.id()) else {
        return "UNKNOWN";
    };
    [
        (Id::RSA, "RSA"),
        (Id::EC, "EC"),
        (Id::ED25519, "Ed25519"),
        (Id::ED448, "Ed448"),
        (Id::DSA, "DSA"),
    ]
    .into_iter()
    .find(|(known, _)| *known == id)
    .map_or("UNKNOWN", |(_, name)| name)
}

/// Install `evaluator` as the verify callback of a client context
pub(crate) fn install(ctx_builder: &mut SslContextBuilder, evaluator: Arc<dyn TrustEvaluator>) {
    ctx_builder.set_verify_callback(SslVerifyMode::PEER, move |preverify_ok, store_ctx| {
        preverify_ok || evaluate(evaluator.as_ref(), store_ctx)
    });
}

fn evaluate(evaluator: &dyn TrustEvaluator, store_ctx: &X509StoreContextRef) -> bool {
    let error = store_ctx.error();
    if is_identity_error(error.as_raw()) {
        return false;
    }

    let chain: Vec<X509> = match store_ctx.chain() {
        Some(chain) => chain.iter().map(|cert| cert.to_owned()).collect(),
        None => store_ctx.current_cert().map(|cert| cert.to_owned()).into_iter().collect(),
    };
    let Some(leaf) = chain.first() else {
        return false;
    };

    let trusted = evaluator.is_trusted(&chain, auth_type(leaf));
    if trusted {
        log::debug!(
            "trust evaluator accepted chain of {} certificate(s) despite: {}",
            chain.len(),
            error.error_string()
        );
    }
    trusted
}

fn is_identity_error(code: i32) -> bool {
    matches!(
        code,
        X509_V_ERR_HOSTNAME_MISMATCH | X509_V_ERR_EMAIL_MISMATCH | X509_V_ERR_IP_ADDRESS_MISMATCH
    )
}
