//! TLS handshake logic
//!
//! Drives the blocking client handshake under an overall deadline and turns
//! engine failures into [`TlsError`] kinds.

use super::error::TlsError;
use super::transport::Transport;
use openssl::ssl::{ErrorCode, SslStream};
use openssl::x509::X509VerifyResult;
use std::io;
use std::time::{Duration, Instant};

/// Run the handshake to completion or failure
///
/// With a `timeout`, the transport's I/O timeout is shrunk to whatever is
/// left of the deadline before every attempt; the caller restores it.
pub(crate) fn connect<S: Transport>(
    stream: &mut SslStream<S>,
    host: &str,
    timeout: Option<Duration>,
) -> Result<(), TlsError> {
    let deadline = timeout.map(|t| Instant::now() + t);

    loop {
        if let Some(deadline) = deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out(host, timeout));
            }
            stream.get_ref().set_io_timeout(Some(remaining))?;
        }

        let err = match stream.connect() {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        // A read or write hit the per-attempt timeout; retry until the deadline
        if deadline.is_some() && would_block(&err) {
            continue;
        }

        return Err(classify(err, stream.ssl().verify_result(), host, timeout));
    }
}

fn would_block(err: &openssl::ssl::Error) -> bool {
    wants_io(err.code()) || err.io_error().is_some_and(is_timeout)
}

fn wants_io(code: ErrorCode) -> bool {
    code == ErrorCode::WANT_READ || code == ErrorCode::WANT_WRITE
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

fn timed_out(host: &str, timeout: Option<Duration>) -> TlsError {
    TlsError::Timeout {
        host: host.to_string(),
        timeout,
    }
}

/// Map an engine error to the error kind callers act on
pub(crate) fn classify(
    err: openssl::ssl::Error,
    verify: X509VerifyResult,
    host: &str,
    timeout: Option<Duration>,
) -> TlsError {
    if wants_io(err.code()) {
        return timed_out(host, timeout);
    }

    let err = match err.into_io_error() {
        Ok(io_err) if is_timeout(&io_err) => return timed_out(host, timeout),
        Ok(io_err) => return TlsError::Transport(io_err),
        Err(err) => err,
    };

    if verify != X509VerifyResult::OK {
        return TlsError::handshake(
            host,
            format!("certificate verify failed: {}", verify.error_string()),
        );
    }

    let code = err.code();
    if code == ErrorCode::SYSCALL || code == ErrorCode::ZERO_RETURN {
        TlsError::handshake(host, "peer closed connection during handshake")
    } else {
        TlsError::handshake(host, err.to_string())
    }
}
