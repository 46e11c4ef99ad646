//! Plain transport abstraction
//!
//! The strategy secures any connected, not yet used byte stream that can be
//! closed and given an I/O timeout.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::unix::net::UnixStream;
use std::time::Duration;

/// Connected bidirectional byte stream
pub trait Transport: Read + Write + Send {
    /// Shut the stream down in both directions
    fn close(&self) -> io::Result<()>;

    /// Current read and write timeouts
    fn io_timeouts(&self) -> io::Result<(Option<Duration>, Option<Duration>)>;

    /// Set read and write timeouts separately
    fn set_io_timeouts(&self, read: Option<Duration>, write: Option<Duration>) -> io::Result<()>;

    /// Set both read and write timeouts
    fn set_io_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_io_timeouts(timeout, timeout)
    }
}

impl Transport for TcpStream {
    fn close(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }

    fn io_timeouts(&self) -> io::Result<(Option<Duration>, Option<Duration>)> {
        Ok((self.read_timeout()?, self.write_timeout()?))
    }

    fn set_io_timeouts(&self, read: Option<Duration>, write: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(read)?;
        self.set_write_timeout(write)
    }
}

impl Transport for UnixStream {
    fn close(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }

    fn io_timeouts(&self) -> io::Result<(Option<Duration>, Option<Duration>)> {
        Ok((self.read_timeout()?, self.write_timeout()?))
    }

    fn set_io_timeouts(&self, read: Option<Duration>, write: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(read)?;
        self.set_write_timeout(write)
    }
}

/// Close `transport`, ignoring a peer that already went away
pub(crate) fn close_quietly<S: Transport>(transport: &S) {
    if let Err(e) = transport.close() {
        if e.kind() != io::ErrorKind::NotConnected {
            log::debug!("error closing transport: {}", e);
        }
    }
}
