//! A network abstraction layer for embedded systems
//!
//! The traits in this module are the only contact point between this crate and
//! the device's socket or TLS stack. Integrators implement them for whatever
//! transport the board provides (smoltcp sockets, an AT-command modem, a
//! `std::net::TcpStream` on Linux) and the protocol clients in
//! [`application`] work on top of them unchanged.
//!

#![allow(missing_docs)]
#![deny(unsafe_code)]

/// Common error types for network operations
pub mod error;

/// Application layer protocols (HTTP, MQTT)
pub mod application;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Connect, Connection, Read, Remote, Write};
}

/// Reading half of a byte stream.
///
/// `Ok(0)` only ever means "nothing available yet". A stream the peer has
/// closed must report an error whose [`kind`](error::TransportError::kind)
/// is [`error::Error::ConnectionClosed`], on this and every later read;
/// otherwise a closed MQTT socket is indistinguishable from a quiet one.
pub trait Read {
    /// Associated error type
    type Error: error::TransportError;

    /// Read data from the connection.
    ///
    /// Returns `Ok(0)` when no data is currently available.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Read data, waiting at most `timeout_ms` for the first byte to arrive.
    ///
    /// Returns `Ok(0)` if nothing arrived within the wait. Transports that
    /// cannot bound the wait may keep the default, which performs a single
    /// [`read`](Read::read).
    fn read_timeout(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error> {
        let _ = timeout_ms;
        self.read(buf)
    }
}

/// Writing half of a byte stream.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write data to the connection
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Flush the write buffer
    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Write the whole buffer, retrying short writes.
    fn write_all(&mut self, mut buf: &[u8]) -> Result<(), error::Error> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => return Err(error::Error::WriteError),
                Ok(n) => buf = &buf[n..],
                Err(_) => return Err(error::Error::WriteError),
            }
        }
        Ok(())
    }
}

/// Releases the underlying transport.
pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Close the connection
    fn close(self) -> Result<(), Self::Error>;
}

/// A synchronous connection
pub trait Connection: Read + Write + Close {}

/// Where to open a connection to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remote<'a> {
    /// Host name or address literal.
    pub host: &'a str,
    /// TCP port.
    pub port: u16,
    /// Whether the stream must be wrapped in TLS.
    pub tls: bool,
}

/// A synchronous connector (client)
pub trait Connect {
    /// Associated connection type
    type Connection: Connection;
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Open a connection
    fn connect(&mut self, remote: &Remote<'_>) -> Result<Self::Connection, Self::Error>;
}
