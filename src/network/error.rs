//! Common error types for network operations

use core::fmt;

/// A common error type for network operations.
///
/// This enum defines a set of common errors that can occur when working with
/// network devices. It is designed to be simple and portable for `no_std`
/// environments.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on a connection that is not open.
    NotOpen,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// A connection attempt was refused.
    ConnectionRefused,
    /// The peer rejected the supplied credentials.
    Unauthorized,
    /// A timeout occurred.
    Timeout,
    /// The connection was closed.
    ConnectionClosed,
    /// An invalid address was provided.
    InvalidAddress,
    /// A protocol-specific error occurred.
    ProtocolError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Error::NotOpen => "connection is not open",
            Error::WriteError => "write failed",
            Error::ReadError => "read failed",
            Error::ConnectionRefused => "connection refused",
            Error::Unauthorized => "credentials rejected",
            Error::Timeout => "timed out",
            Error::ConnectionClosed => "connection closed by peer",
            Error::InvalidAddress => "invalid address",
            Error::ProtocolError => "protocol error",
        };
        f.write_str(text)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            Error::Unauthorized => defmt::write!(f, "Unauthorized"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::InvalidAddress => defmt::write!(f, "InvalidAddress"),
            Error::ProtocolError => defmt::write!(f, "ProtocolError"),
        }
    }
}

/// Transport errors that can be expressed as an [`Error`].
///
/// Protocol clients use it to tell a peer that closed the stream
/// ([`Error::ConnectionClosed`]) from other read failures.
pub trait TransportError: fmt::Debug {
    /// The common error this one corresponds to.
    fn kind(&self) -> Error;
}

impl TransportError for Error {
    fn kind(&self) -> Error {
        *self
    }
}
