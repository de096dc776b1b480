//! Error taxonomy shared by the REST client and the messaging session.

use crate::network::error::Error as NetworkError;
use core::fmt;

/// Why a request was rejected as malformed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Invalid {
    /// A feed or group key does not follow the key grammar.
    Key,
    /// A name passed to a create call uses characters outside `a-z`, `0-9`, `-`.
    Name,
    /// A data value is empty or too long to encode.
    Value,
    /// A topic could not be built or is not one the codec understands.
    Topic,
    /// A requested item count is out of range.
    Count,
    /// Something did not fit a fixed-size buffer.
    Capacity,
    /// The service rejected the request with this 4xx status.
    Rejected(u16),
}

/// Errors surfaced by [`RestClient`](super::RestClient) and
/// [`Session`](super::Session) operations.
///
/// Each variant documents whether retrying makes sense; see
/// [`RetryPolicy`](super::RetryPolicy) for a ready-made backoff calculation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// Credentials are missing or wrong. Fatal, do not retry.
    Auth,
    /// The feed, group or data point does not exist.
    NotFound,
    /// The request was malformed. Fatal for that call.
    Validation(Invalid),
    /// The rate limit is exhausted. Back off at least `retry_after_ms`.
    Throttle {
        /// Milliseconds until the service is expected to accept requests again.
        retry_after_ms: u32,
    },
    /// The service failed transiently. Safe to retry with backoff.
    Server {
        /// HTTP status returned by the service.
        status: u16,
    },
    /// The transport could not be opened, or the handshake or exchange failed.
    Connect(NetworkError),
    /// The session is not in a state that allows the operation.
    NotConnected,
    /// A response body could not be decoded.
    Decode,
}

impl Error {
    /// Whether the same call may succeed if repeated later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Throttle { .. } | Error::Server { .. } | Error::Connect(_)
        )
    }

    /// Map a non-success HTTP status onto the taxonomy.
    pub(crate) fn from_status(status: u16, retry_after_ms: u32) -> Self {
        match status {
            401 | 403 => Error::Auth,
            404 => Error::NotFound,
            429 => Error::Throttle { retry_after_ms },
            500..=599 => Error::Server { status },
            _ => Error::Validation(Invalid::Rejected(status)),
        }
    }
}

impl From<NetworkError> for Error {
    fn from(error: NetworkError) -> Self {
        match error {
            NetworkError::Unauthorized => Error::Auth,
            other => Error::Connect(other),
        }
    }
}

impl fmt::Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invalid::Key => f.write_str("malformed key"),
            Invalid::Name => f.write_str("malformed name"),
            Invalid::Value => f.write_str("value cannot be encoded"),
            Invalid::Topic => f.write_str("malformed topic"),
            Invalid::Count => f.write_str("count out of range"),
            Invalid::Capacity => f.write_str("exceeds buffer capacity"),
            Invalid::Rejected(status) => write!(f, "rejected with status {status}"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Auth => f.write_str("authentication failed"),
            Error::NotFound => f.write_str("not found"),
            Error::Validation(reason) => write!(f, "invalid request: {reason}"),
            Error::Throttle { retry_after_ms } => {
                write!(f, "rate limited, retry in {retry_after_ms} ms")
            }
            Error::Server { status } => write!(f, "server error {status}"),
            Error::Connect(e) => write!(f, "connection failed: {e}"),
            Error::NotConnected => f.write_str("session not connected"),
            Error::Decode => f.write_str("malformed response"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Invalid {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Invalid::Key => defmt::write!(f, "Key"),
            Invalid::Name => defmt::write!(f, "Name"),
            Invalid::Value => defmt::write!(f, "Value"),
            Invalid::Topic => defmt::write!(f, "Topic"),
            Invalid::Count => defmt::write!(f, "Count"),
            Invalid::Capacity => defmt::write!(f, "Capacity"),
            Invalid::Rejected(status) => defmt::write!(f, "Rejected({})", status),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Auth => defmt::write!(f, "Auth"),
            Error::NotFound => defmt::write!(f, "NotFound"),
            Error::Validation(reason) => defmt::write!(f, "Validation({})", reason),
            Error::Throttle { retry_after_ms } => {
                defmt::write!(f, "Throttle({} ms)", retry_after_ms)
            }
            Error::Server { status } => defmt::write!(f, "Server({})", status),
            Error::Connect(e) => defmt::write!(f, "Connect({})", e),
            Error::NotConnected => defmt::write!(f, "NotConnected"),
            Error::Decode => defmt::write!(f, "Decode"),
        }
    }
}
