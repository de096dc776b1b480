//! Client configuration.
//!
//! Where the values come from (flash, a `.env` file, a provisioning step) is
//! up to the integrator; this type only holds and checks them.

use super::error::{Error, Invalid};
use super::retry::RetryPolicy;
use super::validate;
use crate::network::Remote;
use heapless::String;

/// Default service host for both transports.
pub const DEFAULT_HOST: &str = "io.adafruit.com";
/// HTTPS port.
pub const DEFAULT_HTTP_PORT: u16 = 443;
/// MQTT-over-TLS port.
pub const DEFAULT_MQTT_PORT: u16 = 8883;
/// Keep-alive interval announced to the broker.
pub const DEFAULT_KEEP_ALIVE_SECS: u16 = 60;

/// Longest host name.
pub const MAX_HOST_LEN: usize = 64;
/// Longest account user name.
pub const MAX_USERNAME_LEN: usize = 64;
/// Longest API key.
pub const MAX_API_KEY_LEN: usize = 64;
/// Longest MQTT client identifier.
pub const MAX_CLIENT_ID_LEN: usize = 64;

/// One network endpoint of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name.
    pub host: String<MAX_HOST_LEN>,
    /// TCP port.
    pub port: u16,
    /// Whether the connection is wrapped in TLS.
    pub tls: bool,
}

impl Endpoint {
    /// Build an endpoint, failing if the host does not fit.
    pub fn new(host: &str, port: u16, tls: bool) -> Result<Self, Error> {
        if host.is_empty() {
            return Err(Error::Validation(Invalid::Key));
        }
        Ok(Self {
            host: String::try_from(host).map_err(|_| Error::Validation(Invalid::Capacity))?,
            port,
            tls,
        })
    }

    /// The address handed to [`Connect::connect`](crate::network::Connect::connect).
    pub fn remote(&self) -> Remote<'_> {
        Remote {
            host: &self.host,
            port: self.port,
            tls: self.tls,
        }
    }
}

/// Credentials, endpoints and session tuning.
///
/// ```rust
/// use feedlink::cloud::{Config, RetryPolicy};
///
/// let config = Config::new("adabot", "aio_0123456789abcdef")
///     .unwrap()
///     .with_keep_alive(30)
///     .with_reconnect(RetryPolicy::Linear { delay_ms: 2_000, max_retry: 10 });
///
/// assert_eq!(config.mqtt.port, 8883);
/// assert_eq!(config.keep_alive_secs, 30);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    /// Account user name. First level of every topic and REST path.
    pub username: String<MAX_USERNAME_LEN>,
    /// API key, sent as `X-AIO-Key` and as the MQTT password.
    pub key: String<MAX_API_KEY_LEN>,
    /// REST endpoint.
    pub http: Endpoint,
    /// MQTT endpoint.
    pub mqtt: Endpoint,
    /// MQTT client identifier. Empty lets the broker assign one.
    pub client_id: String<MAX_CLIENT_ID_LEN>,
    /// Keep-alive interval in seconds; 0 disables keep-alive.
    pub keep_alive_secs: u16,
    /// Backoff for [`Session::connect`](super::Session::connect).
    pub connect_retry: RetryPolicy,
    /// Backoff for automatic reconnection after a dropped transport.
    pub reconnect: RetryPolicy,
    /// How long to wait for CONNACK, SUBACK and UNSUBACK.
    pub ack_timeout_ms: u32,
    /// How long a REST read may wait for the server.
    pub request_timeout_ms: u32,
}

impl core::fmt::Debug for Config {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Config")
            .field("username", &self.username)
            .field("http", &self.http)
            .field("mqtt", &self.mqtt)
            .field("client_id", &self.client_id)
            .field("keep_alive_secs", &self.keep_alive_secs)
            .field("connect_retry", &self.connect_retry)
            .field("reconnect", &self.reconnect)
            .field("ack_timeout_ms", &self.ack_timeout_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Configuration for the public service with the given credentials.
    ///
    /// # Errors
    ///
    /// * [`Error::Auth`] - user name or key is empty, or the user name
    ///   contains characters that cannot appear in a topic or path
    /// * [`Error::Validation`] - a credential exceeds its capacity
    pub fn new(username: &str, key: &str) -> Result<Self, Error> {
        if !validate::user(username) || key.is_empty() {
            return Err(Error::Auth);
        }
        Ok(Self {
            username: String::try_from(username)
                .map_err(|_| Error::Validation(Invalid::Capacity))?,
            key: String::try_from(key).map_err(|_| Error::Validation(Invalid::Capacity))?,
            http: Endpoint::new(DEFAULT_HOST, DEFAULT_HTTP_PORT, true)?,
            mqtt: Endpoint::new(DEFAULT_HOST, DEFAULT_MQTT_PORT, true)?,
            client_id: String::new(),
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            connect_retry: RetryPolicy::Exponential {
                min_delay_ms: 1_000,
                max_delay_ms: 4_000,
                max_retry: 2,
            },
            reconnect: RetryPolicy::default(),
            ack_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
        })
    }

    /// Point REST calls at another endpoint.
    pub fn with_http(mut self, host: &str, port: u16, tls: bool) -> Result<Self, Error> {
        self.http = Endpoint::new(host, port, tls)?;
        Ok(self)
    }

    /// Point the messaging session at another broker.
    pub fn with_mqtt(mut self, host: &str, port: u16, tls: bool) -> Result<Self, Error> {
        self.mqtt = Endpoint::new(host, port, tls)?;
        Ok(self)
    }

    /// Use a fixed MQTT client identifier.
    pub fn with_client_id(mut self, client_id: &str) -> Result<Self, Error> {
        self.client_id =
            String::try_from(client_id).map_err(|_| Error::Validation(Invalid::Capacity))?;
        Ok(self)
    }

    /// Change the keep-alive interval.
    pub fn with_keep_alive(mut self, seconds: u16) -> Self {
        self.keep_alive_secs = seconds;
        self
    }

    /// Change the backoff used by an explicit connect.
    pub fn with_connect_retry(mut self, policy: RetryPolicy) -> Self {
        self.connect_retry = policy;
        self
    }

    /// Change the backoff used after a dropped transport.
    pub fn with_reconnect(mut self, policy: RetryPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Change the acknowledgement timeout.
    pub fn with_ack_timeout(mut self, ms: u32) -> Self {
        self.ack_timeout_ms = ms;
        self
    }

    /// Change the REST read timeout.
    pub fn with_request_timeout(mut self, ms: u32) -> Self {
        self.request_timeout_ms = ms;
        self
    }
}
