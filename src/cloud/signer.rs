//! Turns a logical REST operation into a fully addressed, authenticated request.

use super::config::Config;
use super::error::{Error, Invalid};
use crate::network::application::http::client::MAX_HEADERS;
use crate::network::application::http::{Header, Method, Request};
use core::fmt::Write as _;
use heapless::{String, Vec};

/// Longest request path, including the `/api/v2/<user>/` prefix.
pub const MAX_PATH_LEN: usize = 256;

const USER_AGENT: &str = concat!("feedlink/", env!("CARGO_PKG_VERSION"));

/// A request ready to hand to the HTTP client.
#[derive(Debug)]
pub struct SignedRequest<'b> {
    /// Request method.
    pub method: Method,
    /// Absolute path on the service host.
    pub path: String<MAX_PATH_LEN>,
    /// Host, authentication and content headers.
    pub headers: Vec<Header, MAX_HEADERS>,
    /// JSON body, if any.
    pub body: Option<&'b [u8]>,
}

impl<'b> SignedRequest<'b> {
    /// Borrow as an HTTP [`Request`].
    pub fn request(&self) -> Request<'_> {
        Request {
            method: self.method,
            path: &self.path,
            headers: self.headers.clone(),
            body: self.body,
        }
    }

    /// Value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// Address `path` (relative to the account, e.g. `feeds/temp/data`) on the
/// configured service and attach credentials.
///
/// Pure: no I/O, no clock, no state.
pub fn sign<'b>(
    config: &Config,
    method: Method,
    path: &str,
    body: Option<&'b [u8]>,
) -> Result<SignedRequest<'b>, Error> {
    let mut full_path: String<MAX_PATH_LEN> = String::new();
    write!(full_path, "/api/v2/{}/{}", config.username, path)
        .map_err(|_| Error::Validation(Invalid::Capacity))?;
    sign_absolute(config, method, &full_path, body)
}

/// Like [`sign`], for endpoints outside the account scope (`/api/v2/user`).
pub fn sign_absolute<'b>(
    config: &Config,
    method: Method,
    path: &str,
    body: Option<&'b [u8]>,
) -> Result<SignedRequest<'b>, Error> {
    let full_path: String<MAX_PATH_LEN> =
        String::try_from(path).map_err(|_| Error::Validation(Invalid::Capacity))?;

    let mut headers: Vec<Header, MAX_HEADERS> = Vec::new();
    let mut add = |name: &str, value: &str| -> Result<(), Error> {
        let header = Header::new(name, value).map_err(|_| Error::Validation(Invalid::Capacity))?;
        headers
            .push(header)
            .map_err(|_| Error::Validation(Invalid::Capacity))
    };

    add("Host", &config.http.host)?;
    add("X-AIO-Key", &config.key)?;
    if body.is_some() {
        add("Content-Type", "application/json")?;
    }
    add("Accept", "application/json")?;
    add("User-Agent", USER_AGENT)?;
    add("Connection", "close")?;

    Ok(SignedRequest {
        method,
        path: full_path,
        headers,
        body,
    })
}
