use crate::network::Connection;
use crate::network::error::{Error, TransportError};
use core::fmt::Write as _;
use heapless::{String, Vec};

/// Maximum number of headers carried by a request or kept from a response.
pub const MAX_HEADERS: usize = 16;
/// Longest header name kept.
pub const MAX_HEADER_NAME_LEN: usize = 64;
/// Longest header value kept.
pub const MAX_HEADER_VALUE_LEN: usize = 256;
/// Largest response body the client can hold.
pub const MAX_BODY_LEN: usize = 4096;

const MAX_HEAD_LEN: usize = 1024;
const RAW_LEN: usize = MAX_HEAD_LEN + MAX_BODY_LEN + 512;
const REQUEST_LEN: usize = 2048;
const DEFAULT_TIMEOUT_MS: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String<MAX_HEADER_NAME_LEN>,
    pub value: String<MAX_HEADER_VALUE_LEN>,
}

impl Header {
    /// Build a header, failing if either part exceeds its capacity.
    pub fn new(name: &str, value: &str) -> Result<Self, Error> {
        Ok(Self {
            name: String::try_from(name).map_err(|_| Error::ProtocolError)?,
            value: String::try_from(value).map_err(|_| Error::ProtocolError)?,
        })
    }
}

#[derive(Debug)]
pub struct Request<'a> {
    pub method: Method,
    pub path: &'a str,
    pub headers: Vec<Header, MAX_HEADERS>,
    pub body: Option<&'a [u8]>,
}

#[derive(Debug)]
pub struct Response {
    pub status_code: u16,
    pub headers: Vec<Header, MAX_HEADERS>,
    pub body: Vec<u8, MAX_BODY_LEN>,
}

impl Response {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

pub struct Client<C: Connection> {
    connection: C,
    timeout_ms: u32,
}

impl<C: Connection> core::fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

impl<C: Connection> Client<C> {
    pub fn new(connection: C) -> Self {
        Self {
            connection,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Set how long a single read may wait for the server.
    pub fn with_timeout(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Give the connection back, e.g. to close it.
    pub fn into_inner(self) -> C {
        self.connection
    }

    pub fn request(&mut self, request: &Request) -> Result<Response, Error> {
        // --- Build Request ---
        let mut request_buf: Vec<u8, REQUEST_LEN> = Vec::new();

        // Request line
        push(&mut request_buf, request.method.as_str().as_bytes())?;
        push(&mut request_buf, b" ")?;
        push(&mut request_buf, request.path.as_bytes())?;
        push(&mut request_buf, b" HTTP/1.1\r\n")?;

        // Headers
        let mut has_user_agent = false;
        for header in &request.headers {
            if header.name.eq_ignore_ascii_case("User-Agent") {
                has_user_agent = true;
            }
            push(&mut request_buf, header.name.as_bytes())?;
            push(&mut request_buf, b": ")?;
            push(&mut request_buf, header.value.as_bytes())?;
            push(&mut request_buf, b"\r\n")?;
        }

        if !has_user_agent {
            push(&mut request_buf, b"User-Agent:;\r\n")?;
        }

        // Body
        if let Some(body) = request.body {
            let mut len_str: String<10> = String::new();
            write!(len_str, "{}", body.len()).map_err(|_| Error::WriteError)?;

            push(&mut request_buf, b"Content-Length: ")?;
            push(&mut request_buf, len_str.as_bytes())?;
            push(&mut request_buf, b"\r\n\r\n")?;
            push(&mut request_buf, body)?;
        } else if request.method != Method::Get {
            push(&mut request_buf, b"Content-Length: 0\r\n\r\n")?;
        } else {
            push(&mut request_buf, b"\r\n")?;
        }

        // --- Send Request ---
        self.connection.write_all(&request_buf)?;
        self.connection.flush().map_err(|_| Error::WriteError)?;
        trace!(
            "http: sent {} {} ({} bytes)",
            request.method.as_str(),
            request.path,
            request_buf.len()
        );

        // --- Receive Response ---
        let mut raw: Vec<u8, RAW_LEN> = Vec::new();
        let header_end = loop {
            if let Some(pos) = find_slice(&raw, b"\r\n\r\n") {
                break pos;
            }
            if raw.len() >= MAX_HEAD_LEN {
                return Err(Error::ProtocolError);
            }
            if self.fill(&mut raw)? == 0 {
                return Err(if raw.is_empty() {
                    Error::ConnectionClosed
                } else {
                    Error::ProtocolError
                });
            }
        };

        // --- Parse Response ---
        let header_str =
            core::str::from_utf8(&raw[..header_end]).map_err(|_| Error::ProtocolError)?;
        let mut lines = header_str.lines();

        // Parse status line
        let status_line = lines.next().ok_or(Error::ProtocolError)?;
        let mut status_parts = status_line.splitn(3, ' ');
        status_parts.next(); // Skip HTTP version
        let status_code = status_parts
            .next()
            .ok_or(Error::ProtocolError)?
            .parse::<u16>()
            .map_err(|_| Error::ProtocolError)?;

        // Parse headers
        let mut response_headers: Vec<Header, MAX_HEADERS> = Vec::new();
        let mut content_length: Option<usize> = None;
        let mut chunked = false;

        for line in lines {
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(2, ':');
            let name = parts.next().ok_or(Error::ProtocolError)?.trim();
            let value = parts.next().ok_or(Error::ProtocolError)?.trim();

            if name.eq_ignore_ascii_case("Content-Length") {
                content_length = value.parse::<usize>().ok();
            } else if name.eq_ignore_ascii_case("Transfer-Encoding")
                && value.eq_ignore_ascii_case("chunked")
            {
                chunked = true;
            }

            // Headers beyond our capacity are dropped, not fatal.
            if let Ok(header) = Header::new(name, value) {
                let _ = response_headers.push(header);
            }
        }

        let body_start = header_end + 4;
        let body = if chunked {
            while find_slice(&raw[body_start..], b"0\r\n\r\n").is_none() {
                if self.fill(&mut raw)? == 0 {
                    break;
                }
            }
            decode_chunked(&raw[body_start..])?
        } else if let Some(len) = content_length {
            if len > MAX_BODY_LEN {
                return Err(Error::ProtocolError);
            }
            while raw.len() - body_start < len {
                if self.fill(&mut raw)? == 0 {
                    return Err(Error::ConnectionClosed); // Prematurely closed
                }
            }
            Vec::from_slice(&raw[body_start..body_start + len]).map_err(|_| Error::ProtocolError)?
        } else {
            // No framing: the body runs until the server closes.
            while self.fill(&mut raw)? > 0 {}
            Vec::from_slice(&raw[body_start..]).map_err(|_| Error::ProtocolError)?
        };

        trace!("http: status {} with {} body bytes", status_code, body.len());
        Ok(Response {
            status_code,
            headers: response_headers,
            body,
        })
    }

    /// Read whatever the connection has into the spare capacity of `raw`.
    ///
    /// A peer that closed the stream reads as `Ok(0)`, the end of the response.
    fn fill(&mut self, raw: &mut Vec<u8, RAW_LEN>) -> Result<usize, Error> {
        let mut temp_buf = [0u8; 256];
        let room = (raw.capacity() - raw.len()).min(temp_buf.len());
        if room == 0 {
            return Err(Error::ProtocolError);
        }
        let n = match self
            .connection
            .read_timeout(&mut temp_buf[..room], self.timeout_ms)
        {
            Ok(n) => n,
            Err(e) if e.kind() == Error::ConnectionClosed => 0,
            Err(_) => return Err(Error::ReadError),
        };
        raw.extend_from_slice(&temp_buf[..n])
            .map_err(|_| Error::ProtocolError)?;
        Ok(n)
    }
}

fn push<const N: usize>(buf: &mut Vec<u8, N>, bytes: &[u8]) -> Result<(), Error> {
    buf.extend_from_slice(bytes).map_err(|_| Error::WriteError)
}

/// Reassemble a `Transfer-Encoding: chunked` body.
fn decode_chunked(mut data: &[u8]) -> Result<Vec<u8, MAX_BODY_LEN>, Error> {
    let mut body = Vec::new();
    loop {
        let line_end = find_slice(data, b"\r\n").ok_or(Error::ProtocolError)?;
        let size_line = core::str::from_utf8(&data[..line_end]).map_err(|_| Error::ProtocolError)?;
        // Chunk extensions after ';' are ignored.
        let size_hex = size_line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_hex, 16).map_err(|_| Error::ProtocolError)?;
        data = &data[line_end + 2..];
        if size == 0 {
            return Ok(body);
        }
        if data.len() < size {
            return Err(Error::ProtocolError);
        }
        body.extend_from_slice(&data[..size])
            .map_err(|_| Error::ProtocolError)?;
        data = data.get(size + 2..).ok_or(Error::ProtocolError)?;
    }
}

/// Finds the first occurrence of a slice in another slice and returns its starting position.
fn find_slice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
