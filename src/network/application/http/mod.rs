//! HTTP/1.1 protocol implementation for embedded systems.
//!
//! This module provides a lightweight HTTP client implementation designed specifically
//! for embedded systems and `no_std` environments. It focuses on simplicity,
//! predictable memory usage, and compatibility with resource-constrained devices.
//!
//! # Features
//!
//! - HTTP/1.1 request serialisation with custom headers
//! - GET, POST and DELETE
//! - `Content-Length`, `Transfer-Encoding: chunked` and read-until-close bodies
//! - Fixed-size buffers for predictable memory usage
//!
//! # Usage
//!
//! The main entry point is the [`client::Client`] which works with any connection
//! type implementing the [`crate::network::Connection`] trait.
//!
//! ```rust,no_run
//! use feedlink::network::application::http::{Client, Header, Method, Request};
//! # use feedlink::network::Connection;
//! # struct MockConnection;
//! # impl Connection for MockConnection {}
//! # impl feedlink::network::Read for MockConnection {
//! #     type Error = feedlink::network::error::Error;
//! #     fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> { Ok(0) }
//! # }
//! # impl feedlink::network::Write for MockConnection {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl feedlink::network::Close for MockConnection {
//! #     type Error = ();
//! #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//!
//! let connection = MockConnection;
//! let mut client = Client::new(connection);
//!
//! let mut headers = heapless::Vec::new();
//! headers.push(Header::new("Host", "io.adafruit.com").unwrap()).unwrap();
//!
//! let request = Request {
//!     method: Method::Get,
//!     path: "/api/v2/user",
//!     headers,
//!     body: None,
//! };
//!
//! // let response = client.request(&request)?;
//! ```

/// HTTP client implementation and supporting types.
///
/// Contains the main [`Client`](client::Client) struct and all related types
/// for making HTTP requests and handling responses.
pub mod client;

pub use client::{Client, Header, Method, Request, Response};
