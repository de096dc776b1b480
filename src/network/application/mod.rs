//! # Application Layer Network Protocols
//!
//! This module contains the application layer (OSI Layer 7) protocols the
//! cloud client speaks. Each protocol works with the core network traits and
//! keeps a consistent API for embedded systems.
//!
//! ## Available Protocols
//!
//! - **[`http`]**: HTTP/1.1 client for the REST API
//! - **[`mqtt`]**: MQTT 3.1.1 client for the messaging session
//!
//! ## Design Principles
//!
//! - **Connection Agnostic**: Work with any type implementing [`Connection`](crate::network::Connection)
//! - **No-std Compatible**: Designed for embedded systems without heap allocation
//! - **Resource Conscious**: Use fixed-size buffers and minimal memory
//! - **Error Handling**: Failures map onto [`Error`](crate::network::error::Error)

/// HTTP client implementation.
///
/// Provides a simple HTTP/1.1 client suitable for embedded systems,
/// supporting GET, POST and DELETE with custom headers.
pub mod http;

/// MQTT client implementation.
///
/// Provides an MQTT 3.1.1 client for lightweight publish-subscribe messaging,
/// commonly used in IoT applications.
pub mod mqtt;
