//! MQTT 3.1.1 protocol implementation for embedded systems.
//!
//! This module provides the MQTT 3.1.1 client the messaging session is built
//! on, designed for embedded systems and `no_std` environments. MQTT (Message
//! Queuing Telemetry Transport) is a lightweight publish-subscribe messaging
//! protocol ideal for IoT applications.
//!
//! # Protocol Overview
//!
//! MQTT uses a publish-subscribe pattern where:
//! - **Publishers** send messages to topics
//! - **Subscribers** receive messages from topics they're interested in
//! - **Brokers** route messages between publishers and subscribers
//!
//! # Usage
//!
//! The main entry point is the [`client::Client`] which provides methods for
//! connecting, publishing, subscribing, and receiving packets. Most
//! applications use it indirectly through [`crate::cloud::Session`], which adds
//! reconnection, keep-alive and topic dispatch on top.
//!
//! ```rust,no_run
//! use feedlink::network::application::mqtt::{Client, Options, QoS};
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
//! let options = Options {
//!     client_id: "iot_device_123",
//!     keep_alive_seconds: 60,
//!     clean_session: true,
//!     username: Some("adabot"),
//!     password: Some("aio_key"),
//! };
//!
//! // let mut client = Client::connect(connection, &options, 5_000)?;
//! // client.subscribe("adabot/feeds/temperature", QoS::AtMostOnce)?;
//! // client.publish("adabot/feeds/temperature", b"21.5", QoS::AtMostOnce)?;
//! ```

/// MQTT client implementation and supporting types.
///
/// Contains the main [`Client`](client::Client) struct and all related types
/// for MQTT communication, including packet structures, configuration options,
/// and Quality of Service definitions.
pub mod client;

pub use client::{Client, Options, Packet, PublishPacket, QoS};
