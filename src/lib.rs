//! # feedlink - cloud telemetry for constrained devices
//!
//! A `no_std` client that lets an IoT device push sensor values to a hosted
//! data service and receive live updates from it, over both of the service's
//! interfaces: a REST API and an MQTT broker. It is written for Adafruit IO
//! and works with services that follow the same feed/group model.
//!
//! ## Features
//!
//! ### Cloud client
//! - **Feeds and groups**: get, create, delete, membership
//! - **Data**: send values with optional location, read the latest or last N
//! - **Messaging**: subscribe to feeds and groups, publish, live updates
//! - **Rate limiting**: one shared budget that fails fast before a certain 429
//! - **Reconnection**: bounded backoff, subscriptions restored automatically
//!
//! ### Network layer
//! - **HTTP Client**: HTTP/1.1 requests over any byte stream
//! - **MQTT Client**: MQTT 3.1.1 with QoS 0/1 publish and subscribe
//!
//! The crate never opens sockets itself. The integrator supplies a
//! [`Connect`](network::Connect) implementation (TCP plus TLS on the device's
//! stack) and a [`Clock`](cloud::Clock).
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! feedlink = "0.1.0"
//! ```
//!
//! ### Sending a value over REST
//!
//! ```rust,no_run
//! use feedlink::cloud::{Client, Clock, Config};
//! use feedlink::network::Connect;
//!
//! fn report<K: Connect, T: Clock>(connector: K, clock: T) -> Result<(), feedlink::cloud::Error> {
//!     let config = Config::new("adabot", "aio_key")?;
//!     let mut client: Client<K, T> = Client::new(config, connector, clock);
//!
//!     let feed = client.rest().get_or_create_feed("temperature", None)?;
//!     client.rest().send_data(&feed.key, "21.5", None, None)?;
//!     Ok(())
//! }
//! ```
//!
//! ### Raw MQTT
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
//! #     fn write(&mut self, _buf: &[u8]) -> Result<usize, Self::Error> { Ok(0) }
//! #     fn flush(&mut self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//! # impl feedlink::network::Close for MockConnection {
//! #     type Error = ();
//! #     fn close(self) -> Result<(), Self::Error> { Ok(()) }
//! # }
//!
//! let connection = MockConnection;
//! let options = Options {
//!     client_id: "my_device",
//!     keep_alive_seconds: 60,
//!     clean_session: true,
//!     username: Some("adabot"),
//!     password: Some("aio_key"),
//! };
//!
//! // let mut client = Client::connect(connection, &options, 5_000)?;
//! // client.publish("adabot/feeds/temperature", b"23.5", QoS::AtMostOnce)?;
//! ```
//!
//! ## Platform Support
//!
//! This library is designed to work on:
//! - Embedded microcontrollers (ARM Cortex-M, RISC-V, etc.)
//! - Linux-based IoT devices (Raspberry Pi, etc.)
//! - Any platform supporting Rust's `core` library
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support and `cloud::StdClock` (default: disabled)
//! - `defmt`: Route logging through defmt instead of `log`

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod fmt;

/// Network abstraction layer: transport traits and the HTTP and MQTT
/// protocol clients built on them.
pub mod network;

/// Feeds, groups and data on the cloud service, over REST and MQTT.
///
/// Start with [`cloud::Client`].
pub mod cloud;
