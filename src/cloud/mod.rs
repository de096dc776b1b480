//! # Cloud data service client
//!
//! Talks to an Adafruit IO style service: an account (`username` plus API
//! key) owns feeds, single-valued time series addressed by key, and groups
//! of feeds. Data goes in and out two ways:
//!
//! - **REST** ([`RestClient`]): request/response over HTTPS. Feed, group and
//!   data CRUD, one short-lived connection per call.
//! - **Messaging** ([`Session`]): a long-lived MQTT connection for pushing
//!   values and receiving live updates on `<user>/feeds/<key>` topics and
//!   the broker's `time/` clock.
//!
//! Both are borrowed from a [`Client`], which holds the one
//! [`ThrottleTracker`] they share. Every REST request and every MQTT publish
//! takes one unit from it, so both count against the same per-minute budget.
//!
//! Nothing in this module allocates; every buffer has a fixed capacity and
//! overflowing one is reported as [`Invalid::Capacity`].

mod client;
mod clock;
mod config;
mod dispatch;
mod error;
mod model;
mod rest;
mod retry;
mod session;
mod signer;
mod throttle;
pub mod topic;
mod validate;

pub use client::Client;
#[cfg(feature = "std")]
pub use clock::StdClock;
pub use clock::Clock;
pub use config::{
    Config, DEFAULT_HOST, DEFAULT_HTTP_PORT, DEFAULT_KEEP_ALIVE_SECS, DEFAULT_MQTT_PORT, Endpoint,
};
pub use dispatch::{Handler, MAX_SUBSCRIPTIONS, Registry};
pub use error::{Error, Invalid};
pub use model::{
    BatchPoint, DataPoint, Feed, Group, Location, MAX_DATA_POINTS, MAX_GROUP_FEEDS,
    MAX_GROUP_VALUES, RateInfo, UserInfo, Visibility,
};
pub use rest::RestClient;
pub use retry::RetryPolicy;
pub use session::{MAX_PENDING, Session, SessionState};
pub use signer::{SignedRequest, sign};
pub use throttle::{DEFAULT_RETRY_AFTER_SECS, Feedback, ThrottleTracker};
pub use topic::{Message, TimeFormat, Topic, classify};
