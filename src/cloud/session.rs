//! # Messaging session
//!
//! A long-lived MQTT connection to the service's broker, driven entirely by
//! the caller:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Subscribing -> Active -> Disconnected
//!                                   \____________\_____________\
//!                                                               -> Reconnecting -> Active
//! ```
//!
//! [`Session::poll`] is the only place the session waits. It reads inbound
//! packets for at most its timeout, classifies each message once and hands it
//! to the handler bound to its topic. Keep-alive pings and reconnection also
//! happen there, so nothing runs behind the caller's back.
//!
//! Subscriptions outlive the transport: after a drop they are re-issued on
//! the new connection before the session reports itself active again.

use super::clock::Clock;
use super::config::Config;
use super::dispatch::{Handler, Registry};
use super::error::{Error, Invalid};
use super::model::{Location, MAX_GROUP_VALUES};
use super::throttle::{Feedback, ThrottleTracker};
use super::topic::{self, MAX_TOPIC_LEN, Message, TimeFormat, Topic};
use super::validate;
use crate::network::application::mqtt::client::MAX_PAYLOAD_LEN;
use crate::network::application::mqtt::{self, Options, Packet, PublishPacket, QoS};
use crate::network::error::Error as NetworkError;
use crate::network::{Connect, Connection};
use core::fmt::Write as _;
use heapless::{Deque, LinearMap, String};
use serde::Serialize;

/// Inbound messages that can arrive while waiting for an acknowledgement and
/// are held until the next [`Session::poll`].
pub const MAX_PENDING: usize = 4;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// No transport. Initial state, and the state after [`Session::disconnect`]
    /// or after reconnection gave up.
    Disconnected,
    /// Opening the transport and performing the handshake.
    Connecting,
    /// Handshake done, subscriptions not yet re-issued.
    Connected,
    /// Waiting for the broker to acknowledge a subscription.
    Subscribing,
    /// Ready to publish and receive.
    Active,
    /// The transport dropped; the next attempt is due at `next_at_ms`.
    Reconnecting {
        /// 1-based number of the next attempt.
        attempt: u8,
        /// Clock time of the next attempt.
        next_at_ms: u64,
    },
}

/// Session state that persists between [`Session`] views.
pub(crate) struct Link<C: Connection, H> {
    mqtt: Option<mqtt::Client<C>>,
    state: SessionState,
    registry: Registry<H>,
    pending: Deque<PublishPacket, MAX_PENDING>,
    last_sent_ms: u64,
    ping_sent_ms: Option<u64>,
}

impl<C: Connection, H: Handler> Link<C, H> {
    pub(crate) fn new() -> Self {
        Self {
            mqtt: None,
            state: SessionState::Disconnected,
            registry: Registry::new(),
            pending: Deque::new(),
            last_sent_ms: 0,
            ping_sent_ms: None,
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    fn drop_transport(&mut self) {
        if let Some(client) = self.mqtt.take() {
            if client.close().is_err() {
                debug!("session: closing dropped transport failed");
            }
        }
        self.ping_sent_ms = None;
    }

    /// Keep what arrived while waiting for something else.
    fn stash(&mut self, packet: Packet) {
        match packet {
            Packet::Publish(publish) => {
                if self.pending.is_full() {
                    warn!("session: pending queue full, dropping oldest message");
                    self.pending.pop_front();
                }
                let _ = self.pending.push_back(publish);
            }
            Packet::PingResp => self.ping_sent_ms = None,
            _ => {}
        }
    }
}

#[derive(Serialize)]
struct GroupPublish<'a> {
    feeds: LinearMap<&'a str, &'a str, MAX_GROUP_VALUES>,
}

/// Messaging view of a [`Client`](super::Client).
pub struct Session<'c, K: Connect, T: Clock, H: Handler> {
    config: &'c Config,
    connector: &'c mut K,
    clock: &'c mut T,
    throttle: &'c mut ThrottleTracker,
    link: &'c mut Link<K::Connection, H>,
}

impl<K: Connect, T: Clock, H: Handler> core::fmt::Debug for Session<'_, K, T, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.link.state)
            .field("subscriptions", &self.link.registry)
            .field("pending", &self.link.pending.len())
            .finish_non_exhaustive()
    }
}

impl<'c, K: Connect, T: Clock, H: Handler> Session<'c, K, T, H> {
    pub(crate) fn new(
        config: &'c Config,
        connector: &'c mut K,
        clock: &'c mut T,
        throttle: &'c mut ThrottleTracker,
        link: &'c mut Link<K::Connection, H>,
    ) -> Self {
        Self {
            config,
            connector,
            clock,
            throttle,
            link,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.link.state
    }

    /// Topics that are re-issued on every (re)connect.
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.link.registry.topics()
    }

    // --- Lifecycle ---

    /// Open the transport, authenticate and re-issue retained subscriptions.
    ///
    /// Failed attempts are retried after the delays of
    /// [`Config::connect_retry`]; the transport is closed after each one.
    /// Does nothing if the session is already connected.
    ///
    /// # Errors
    ///
    /// * [`Error::Auth`] - the broker rejected the credentials (not retried)
    /// * [`Error::Connect`] - every attempt failed
    pub fn connect(&mut self) -> Result<(), Error> {
        if self.link.mqtt.is_some() && self.link.state == SessionState::Active {
            return Ok(());
        }
        self.link.drop_transport();

        let policy = self.config.connect_retry;
        let mut attempt: u8 = 0;
        loop {
            let error = match self.establish() {
                Ok(()) => return Ok(()),
                Err(error) => error,
            };
            if error == Error::Auth {
                error!("session: credentials rejected by broker");
                self.link.state = SessionState::Disconnected;
                return Err(error);
            }
            attempt = attempt.saturating_add(1);
            match policy.delay_ms(attempt) {
                Some(delay) => {
                    warn!("session: connect failed: {}, retrying in {} ms", error, delay);
                    self.clock.delay_ms(delay);
                }
                None => {
                    error!("session: connect failed after {} attempts: {}", attempt, error);
                    self.link.state = SessionState::Disconnected;
                    return Err(error);
                }
            }
        }
    }

    /// Send DISCONNECT and close the transport. Subscriptions are kept for
    /// the next [`connect`](Session::connect).
    pub fn disconnect(&mut self) -> Result<(), Error> {
        let result = match self.link.mqtt.take() {
            Some(client) => client.disconnect().map_err(Error::Connect),
            None => Ok(()),
        };
        self.link.state = SessionState::Disconnected;
        self.link.pending.clear();
        self.link.ping_sent_ms = None;
        info!("session: disconnected");
        result
    }

    /// Send a keep-alive ping now.
    pub fn ping(&mut self) -> Result<(), Error> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let now = self.clock.now_ms();
        self.send_ping(now).inspect_err(|e| self.fail_transport(*e))
    }

    // --- Subscriptions ---

    /// Subscribe to `topic` and route its messages to `handler`.
    ///
    /// Blocks until the broker acknowledges. The subscription is retained and
    /// re-issued after every reconnect until [`unsubscribe`](Session::unsubscribe).
    /// Subscribing to a bound topic again replaces its handler.
    ///
    /// # Errors
    ///
    /// * [`Invalid::Topic`] - not a topic the broker delivers on
    /// * [`Invalid::Capacity`] - the subscription table is full
    /// * [`Error::NotConnected`] - the session is not connected
    /// * [`Error::Auth`] - the broker refused the subscription
    /// * [`Error::Connect`] - the transport failed; the session is now reconnecting
    pub fn subscribe(&mut self, topic: &str, handler: H) -> Result<(), Error> {
        Topic::parse(topic)
            .filter(|parsed| parsed.is_subscribable())
            .ok_or(Error::Validation(Invalid::Topic))?;
        if !self.link.registry.has_room_for(topic) {
            return Err(Error::Validation(Invalid::Capacity));
        }
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        self.link.state = SessionState::Subscribing;
        match self.request_subscription(topic) {
            Ok(true) => {
                self.link.state = SessionState::Active;
                self.link.registry.insert(topic, handler)?;
                info!("session: subscribed to {}", topic);
                Ok(())
            }
            Ok(false) => {
                self.link.state = SessionState::Active;
                warn!("session: broker refused subscription to {}", topic);
                Err(Error::Auth)
            }
            Err(error) => {
                self.fail_transport(error);
                Err(error)
            }
        }
    }

    /// Subscribe to one of the account's feeds.
    pub fn subscribe_feed(&mut self, feed_key: &str, handler: H) -> Result<(), Error> {
        let topic = Topic::Feed {
            user: &self.config.username,
            key: feed_key,
        }
        .build()?;
        self.subscribe(&topic, handler)
    }

    /// Subscribe to a feed another user shared with this account.
    pub fn subscribe_shared_feed(&mut self, owner: &str, feed_key: &str, handler: H) -> Result<(), Error> {
        let topic = Topic::Feed {
            user: owner,
            key: feed_key,
        }
        .build()?;
        self.subscribe(&topic, handler)
    }

    /// Subscribe to all feeds of a group.
    pub fn subscribe_group(&mut self, group_key: &str, handler: H) -> Result<(), Error> {
        let topic = Topic::Group {
            user: &self.config.username,
            key: group_key,
        }
        .build()?;
        self.subscribe(&topic, handler)
    }

    /// Subscribe to rate-limit notices. Notices update the throttle tracker
    /// whether or not this subscription exists, as long as they arrive.
    pub fn subscribe_throttle(&mut self, handler: H) -> Result<(), Error> {
        let topic = Topic::Throttle {
            user: &self.config.username,
        }
        .build()?;
        self.subscribe(&topic, handler)
    }

    /// Subscribe to notices about rejected publishes and subscriptions.
    pub fn subscribe_errors(&mut self, handler: H) -> Result<(), Error> {
        let topic = Topic::Errors {
            user: &self.config.username,
        }
        .build()?;
        self.subscribe(&topic, handler)
    }

    /// Subscribe to the broker's clock, published about once a second.
    pub fn subscribe_time(&mut self, format: TimeFormat, handler: H) -> Result<(), Error> {
        let topic = Topic::Time { format }.build()?;
        self.subscribe(&topic, handler)
    }

    /// Stop receiving `topic` and forget its handler.
    ///
    /// The subscription is forgotten even if the broker cannot be told.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if `topic` is not subscribed.
    pub fn unsubscribe(&mut self, topic: &str) -> Result<(), Error> {
        if self.link.registry.remove(topic).is_none() {
            return Err(Error::NotFound);
        }
        info!("session: unsubscribed from {}", topic);
        if !self.is_connected() {
            return Ok(());
        }

        let sent = match self.link.mqtt.as_mut() {
            Some(client) => client.unsubscribe(topic).map_err(Error::Connect),
            None => Err(Error::NotConnected),
        };
        let acked = sent.and_then(|packet_id| {
            self.link.last_sent_ms = self.clock.now_ms();
            self.await_ack(|packet| match packet {
                Packet::UnsubAck { packet_id: id } if *id == packet_id => Some(()),
                _ => None,
            })
        });
        acked.inspect_err(|e| self.fail_transport(*e))
    }

    /// Stop receiving one of the account's feeds.
    pub fn unsubscribe_feed(&mut self, feed_key: &str) -> Result<(), Error> {
        let topic = Topic::Feed {
            user: &self.config.username,
            key: feed_key,
        }
        .build()?;
        self.unsubscribe(&topic)
    }

    // --- Publishing ---

    /// Publish `payload` on `topic`. Only valid while [`SessionState::Active`];
    /// nothing is queued.
    ///
    /// Each publish takes one unit from the shared throttle budget.
    ///
    /// # Errors
    ///
    /// * [`Invalid::Topic`] - not a topic the broker accepts publishes on
    /// * [`Invalid::Value`] - empty or oversized payload
    /// * [`Error::NotConnected`] - the session is not active
    /// * [`Error::Throttle`] - the rate limit is exhausted; nothing was sent
    /// * [`Error::Connect`] - the transport failed; the session is now reconnecting
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Error> {
        Topic::parse(topic)
            .filter(|parsed| parsed.is_publishable())
            .ok_or(Error::Validation(Invalid::Topic))?;
        if payload.is_empty() || payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::Validation(Invalid::Value));
        }
        if self.link.state != SessionState::Active || self.link.mqtt.is_none() {
            return Err(Error::NotConnected);
        }
        self.throttle.reserve(self.clock.now_ms())?;
        let client = self.link.mqtt.as_mut().ok_or(Error::NotConnected)?;
        match client.publish(topic, payload, QoS::AtMostOnce) {
            Ok(()) => {
                self.link.last_sent_ms = self.clock.now_ms();
                trace!("session: published {} bytes to {}", payload.len(), topic);
                Ok(())
            }
            Err(e) => {
                let error = Error::Connect(e);
                self.fail_transport(error);
                Err(error)
            }
        }
    }

    /// Publish a value to one of the account's feeds, with its location when
    /// given.
    pub fn publish_data(&mut self, feed_key: &str, value: &str, location: Option<Location>) -> Result<(), Error> {
        validate::value(value)?;
        let Some(location) = location else {
            let topic = Topic::Feed {
                user: &self.config.username,
                key: feed_key,
            }
            .build()?;
            return self.publish(&topic, value.as_bytes());
        };

        // The CSV form has no quoting.
        if value.contains(',') {
            return Err(Error::Validation(Invalid::Value));
        }
        let topic = Topic::FeedCsv {
            user: &self.config.username,
            key: feed_key,
        }
        .build()?;
        let mut payload: String<MAX_PAYLOAD_LEN> = String::new();
        let written = match location.ele {
            Some(ele) => write!(payload, "{},{},{},{}", value, location.lat, location.lon, ele),
            None => write!(payload, "{},{},{}", value, location.lat, location.lon),
        };
        written.map_err(|_| Error::Validation(Invalid::Capacity))?;
        self.publish(&topic, payload.as_bytes())
    }

    /// Publish one value to each of several feeds of a group in one message.
    pub fn publish_group(&mut self, group_key: &str, values: &[(&str, &str)]) -> Result<(), Error> {
        validate::count(values.len(), MAX_GROUP_VALUES)?;
        let mut feeds = LinearMap::new();
        for &(key, value) in values {
            validate::key(key)?;
            validate::value(value)?;
            feeds
                .insert(key, value)
                .map_err(|_| Error::Validation(Invalid::Capacity))?;
        }
        let topic = Topic::Group {
            user: &self.config.username,
            key: group_key,
        }
        .build()?;
        let mut payload = [0u8; MAX_PAYLOAD_LEN];
        let len = serde_json_core::to_slice(&GroupPublish { feeds }, &mut payload)
            .map_err(|_| Error::Validation(Invalid::Capacity))?;
        self.publish(&topic, &payload[..len])
    }

    /// Ask the broker to republish the last value of a feed to its
    /// subscribers.
    pub fn request_last_value(&mut self, feed_key: &str) -> Result<(), Error> {
        let topic = Topic::FeedGet {
            user: &self.config.username,
            key: feed_key,
        }
        .build()?;
        self.publish(&topic, b"\0")
    }

    // --- Driving ---

    /// Service the session for at most `timeout_ms`.
    ///
    /// Delivers held and inbound messages to their handlers in arrival order,
    /// keeps the connection alive, and while [`SessionState::Reconnecting`]
    /// makes the reconnection attempts that are due, waiting for them no
    /// longer than the timeout. Returns as soon as the transport has nothing
    /// more to read.
    ///
    /// Returns the number of messages handed to a handler. Messages that
    /// cannot be classified, or that no handler is bound to, are logged and
    /// skipped.
    ///
    /// # Errors
    ///
    /// * [`Error::NotConnected`] - the session is disconnected
    /// * [`Error::Connect`] - reconnection gave up; the session is now
    ///   disconnected
    /// * [`Error::Auth`] - the broker rejected the credentials on reconnect
    pub fn poll(&mut self, timeout_ms: u32) -> Result<usize, Error> {
        let deadline = self.clock.now_ms() + u64::from(timeout_ms);
        let mut delivered = 0;

        loop {
            let now = self.clock.now_ms();
            match self.link.state {
                SessionState::Disconnected | SessionState::Connecting => {
                    return if delivered > 0 {
                        Ok(delivered)
                    } else {
                        Err(Error::NotConnected)
                    };
                }
                SessionState::Reconnecting {
                    attempt,
                    next_at_ms,
                } => {
                    if now < next_at_ms {
                        if now >= deadline {
                            return Ok(delivered);
                        }
                        self.clock.delay_ms(clamp_ms(next_at_ms.min(deadline) - now));
                        continue;
                    }
                    self.reconnect(attempt, now)?;
                }
                SessionState::Connected | SessionState::Subscribing | SessionState::Active => {
                    if let Some(packet) = self.link.pending.pop_front() {
                        if self.deliver(&packet) {
                            delivered += 1;
                        }
                        continue;
                    }
                    if let Err(error) = self.keep_alive(now) {
                        self.fail_transport(error);
                        continue;
                    }

                    let wait = clamp_ms(deadline.saturating_sub(now));
                    let Some(client) = self.link.mqtt.as_mut() else {
                        self.fail_transport(Error::NotConnected);
                        continue;
                    };
                    match client.poll(wait) {
                        Ok(Some(Packet::Publish(publish))) => {
                            if self.deliver(&publish) {
                                delivered += 1;
                            }
                        }
                        Ok(Some(Packet::PingResp)) => {
                            trace!("session: PINGRESP");
                            self.link.ping_sent_ms = None;
                        }
                        Ok(Some(_)) => {}
                        Ok(None) => return Ok(delivered),
                        Err(e) => {
                            self.fail_transport(Error::Connect(e));
                            continue;
                        }
                    }
                    if self.clock.now_ms() >= deadline {
                        return Ok(delivered);
                    }
                }
            }
        }
    }

    // --- Internals ---

    fn is_connected(&self) -> bool {
        self.link.mqtt.is_some()
            && matches!(
                self.link.state,
                SessionState::Connected | SessionState::Subscribing | SessionState::Active
            )
    }

    /// One connection attempt: transport, handshake, resubscription.
    fn establish(&mut self) -> Result<(), Error> {
        self.link.state = SessionState::Connecting;
        let remote = self.config.mqtt.remote();
        info!("session: connecting to {}:{}", remote.host, remote.port);

        let connection = self.connector.connect(&remote).map_err(|_| {
            warn!("session: cannot reach {}:{}", remote.host, remote.port);
            Error::Connect(NetworkError::ConnectionRefused)
        })?;
        let options = Options {
            client_id: self.config.client_id.as_str(),
            keep_alive_seconds: self.config.keep_alive_secs,
            clean_session: true,
            username: Some(self.config.username.as_str()),
            password: Some(self.config.key.as_str()),
        };
        let client = mqtt::Client::connect(connection, &options, self.config.ack_timeout_ms)?;

        self.link.mqtt = Some(client);
        self.link.state = SessionState::Connected;
        self.link.last_sent_ms = self.clock.now_ms();
        self.link.ping_sent_ms = None;

        if let Err(error) = self.resubscribe() {
            self.link.drop_transport();
            return Err(error);
        }
        self.link.state = SessionState::Active;
        info!(
            "session: active with {} subscriptions",
            self.link.registry.len()
        );
        Ok(())
    }

    /// Re-issue every retained subscription on a fresh connection. Topics
    /// the broker now refuses are dropped from the table.
    fn resubscribe(&mut self) -> Result<(), Error> {
        if self.link.registry.is_empty() {
            return Ok(());
        }
        self.link.state = SessionState::Subscribing;
        let mut index = 0;
        while let Some(bound) = self.link.registry.topic(index) {
            let topic: String<MAX_TOPIC_LEN> =
                String::try_from(bound).map_err(|_| Error::Validation(Invalid::Capacity))?;
            if self.request_subscription(&topic)? {
                index += 1;
            } else {
                warn!("session: broker refused {} on resubscribe, dropping it", topic.as_str());
                self.link.registry.remove(&topic);
            }
        }
        Ok(())
    }

    /// Send SUBSCRIBE and wait for its SUBACK. `Ok(false)` if refused.
    fn request_subscription(&mut self, topic: &str) -> Result<bool, Error> {
        let client = self.link.mqtt.as_mut().ok_or(Error::NotConnected)?;
        let packet_id = client
            .subscribe(topic, QoS::AtLeastOnce)
            .map_err(Error::Connect)?;
        self.link.last_sent_ms = self.clock.now_ms();
        self.await_ack(|packet| match packet {
            Packet::SubAck {
                packet_id: id,
                granted,
            } if *id == packet_id => Some(granted.is_some()),
            _ => None,
        })
    }

    /// Poll until `matches` accepts a packet, holding everything else.
    fn await_ack<R>(&mut self, matches: impl Fn(&Packet) -> Option<R>) -> Result<R, Error> {
        let deadline = self.clock.now_ms() + u64::from(self.config.ack_timeout_ms);
        loop {
            let now = self.clock.now_ms();
            if now >= deadline {
                warn!("session: no acknowledgement within {} ms", self.config.ack_timeout_ms);
                return Err(Error::Connect(NetworkError::Timeout));
            }
            let client = self.link.mqtt.as_mut().ok_or(Error::NotConnected)?;
            if let Some(packet) = client.poll(clamp_ms(deadline - now)).map_err(Error::Connect)? {
                if let Some(result) = matches(&packet) {
                    return Ok(result);
                }
                self.link.stash(packet);
            }
        }
    }

    fn reconnect(&mut self, attempt: u8, now: u64) -> Result<(), Error> {
        info!("session: reconnect attempt {}", attempt);
        let error = match self.establish() {
            Ok(()) => return Ok(()),
            Err(error) => error,
        };
        if error == Error::Auth {
            error!("session: credentials rejected on reconnect");
            self.link.state = SessionState::Disconnected;
            return Err(error);
        }
        match self.config.reconnect.delay_ms(attempt) {
            Some(delay) => {
                warn!("session: reconnect failed: {}, next try in {} ms", error, delay);
                self.link.state = SessionState::Reconnecting {
                    attempt: attempt.saturating_add(1),
                    next_at_ms: now + u64::from(delay),
                };
                Ok(())
            }
            None => {
                error!("session: giving up after {} reconnect attempts", attempt);
                self.link.state = SessionState::Disconnected;
                Err(error)
            }
        }
    }

    fn keep_alive(&mut self, now: u64) -> Result<(), Error> {
        let interval = u64::from(self.config.keep_alive_secs) * 1_000;
        if interval == 0 {
            return Ok(());
        }
        match self.link.ping_sent_ms {
            Some(sent) if now.saturating_sub(sent) >= interval => {
                warn!("session: no PINGRESP for {} ms", now.saturating_sub(sent));
                Err(Error::Connect(NetworkError::Timeout))
            }
            Some(_) => Ok(()),
            None if now.saturating_sub(self.link.last_sent_ms) >= interval * 3 / 4 => {
                self.send_ping(now)
            }
            None => Ok(()),
        }
    }

    fn send_ping(&mut self, now: u64) -> Result<(), Error> {
        let client = self.link.mqtt.as_mut().ok_or(Error::NotConnected)?;
        client.ping().map_err(Error::Connect)?;
        debug!("session: PINGREQ");
        self.link.last_sent_ms = now;
        if self.link.ping_sent_ms.is_none() {
            self.link.ping_sent_ms = Some(now);
        }
        Ok(())
    }

    fn fail_transport(&mut self, error: Error) {
        warn!("session: transport lost: {}", error);
        self.link.drop_transport();
        self.link.state = SessionState::Reconnecting {
            attempt: 1,
            next_at_ms: self.clock.now_ms(),
        };
    }

    /// Classify and dispatch one message. Returns whether a handler ran.
    fn deliver(&mut self, publish: &PublishPacket) -> bool {
        let message = topic::classify(&publish.topic, &publish.payload);
        match &message {
            Message::Unrecognized { topic, payload } => {
                debug!(
                    "session: skipping undecodable message on {} ({} bytes)",
                    topic,
                    payload.len()
                );
                return false;
            }
            Message::ThrottleNotice {
                retry_after_secs, ..
            } => {
                let feedback = Feedback::Notice {
                    retry_after_secs: *retry_after_secs,
                };
                self.throttle.observe(feedback, self.clock.now_ms());
            }
            Message::ErrorNotice { text } => warn!("session: service reported: {}", text),
            _ => {}
        }
        let handled = self.link.registry.dispatch(&publish.topic, &message);
        if !handled {
            debug!("session: no handler for {}", publish.topic.as_str());
        }
        handled
    }
}

fn clamp_ms(ms: u64) -> u32 {
    u32::try_from(ms).unwrap_or(u32::MAX)
}
