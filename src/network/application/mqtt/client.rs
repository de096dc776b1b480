//! MQTT 3.1.1 client implementation for embedded systems.
//!
//! This module provides a lightweight MQTT client designed for `no_std` environments
//! and embedded systems. It implements the parts of the MQTT 3.1.1 specification a
//! telemetry device needs, with a focus on simplicity, reliability, and minimal
//! resource usage.
//!
//! # Features
//!
//! - CONNECT with username/password authentication and keep-alive
//! - PUBLISH at QoS 0 and 1 (inbound QoS 1 messages are acknowledged automatically)
//! - SUBSCRIBE / UNSUBSCRIBE with packet identifiers
//! - PINGREQ / PINGRESP and DISCONNECT
//! - Fixed-size buffers for predictable memory usage
//! - Connection agnostic (works with any transport)
//!
//! # Acknowledgements
//!
//! [`Client::subscribe`] and [`Client::unsubscribe`] only send their request and
//! return the packet identifier. The broker's SUBACK/UNSUBACK arrives through
//! [`Client::poll`] like every other inbound packet, because the broker is free
//! to deliver retained PUBLISH packets before the acknowledgement. Callers that
//! need to block until the acknowledgement arrives (the messaging session does)
//! keep polling until they see the matching [`Packet`].
use crate::network::Connection;
use crate::network::error::{Error, TransportError};
use heapless::{String, Vec};

// MQTT Control Packet types - these are the fixed header packet type values
/// MQTT CONNECT packet type identifier.
const CONNECT: u8 = 0x10;
/// MQTT CONNACK packet type identifier.
const CONNACK: u8 = 0x20;
/// MQTT PUBLISH packet type identifier.
const PUBLISH: u8 = 0x30;
/// MQTT PUBACK packet type identifier.
const PUBACK: u8 = 0x40;
/// MQTT SUBSCRIBE packet type identifier.
const SUBSCRIBE: u8 = 0x82;
/// MQTT SUBACK packet type identifier.
const SUBACK: u8 = 0x90;
/// MQTT UNSUBSCRIBE packet type identifier.
const UNSUBSCRIBE: u8 = 0xA2;
/// MQTT UNSUBACK packet type identifier.
const UNSUBACK: u8 = 0xB0;
/// MQTT PINGREQ packet type identifier.
const PINGREQ: u8 = 0xC0;
/// MQTT PINGRESP packet type identifier.
const PINGRESP: u8 = 0xD0;
/// MQTT DISCONNECT packet type identifier.
const DISCONNECT: u8 = 0xE0;

// Protocol constants of MQTT 3.1.1
/// MQTT protocol name sent in CONNECT.
const PROTOCOL_NAME: &[u8] = b"MQTT";
/// MQTT protocol level for version 3.1.1.
const PROTOCOL_LEVEL: u8 = 4; // MQTT 3.1.1

/// Longest topic name carried by a [`PublishPacket`].
pub const MAX_TOPIC_LEN: usize = 256;
/// Largest payload carried by a [`PublishPacket`].
pub const MAX_PAYLOAD_LEN: usize = 1024;

const MAX_PACKET_LEN: usize = MAX_TOPIC_LEN + MAX_PAYLOAD_LEN + 16;
const DEFAULT_ACK_TIMEOUT_MS: u32 = 5_000;

/// An incoming MQTT publish message.
///
/// This structure represents a message received from the MQTT broker when
/// subscribed to one or more topics. It contains both the topic name and
/// the message payload.
///
/// # Examples
///
/// ```rust
/// use feedlink::network::application::mqtt::PublishPacket;
/// use heapless::{String, Vec};
///
/// // This would typically be created by the MQTT client
/// let packet = PublishPacket {
///     topic: String::try_from("sensors/temperature").unwrap(),
///     payload: Vec::from_slice(b"23.5").unwrap(),
/// };
///
/// assert_eq!(packet.topic.as_str(), "sensors/temperature");
/// assert_eq!(&packet.payload[..], b"23.5");
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PublishPacket {
    /// The topic on which the message was published.
    ///
    /// Maximum length is [`MAX_TOPIC_LEN`] characters to fit within embedded memory constraints.
    pub topic: String<MAX_TOPIC_LEN>,

    /// The message payload data.
    ///
    /// Maximum size is [`MAX_PAYLOAD_LEN`] bytes to balance functionality with memory usage.
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
}

/// A packet received from the broker.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Packet {
    /// An application message on a subscribed topic.
    Publish(PublishPacket),
    /// The broker acknowledged one of our QoS 1 publishes.
    PubAck {
        /// Identifier of the acknowledged PUBLISH.
        packet_id: u16,
    },
    /// The broker answered a SUBSCRIBE.
    SubAck {
        /// Identifier of the acknowledged SUBSCRIBE.
        packet_id: u16,
        /// Granted QoS, or `None` when the broker refused the subscription.
        granted: Option<QoS>,
    },
    /// The broker answered an UNSUBSCRIBE.
    UnsubAck {
        /// Identifier of the acknowledged UNSUBSCRIBE.
        packet_id: u16,
    },
    /// Answer to a PINGREQ.
    PingResp,
    /// Anything else: unexpected packet types, oversized or malformed PUBLISH
    /// packets that were drained from the stream and dropped.
    Other(u8),
}

/// Quality of Service levels for MQTT messages.
///
/// QoS defines the guarantee of delivery for a specific message. Higher QoS levels
/// provide stronger delivery guarantees but require more network overhead and
/// client state management.
///
/// # Examples
///
/// ```rust
/// use feedlink::network::application::mqtt::QoS;
///
/// let qos0 = QoS::AtMostOnce;   // Fire and forget
/// let qos1 = QoS::AtLeastOnce;  // Acknowledged delivery
///
/// assert_eq!(qos0 as u8, 0);
/// assert_eq!(qos1 as u8, 1);
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QoS {
    /// **QoS 0**: At most once delivery.
    ///
    /// Messages are delivered according to the best effort of the underlying network.
    /// Message loss can occur. This level could be used, for example, with ambient
    /// sensor data where it's not critical if an individual reading is lost.
    AtMostOnce = 0,

    /// **QoS 1**: At least once delivery.
    ///
    /// Messages are assured to arrive but duplicates can occur. This level could be
    /// used for applications where duplicate messages are acceptable but message
    /// loss is not.
    AtLeastOnce = 1,

    /// **QoS 2**: Exactly once delivery.
    ///
    /// Accepted on the wire for completeness; this client never requests it and
    /// treats inbound QoS 2 messages like QoS 1.
    ExactlyOnce = 2,
}

impl QoS {
    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }
}

/// Configuration options for MQTT client connection.
///
/// These options control how the client connects to the MQTT broker and
/// behaves during the session.
///
/// # Examples
///
/// ```rust
/// use feedlink::network::application::mqtt::Options;
///
/// let options = Options {
///     client_id: "my_iot_device",
///     keep_alive_seconds: 60,
///     clean_session: true,
///     username: Some("adabot"),
///     password: Some("aio_key"),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Options<'a> {
    /// The client identifier, must be unique within the broker.
    ///
    /// If a client connects with a client identifier that is already in use by
    /// another client, the broker will disconnect the existing client.
    pub client_id: &'a str,

    /// The keep-alive time interval in seconds.
    ///
    /// This defines the maximum time interval between messages sent or received.
    /// It enables the client and broker to detect when the other has disconnected.
    /// A value of 0 disables keep-alive.
    pub keep_alive_seconds: u16,

    /// Whether to start a clean session.
    ///
    /// - `true`: The broker will discard any previous session state and start fresh
    /// - `false`: The broker will resume the previous session if one exists
    pub clean_session: bool,

    /// User name presented in the CONNECT packet.
    pub username: Option<&'a str>,

    /// Password presented in the CONNECT packet. Only sent with a user name.
    pub password: Option<&'a str>,
}

/// An MQTT 3.1.1 client for publish-subscribe messaging.
///
/// The client manages a connection to an MQTT broker and provides methods for
/// publishing messages, subscribing to topics, and receiving incoming packets.
/// It's designed to work with any connection type implementing the [`Connection`] trait.
///
/// # Type Parameters
///
/// * `C` - The connection type implementing [`Connection`]
pub struct Client<C: Connection> {
    connection: C,
    next_packet_id: u16,
    ack_timeout_ms: u32,
}

impl<C: Connection> core::fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("next_packet_id", &self.next_packet_id)
            .field("ack_timeout_ms", &self.ack_timeout_ms)
            .finish_non_exhaustive()
    }
}

impl<C: Connection> Client<C> {
    /// Establish an MQTT connection with the broker.
    ///
    /// This function performs the MQTT connection handshake by sending a CONNECT
    /// packet and waiting up to `ack_timeout_ms` for a CONNACK response. If
    /// successful, it returns a connected client ready for publishing and
    /// subscribing. On any failure the connection is closed before returning.
    ///
    /// # Errors
    ///
    /// * [`Error::WriteError`] - Failed to send CONNECT packet
    /// * [`Error::ReadError`] - Failed to read CONNACK response
    /// * [`Error::ConnectionClosed`] - The broker closed the stream before CONNACK
    /// * [`Error::Timeout`] - No CONNACK within `ack_timeout_ms`
    /// * [`Error::Unauthorized`] - Broker rejected the user name or password
    /// * [`Error::ConnectionRefused`] - Broker refused the connection for another reason
    /// * [`Error::ProtocolError`] - Invalid CONNACK packet received, or options too large
    pub fn connect(mut connection: C, options: &Options, ack_timeout_ms: u32) -> Result<Self, Error> {
        match handshake(&mut connection, options, ack_timeout_ms) {
            Ok(()) => Ok(Self {
                connection,
                next_packet_id: 1,
                ack_timeout_ms,
            }),
            Err(e) => {
                let _ = connection.close();
                Err(e)
            }
        }
    }

    /// Publish a message to a specific topic.
    ///
    /// Sends a PUBLISH packet to the broker with the specified topic, payload,
    /// and quality of service level. For QoS 1 the broker's PUBACK is reported
    /// later by [`poll`](Client::poll).
    ///
    /// # Errors
    ///
    /// * [`Error::WriteError`] - Failed to send the publish packet
    /// * [`Error::ProtocolError`] - Topic or payload too large
    pub fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), Error> {
        if topic.len() > MAX_TOPIC_LEN || payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::ProtocolError);
        }
        let mut packet: Vec<u8, MAX_PACKET_LEN> = Vec::new();

        // --- Variable Header ---
        put_str(&mut packet, topic)?;
        if qos != QoS::AtMostOnce {
            let packet_id = self.take_packet_id();
            put(&mut packet, &packet_id.to_be_bytes())?;
        }

        // --- Payload ---
        put(&mut packet, payload)?;

        self.send(PUBLISH | ((qos as u8) << 1), &packet)
    }

    /// Subscribe to a topic filter and return the SUBSCRIBE packet identifier.
    ///
    /// The matching [`Packet::SubAck`] is delivered through [`poll`](Client::poll).
    pub fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<u16, Error> {
        let mut packet: Vec<u8, MAX_PACKET_LEN> = Vec::new();

        // --- Variable Header (Packet Identifier) ---
        let packet_id = self.take_packet_id();
        put(&mut packet, &packet_id.to_be_bytes())?;

        // --- Payload ---
        put_str(&mut packet, topic)?;
        put(&mut packet, &[qos as u8])?;

        self.send(SUBSCRIBE, &packet)?;
        Ok(packet_id)
    }

    /// Unsubscribe from a topic filter and return the UNSUBSCRIBE packet identifier.
    ///
    /// The matching [`Packet::UnsubAck`] is delivered through [`poll`](Client::poll).
    pub fn unsubscribe(&mut self, topic: &str) -> Result<u16, Error> {
        let mut packet: Vec<u8, MAX_PACKET_LEN> = Vec::new();
        let packet_id = self.take_packet_id();
        put(&mut packet, &packet_id.to_be_bytes())?;
        put_str(&mut packet, topic)?;

        self.send(UNSUBSCRIBE, &packet)?;
        Ok(packet_id)
    }

    /// Send a PINGREQ. The broker's answer arrives as [`Packet::PingResp`].
    pub fn ping(&mut self) -> Result<(), Error> {
        self.send(PINGREQ, &[])
    }

    /// Wait up to `timeout_ms` for the next packet from the broker.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(packet))` - A packet was received
    /// * `Ok(None)` - Nothing arrived within the wait
    /// * `Err(error)` - The transport failed or the stream is no longer
    ///   framed correctly; the connection should be considered dead
    ///
    /// Inbound QoS 1 publishes are acknowledged before being returned.
    pub fn poll(&mut self, timeout_ms: u32) -> Result<Option<Packet>, Error> {
        let mut header_buf = [0u8; 1];
        match self.connection.read_timeout(&mut header_buf, timeout_ms) {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(read_failure(&e)),
        }
        let header = header_buf[0];
        let remaining_len = self.read_remaining_length()?;

        if header & 0xF0 == PUBLISH {
            return self.read_publish(header, remaining_len).map(Some);
        }

        let mut body = [0u8; 4];
        if remaining_len > body.len() {
            self.discard(remaining_len)?;
            return Ok(Some(Packet::Other(header)));
        }
        read_exact(
            &mut self.connection,
            &mut body[..remaining_len],
            self.ack_timeout_ms,
        )?;
        let id = |body: &[u8]| -> Result<u16, Error> {
            match body {
                [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
                _ => Err(Error::ProtocolError),
            }
        };

        let packet = match header {
            PUBACK => Packet::PubAck {
                packet_id: id(&body[..remaining_len])?,
            },
            SUBACK => Packet::SubAck {
                packet_id: id(&body[..remaining_len])?,
                granted: match remaining_len {
                    3 => QoS::from_bits(body[2]),
                    _ => return Err(Error::ProtocolError),
                },
            },
            UNSUBACK => Packet::UnsubAck {
                packet_id: id(&body[..remaining_len])?,
            },
            PINGRESP => Packet::PingResp,
            other => Packet::Other(other),
        };
        Ok(Some(packet))
    }

    /// Send DISCONNECT and close the transport.
    pub fn disconnect(mut self) -> Result<(), Error> {
        let sent = self.send(DISCONNECT, &[]);
        let closed = self.connection.close().map_err(|_| Error::NotOpen);
        sent.and(closed)
    }

    /// Close the transport without a DISCONNECT, e.g. after it failed.
    pub fn close(self) -> Result<(), Error> {
        self.connection.close().map_err(|_| Error::NotOpen)
    }

    /// Get the underlying connection
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Get a mutable reference to the underlying connection
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    fn take_packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        // Zero is not a valid packet identifier.
        self.next_packet_id = self.next_packet_id.checked_add(1).unwrap_or(1);
        id
    }

    fn send(&mut self, first_byte: u8, body: &[u8]) -> Result<(), Error> {
        let mut fixed_header: Vec<u8, 5> = Vec::new();
        fixed_header.push(first_byte).map_err(|_| Error::ProtocolError)?;
        encode_remaining_length(&mut fixed_header, body.len()).map_err(|_| Error::ProtocolError)?;

        self.connection.write_all(&fixed_header)?;
        self.connection.write_all(body)?;
        self.connection.flush().map_err(|_| Error::WriteError)
    }

    fn read_remaining_length(&mut self) -> Result<usize, Error> {
        let mut remaining_len = 0usize;
        let mut multiplier = 1usize;
        for _ in 0..4 {
            let mut byte = [0u8; 1];
            read_exact(&mut self.connection, &mut byte, self.ack_timeout_ms)?;
            remaining_len += (byte[0] as usize & 127) * multiplier;
            if byte[0] & 0x80 == 0 {
                return Ok(remaining_len);
            }
            multiplier *= 128;
        }
        Err(Error::ProtocolError)
    }

    fn read_publish(&mut self, header: u8, remaining_len: usize) -> Result<Packet, Error> {
        if remaining_len > MAX_PACKET_LEN {
            warn!("mqtt: dropping {} byte publish, too large", remaining_len);
            self.discard(remaining_len)?;
            return Ok(Packet::Other(header));
        }
        let mut packet_buf: Vec<u8, MAX_PACKET_LEN> = Vec::new();
        packet_buf
            .resize(remaining_len, 0)
            .map_err(|_| Error::ProtocolError)?;
        read_exact(&mut self.connection, &mut packet_buf, self.ack_timeout_ms)?;

        let qos = QoS::from_bits((header >> 1) & 0x03).ok_or(Error::ProtocolError)?;
        let topic_len = match packet_buf.as_slice() {
            [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]) as usize,
            _ => return Err(Error::ProtocolError),
        };
        let mut cursor = 2 + topic_len;
        let topic_bytes = packet_buf.get(2..cursor).ok_or(Error::ProtocolError)?;

        if qos != QoS::AtMostOnce {
            let id_bytes = packet_buf
                .get(cursor..cursor + 2)
                .ok_or(Error::ProtocolError)?;
            let packet_id = u16::from_be_bytes([id_bytes[0], id_bytes[1]]);
            cursor += 2;
            self.send(PUBACK, &packet_id.to_be_bytes())?;
        }

        let topic = core::str::from_utf8(topic_bytes)
            .ok()
            .and_then(|t| String::try_from(t).ok());
        let payload = Vec::from_slice(&packet_buf[cursor..]).ok();
        match (topic, payload) {
            (Some(topic), Some(payload)) => Ok(Packet::Publish(PublishPacket { topic, payload })),
            _ => {
                warn!("mqtt: dropping publish with unusable topic or payload");
                Ok(Packet::Other(header))
            }
        }
    }

    /// Consume and drop `len` bytes of a packet we cannot keep.
    fn discard(&mut self, mut len: usize) -> Result<(), Error> {
        let mut scratch = [0u8; 64];
        while len > 0 {
            let n = len.min(scratch.len());
            read_exact(&mut self.connection, &mut scratch[..n], self.ack_timeout_ms)?;
            len -= n;
        }
        Ok(())
    }
}

fn handshake<C: Connection>(connection: &mut C, options: &Options, ack_timeout_ms: u32) -> Result<(), Error> {
    let mut packet: Vec<u8, MAX_PACKET_LEN> = Vec::new();

    // --- Variable Header ---
    put(&mut packet, &(PROTOCOL_NAME.len() as u16).to_be_bytes())?;
    put(&mut packet, PROTOCOL_NAME)?;
    put(&mut packet, &[PROTOCOL_LEVEL])?;

    let mut connect_flags = 0;
    if options.clean_session {
        connect_flags |= 0x02;
    }
    if options.username.is_some() {
        connect_flags |= 0x80;
        if options.password.is_some() {
            connect_flags |= 0x40;
        }
    }
    put(&mut packet, &[connect_flags])?;
    put(&mut packet, &options.keep_alive_seconds.to_be_bytes())?;

    // --- Payload ---
    put_str(&mut packet, options.client_id)?;
    if let Some(username) = options.username {
        put_str(&mut packet, username)?;
        if let Some(password) = options.password {
            put_str(&mut packet, password)?;
        }
    }

    // --- Fixed Header ---
    let mut fixed_header: Vec<u8, 5> = Vec::new();
    fixed_header.push(CONNECT).map_err(|_| Error::ProtocolError)?;
    encode_remaining_length(&mut fixed_header, packet.len()).map_err(|_| Error::ProtocolError)?;

    // Write packet to the connection
    connection.write_all(&fixed_header)?;
    connection.write_all(&packet)?;
    connection.flush().map_err(|_| Error::WriteError)?;

    // Wait for and parse CONNACK
    let mut connack_buf = [0u8; 4];
    read_exact(connection, &mut connack_buf, ack_timeout_ms)?;

    if connack_buf[0] != CONNACK || connack_buf[1] != 2 {
        return Err(Error::ProtocolError);
    }

    // Check connection acknowledgement status
    match connack_buf[3] {
        0 => Ok(()),
        4 | 5 => Err(Error::Unauthorized),
        1..=3 => Err(Error::ConnectionRefused),
        _ => Err(Error::ProtocolError),
    }
}

/// Fill `buf` completely, waiting at most `timeout_ms` for each read.
fn read_exact<C: Connection>(connection: &mut C, buf: &mut [u8], timeout_ms: u32) -> Result<(), Error> {
    let mut total_read = 0;
    while total_read < buf.len() {
        match connection.read_timeout(&mut buf[total_read..], timeout_ms) {
            Ok(0) => return Err(Error::Timeout),
            Ok(n) => total_read += n,
            Err(e) => return Err(read_failure(&e)),
        }
    }
    Ok(())
}

/// A closed stream stays [`Error::ConnectionClosed`]; anything else is a read failure.
fn read_failure<E: TransportError>(error: &E) -> Error {
    match error.kind() {
        Error::ConnectionClosed => Error::ConnectionClosed,
        _ => Error::ReadError,
    }
}

fn put(buf: &mut Vec<u8, MAX_PACKET_LEN>, bytes: &[u8]) -> Result<(), Error> {
    buf.extend_from_slice(bytes).map_err(|_| Error::ProtocolError)
}

/// Write a length-prefixed UTF-8 string.
fn put_str(buf: &mut Vec<u8, MAX_PACKET_LEN>, s: &str) -> Result<(), Error> {
    let len = u16::try_from(s.len()).map_err(|_| Error::ProtocolError)?;
    put(buf, &len.to_be_bytes())?;
    put(buf, s.as_bytes())
}

/// Encode the remaining length field for an MQTT packet.
///
/// The remaining length field is a variable-length encoding scheme used in MQTT
/// to specify the number of bytes following the fixed header. Each byte
/// encodes 7 bits of the length value and the most significant bit indicates
/// if another byte follows, which allows values up to 268,435,455.
fn encode_remaining_length(buf: &mut Vec<u8, 5>, mut len: usize) -> Result<(), ()> {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        buf.push(byte).map_err(|_| ())?;
        if len == 0 {
            break;
        }
    }
    Ok(())
}
