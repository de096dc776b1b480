use crate::mock::{BrokenConnection, MockConnection};
use feedlink::network::application::mqtt::{Client, Options, Packet, QoS};
use feedlink::network::error::Error;

const CONNACK_OK: &[u8] = &[0x20, 0x02, 0x00, 0x00];

fn options() -> Options<'static> {
    Options {
        client_id: "dev",
        keep_alive_seconds: 60,
        clean_session: true,
        username: Some("u"),
        password: Some("p"),
    }
}

fn connected(inbound: &[u8]) -> Client<MockConnection> {
    let mut script = CONNACK_OK.to_vec();
    script.extend_from_slice(inbound);
    Client::connect(MockConnection::new(&script), &options(), 1_000).unwrap()
}

/// Bytes written after the CONNECT packet.
fn sent_after_connect(client: &Client<MockConnection>) -> &[u8] {
    let written = client.connection().written_data();
    let connect_len = 2 + written[1] as usize;
    &written[connect_len..]
}

#[test]
fn test_connect_packet() {
    let client = connected(&[]);
    let expected: &[u8] = &[
        0x10, 21, // fixed header
        0, 4, b'M', b'Q', b'T', b'T', 4, // protocol
        0xC2, // clean session, username, password
        0, 60, // keep-alive
        0, 3, b'd', b'e', b'v', // client id
        0, 1, b'u', // username
        0, 1, b'p', // password
    ];
    assert_eq!(client.connection().written_data(), expected);
}

#[test]
fn test_connack_codes() {
    let refused = |code: u8| {
        let conn = MockConnection::new(&[0x20, 0x02, 0x00, code]);
        Client::connect(conn, &options(), 1_000).err()
    };
    assert_eq!(refused(5), Some(Error::Unauthorized));
    assert_eq!(refused(4), Some(Error::Unauthorized));
    assert_eq!(refused(2), Some(Error::ConnectionRefused));
    assert_eq!(refused(9), Some(Error::ProtocolError));
}

#[test]
fn test_missing_connack_times_out() {
    let result = Client::connect(MockConnection::new(&[]), &options(), 1_000);
    assert_eq!(result.err(), Some(Error::Timeout));
}

#[test]
fn test_publish_qos0() {
    let mut client = connected(&[]);
    client.publish("a/b", b"hi", QoS::AtMostOnce).unwrap();
    assert_eq!(
        sent_after_connect(&client),
        &[0x30, 7, 0, 3, b'a', b'/', b'b', b'h', b'i']
    );
}

#[test]
fn test_publish_qos1_carries_packet_id() {
    let mut client = connected(&[]);
    client.publish("a/b", b"hi", QoS::AtLeastOnce).unwrap();
    assert_eq!(
        sent_after_connect(&client),
        &[0x32, 9, 0, 3, b'a', b'/', b'b', 0, 1, b'h', b'i']
    );
}

#[test]
fn test_oversized_publish_is_rejected() {
    let mut client = connected(&[]);
    let payload = [0u8; 2048];
    assert_eq!(
        client.publish("a/b", &payload, QoS::AtMostOnce),
        Err(Error::ProtocolError)
    );
}

#[test]
fn test_subscribe_and_suback() {
    let mut client = connected(&[0x90, 3, 0, 1, 1, 0x90, 3, 0, 2, 0x80]);

    assert_eq!(client.subscribe("a/b", QoS::AtLeastOnce), Ok(1));
    assert_eq!(
        sent_after_connect(&client),
        &[0x82, 8, 0, 1, 0, 3, b'a', b'/', b'b', 1]
    );
    assert_eq!(
        client.poll(100),
        Ok(Some(Packet::SubAck {
            packet_id: 1,
            granted: Some(QoS::AtLeastOnce)
        }))
    );

    assert_eq!(client.subscribe("c", QoS::AtLeastOnce), Ok(2));
    assert_eq!(
        client.poll(100),
        Ok(Some(Packet::SubAck {
            packet_id: 2,
            granted: None
        }))
    );
}

#[test]
fn test_unsubscribe_and_unsuback() {
    let mut client = connected(&[0xB0, 2, 0, 1]);
    assert_eq!(client.unsubscribe("a/b"), Ok(1));
    assert_eq!(
        sent_after_connect(&client),
        &[0xA2, 7, 0, 1, 0, 3, b'a', b'/', b'b']
    );
    assert_eq!(client.poll(100), Ok(Some(Packet::UnsubAck { packet_id: 1 })));
}

#[test]
fn test_inbound_qos1_publish_is_acknowledged() {
    let mut client = connected(&[0x32, 8, 0, 3, b'a', b'/', b'b', 0, 7, b'x']);

    match client.poll(100) {
        Ok(Some(Packet::Publish(publish))) => {
            assert_eq!(publish.topic.as_str(), "a/b");
            assert_eq!(&publish.payload[..], b"x");
        }
        other => panic!("expected a publish, got {other:?}"),
    }
    assert_eq!(sent_after_connect(&client), &[0x40, 2, 0, 7]);
    assert_eq!(client.poll(100), Ok(None));
}

#[test]
fn test_ping() {
    let mut client = connected(&[0xD0, 0]);
    client.ping().unwrap();
    assert_eq!(sent_after_connect(&client), &[0xC0, 0]);
    assert_eq!(client.poll(100), Ok(Some(Packet::PingResp)));
}

#[test]
fn test_unknown_packet_is_skipped() {
    // An unexpected PUBREL with its body, then a PINGRESP.
    let mut client = connected(&[0x62, 2, 0, 9, 0xD0, 0]);
    assert_eq!(client.poll(100), Ok(Some(Packet::Other(0x62))));
    assert_eq!(client.poll(100), Ok(Some(Packet::PingResp)));
}

#[test]
fn test_disconnect_sends_packet() {
    let conn = MockConnection::new(CONNACK_OK);
    let mut client = Client::connect(conn, &options(), 1_000).unwrap();
    client.ping().unwrap();
    assert!(client.disconnect().is_ok());
}

#[test]
fn test_closed_stream_is_an_error_not_silence() {
    let mut script = CONNACK_OK.to_vec();
    script.extend_from_slice(&[0xD0, 0]);
    let conn = MockConnection::closing(&script);
    let mut client = Client::connect(conn, &options(), 1_000).unwrap();

    assert_eq!(client.poll(100), Ok(Some(Packet::PingResp)));
    assert_eq!(client.poll(100), Err(Error::ConnectionClosed));
    assert_eq!(client.poll(100), Err(Error::ConnectionClosed));
}

#[test]
fn test_close_mid_packet() {
    let mut script = CONNACK_OK.to_vec();
    // PUBLISH announcing 20 bytes, of which 3 arrive.
    script.extend_from_slice(&[0x30, 20, 0, 4, b'a']);
    let mut client = Client::connect(MockConnection::closing(&script), &options(), 1_000).unwrap();
    assert_eq!(client.poll(100), Err(Error::ConnectionClosed));
}

#[test]
fn test_broken_transport() {
    assert_eq!(
        Client::connect(BrokenConnection, &options(), 1_000).err(),
        Some(Error::WriteError)
    );
}
