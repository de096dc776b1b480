//! Against the real service. Needs `AIO_USERNAME` and `AIO_KEY` in the
//! environment or a `.env` file; run with `cargo test -- --ignored`.
//!
//! Plaintext ports are used because the test connector has no TLS.

use dotenvy::dotenv;
use feedlink::cloud::{Client, Clock, Config, DEFAULT_HOST, Message};
use feedlink::network::error::Error as NetError;
use feedlink::network::{Close, Connect, Connection, Read, Remote, Write};
use rand::Rng;
use std::cell::RefCell;
use std::env;
use std::io::{Read as StdRead, Write as StdWrite};
use std::net::TcpStream;
use std::rc::Rc;
use std::time::{Duration, Instant};

struct NetConnection {
    stream: TcpStream,
}

impl Read for NetConnection {
    type Error = NetError;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.read_timeout(buf, 5_000)
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error> {
        let timeout = Duration::from_millis(u64::from(timeout_ms.max(1)));
        self.stream
            .set_read_timeout(Some(timeout))
            .map_err(|_| NetError::ReadError)?;
        match self.stream.read(buf) {
            // End of stream: the peer closed.
            Ok(0) if !buf.is_empty() => Err(NetError::ConnectionClosed),
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                Ok(0)
            }
            Err(_) => Err(NetError::ReadError),
        }
    }
}

impl Write for NetConnection {
    type Error = NetError;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.stream.write(buf).map_err(|_| NetError::WriteError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.stream.flush().map_err(|_| NetError::WriteError)
    }
}

impl Close for NetConnection {
    type Error = NetError;

    fn close(self) -> Result<(), Self::Error> {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
        Ok(())
    }
}

impl Connection for NetConnection {}

struct TcpConnector;

impl Connect for TcpConnector {
    type Connection = NetConnection;
    type Error = NetError;

    fn connect(&mut self, remote: &Remote<'_>) -> Result<NetConnection, NetError> {
        if remote.tls {
            return Err(NetError::InvalidAddress);
        }
        let stream = TcpStream::connect((remote.host, remote.port))
            .map_err(|_| NetError::ConnectionRefused)?;
        Ok(NetConnection { stream })
    }
}

struct WallClock(Instant);

impl Clock for WallClock {
    fn now_ms(&self) -> u64 {
        self.0.elapsed().as_millis() as u64
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

fn live_config() -> Option<Config> {
    dotenv().ok();
    let user = env::var("AIO_USERNAME").ok()?;
    let key = env::var("AIO_KEY").ok()?;
    let client_id = format!("feedlink-{:08x}", rand::thread_rng().r#gen::<u32>());
    let config = Config::new(&user, &key)
        .ok()?
        .with_http(DEFAULT_HOST, 80, false)
        .ok()?
        .with_mqtt(DEFAULT_HOST, 1883, false)
        .ok()?
        .with_client_id(&client_id)
        .ok()?;
    Some(config)
}

#[test]
#[ignore]
fn test_live_round_trip() {
    let Some(config) = live_config() else {
        eprintln!("AIO_USERNAME/AIO_KEY not set, skipping");
        return;
    };
    let feed_key = format!("feedlink-test-{}", rand::thread_rng().gen_range(1000..9999));
    let value = format!("{}", rand::thread_rng().gen_range(0..100));
    let seen = Rc::new(RefCell::new(Vec::<String>::new()));

    let mut client: Client<_, _, Box<dyn FnMut(&Message<'_>)>> =
        Client::new(config, TcpConnector, WallClock(Instant::now()));

    client.rest().create_feed(&feed_key, Some("feedlink live test")).unwrap();
    client.rest().send_data(&feed_key, &value, None, None).unwrap();
    let last = client.rest().receive_data(&feed_key).unwrap();
    assert_eq!(last.value.as_str(), value);

    {
        let mut session = client.session();
        session.connect().unwrap();
        let sink = seen.clone();
        session
            .subscribe_feed(
                &feed_key,
                Box::new(move |message: &Message<'_>| {
                    if let Message::FeedUpdate { value, .. } = message {
                        sink.borrow_mut().push(value.to_string());
                    }
                }),
            )
            .unwrap();
        session.publish_data(&feed_key, "42", None).unwrap();
        for _ in 0..10 {
            if session.poll(1_000).unwrap() > 0 {
                break;
            }
        }
        session.disconnect().unwrap();
    }
    assert_eq!(*seen.borrow(), ["42"]);

    client.rest().delete_feed(&feed_key).unwrap();
}
