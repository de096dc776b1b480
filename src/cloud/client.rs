//! The account-level facade.

use super::clock::Clock;
use super::config::Config;
use super::dispatch::Handler;
use super::rest::RestClient;
use super::session::{Link, Session, SessionState};
use super::throttle::ThrottleTracker;
use super::topic::Message;
use crate::network::Connect;

/// One device's connection to one account.
///
/// Owns the configuration, the connector that opens transports, the clock
/// and the rate-limit state. REST calls and the messaging session are
/// borrowed views over these, so both see the same throttle budget:
///
/// ```rust,no_run
/// # use feedlink::cloud::{Client, Clock, Config, Message};
/// # use feedlink::network::Connect;
/// # fn demo<K: Connect, T: Clock>(connector: K, clock: T) -> Result<(), feedlink::cloud::Error> {
/// let config = Config::new("adabot", "aio_key")?;
/// let mut client: Client<K, T> = Client::new(config, connector, clock);
///
/// client.rest().send_data("temperature", "21.5", None, None)?;
///
/// let mut session = client.session();
/// session.connect()?;
/// session.subscribe_feed("setpoint", |message: &Message<'_>| {
///     if let Message::FeedUpdate { value, .. } = message {
///         log::info!("new setpoint {}", value);
///     }
/// })?;
/// loop {
///     session.poll(1_000)?;
/// }
/// # }
/// ```
///
/// `H` is the handler type stored per subscription. The default, a plain
/// function pointer, accepts non-capturing closures; use a concrete closure
/// type or `&mut dyn FnMut(&Message<'_>)` for handlers with state.
pub struct Client<K: Connect, T: Clock, H: Handler = fn(&Message<'_>)> {
    config: Config,
    connector: K,
    clock: T,
    throttle: ThrottleTracker,
    link: Link<K::Connection, H>,
}

impl<K: Connect, T: Clock, H: Handler> core::fmt::Debug for Client<K, T, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("throttle", &self.throttle)
            .field("state", &self.link.state())
            .finish_non_exhaustive()
    }
}

impl<K: Connect, T: Clock, H: Handler> Client<K, T, H> {
    /// A client with no open transport and an unknown rate budget.
    pub fn new(config: Config, connector: K, clock: T) -> Self {
        Self {
            config,
            connector,
            clock,
            throttle: ThrottleTracker::new(),
            link: Link::new(),
        }
    }

    /// REST operations.
    pub fn rest(&mut self) -> RestClient<'_, K, T> {
        RestClient::new(
            &self.config,
            &mut self.connector,
            &self.clock,
            &mut self.throttle,
        )
    }

    /// The messaging session.
    pub fn session(&mut self) -> Session<'_, K, T, H> {
        Session::new(
            &self.config,
            &mut self.connector,
            &mut self.clock,
            &mut self.throttle,
            &mut self.link,
        )
    }

    /// Configuration the client was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared rate-limit state.
    pub fn throttle(&self) -> &ThrottleTracker {
        &self.throttle
    }

    /// Lifecycle state of the messaging session.
    pub fn state(&self) -> SessionState {
        self.link.state()
    }

    /// The connector.
    pub fn connector(&self) -> &K {
        &self.connector
    }

    /// The connector, mutably.
    pub fn connector_mut(&mut self) -> &mut K {
        &mut self.connector
    }

    /// The clock.
    pub fn clock(&self) -> &T {
        &self.clock
    }
}
