//! # REST client
//!
//! Feed, group and data operations over the service's HTTP API. Every call:
//!
//! 1. checks its arguments locally, so malformed input costs neither budget
//!    nor a round trip,
//! 2. reserves one unit from the [`ThrottleTracker`],
//! 3. opens a fresh connection, sends one request, reads one response and
//!    closes the connection again, on every path,
//! 4. feeds the response headers back into the tracker and maps the status
//!    onto [`Error`].
//!
//! Nothing here retries; see [`RetryPolicy`](super::RetryPolicy).

use super::clock::Clock;
use super::config::Config;
use super::error::{Error, Invalid};
use super::model::{
    BatchPoint, Bounded, DataPoint, Feed, Group, GroupMembership, GroupValue, Location,
    MAX_DATA_POINTS, MAX_GROUP_VALUES, NewBatch, NewData, NewFeed, NewGroupData, NewGroupFeed,
    RateInfo, RawDataPoint, RawGroup, RawUserInfo, UserInfo,
};
use super::signer::{self, MAX_PATH_LEN, SignedRequest};
use super::throttle::{Feedback, ThrottleTracker};
use super::validate;
use crate::network::application::http::{self, Method, Response};
use crate::network::error::Error as NetworkError;
use crate::network::{Close, Connect};
use core::fmt::Write as _;
use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

/// Largest JSON body this client sends.
pub const MAX_REQUEST_BODY_LEN: usize = 1024;

/// REST view of a [`Client`](super::Client), or a standalone REST client.
///
/// Borrows configuration, connector, clock and throttle state for as long as
/// it lives.
pub struct RestClient<'c, K: Connect, T: Clock> {
    config: &'c Config,
    connector: &'c mut K,
    clock: &'c T,
    throttle: &'c mut ThrottleTracker,
}

impl<K: Connect, T: Clock> core::fmt::Debug for RestClient<'_, K, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RestClient")
            .field("config", self.config)
            .field("throttle", self.throttle)
            .finish_non_exhaustive()
    }
}

impl<'c, K: Connect, T: Clock> RestClient<'c, K, T> {
    /// Assemble a client from its parts.
    pub fn new(
        config: &'c Config,
        connector: &'c mut K,
        clock: &'c T,
        throttle: &'c mut ThrottleTracker,
    ) -> Self {
        Self {
            config,
            connector,
            clock,
            throttle,
        }
    }

    // --- Feeds ---

    /// Fetch a feed by key.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the feed does not exist, [`Error::Auth`] if the
    /// key is not accepted.
    pub fn get_feed(&mut self, key: &str) -> Result<Feed, Error> {
        validate::key(key)?;
        let path = api_path(format_args!("feeds/{key}"))?;
        let response = self.execute(Method::Get, &path, None)?;
        decode(&response.body)
    }

    /// Create a feed named `name` (lowercase letters, digits and `-`).
    pub fn create_feed(&mut self, name: &str, description: Option<&str>) -> Result<Feed, Error> {
        validate::name(name)?;
        let mut body = [0u8; MAX_REQUEST_BODY_LEN];
        let body = encode(&NewFeed { name, description }, &mut body)?;
        let response = self.execute(Method::Post, "feeds", Some(body))?;
        decode(&response.body)
    }

    /// Fetch a feed, creating it first if it does not exist yet.
    ///
    /// `key` doubles as the name of the feed to create, so it must follow the
    /// name grammar; use [`get_feed`](Self::get_feed) for group feeds
    /// (`group.feed`) and other keys that cannot be created by name.
    ///
    /// # Errors
    ///
    /// [`Invalid::Name`] before any request if `key` is not a valid name.
    pub fn get_or_create_feed(&mut self, key: &str, description: Option<&str>) -> Result<Feed, Error> {
        validate::name(key)?;
        match self.get_feed(key) {
            Err(Error::NotFound) => {
                info!("rest: feed {} missing, creating it", key);
                self.create_feed(key, description)?;
                self.get_feed(key)
            }
            other => other,
        }
    }

    /// Delete a feed and all its data.
    pub fn delete_feed(&mut self, key: &str) -> Result<(), Error> {
        validate::key(key)?;
        let path = api_path(format_args!("feeds/{key}"))?;
        self.execute(Method::Delete, &path, None).map(drop)
    }

    // --- Data ---

    /// Append a data point to a feed and return it as created.
    ///
    /// # Errors
    ///
    /// * [`Invalid::Value`] - `value` is empty or too long
    /// * [`Error::NotFound`] - the feed does not exist
    /// * [`Error::Throttle`] - the rate limit is exhausted
    pub fn send_data(
        &mut self,
        feed_key: &str,
        value: &str,
        created_at: Option<&str>,
        location: Option<Location>,
    ) -> Result<DataPoint, Error> {
        validate::key(feed_key)?;
        validate::value(value)?;
        let path = api_path(format_args!("feeds/{feed_key}/data"))?;
        let mut body = [0u8; MAX_REQUEST_BODY_LEN];
        let body = encode(&NewData::new(value, created_at, location), &mut body)?;
        let response = self.execute(Method::Post, &path, Some(body))?;
        decode::<RawDataPoint>(&response.body).map(DataPoint::from)
    }

    /// Append up to [`MAX_DATA_POINTS`] data points to a feed in one request
    /// and return them as created.
    ///
    /// # Errors
    ///
    /// * [`Invalid::Count`] - `points` is empty or longer than [`MAX_DATA_POINTS`]
    /// * [`Invalid::Value`] - a value is empty or too long
    /// * [`Invalid::Capacity`] - the points do not fit one request body
    pub fn send_batch_data(
        &mut self,
        feed_key: &str,
        points: &[BatchPoint<'_>],
    ) -> Result<Vec<DataPoint, MAX_DATA_POINTS>, Error> {
        validate::key(feed_key)?;
        validate::count(points.len(), MAX_DATA_POINTS)?;
        let mut data = Vec::new();
        for point in points {
            validate::value(point.value)?;
            data.push(NewData::from(point))
                .map_err(|_| Error::Validation(Invalid::Capacity))?;
        }
        let path = api_path(format_args!("feeds/{feed_key}/data/batch"))?;
        let mut body = [0u8; MAX_REQUEST_BODY_LEN];
        let body = encode(&NewBatch { data }, &mut body)?;
        let response = self.execute(Method::Post, &path, Some(body))?;
        let created: Bounded<RawDataPoint, MAX_DATA_POINTS> = decode(&response.body)?;
        Ok(created.0.into_iter().map(DataPoint::from).collect())
    }

    /// The most recent data point of a feed.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the feed does not exist or holds no data.
    pub fn receive_data(&mut self, feed_key: &str) -> Result<DataPoint, Error> {
        validate::key(feed_key)?;
        let path = api_path(format_args!("feeds/{feed_key}/data/last"))?;
        let response = self.execute(Method::Get, &path, None)?;
        let body = trim(&response.body);
        if body.is_empty() || body == b"null" {
            return Err(Error::NotFound);
        }
        decode::<RawDataPoint>(body).map(DataPoint::from)
    }

    /// The `n` most recent data points of a feed, newest first.
    ///
    /// `n` must be between 1 and [`MAX_DATA_POINTS`].
    pub fn receive_n_data(
        &mut self,
        feed_key: &str,
        n: usize,
    ) -> Result<Vec<DataPoint, MAX_DATA_POINTS>, Error> {
        validate::key(feed_key)?;
        validate::count(n, MAX_DATA_POINTS)?;
        let path = api_path(format_args!("feeds/{feed_key}/data?limit={n}"))?;
        let response = self.execute(Method::Get, &path, None)?;
        let raw: Vec<RawDataPoint, MAX_DATA_POINTS> = decode(&response.body)?;
        Ok(raw.into_iter().map(DataPoint::from).collect())
    }

    /// The feed's data, newest first, as far as [`MAX_DATA_POINTS`] points
    /// reach. Older points stay on the service.
    pub fn receive_all_data(&mut self, feed_key: &str) -> Result<Vec<DataPoint, MAX_DATA_POINTS>, Error> {
        validate::key(feed_key)?;
        let path = api_path(format_args!("feeds/{feed_key}/data?limit={MAX_DATA_POINTS}"))?;
        let response = self.execute(Method::Get, &path, None)?;
        let raw: Bounded<RawDataPoint, MAX_DATA_POINTS> = decode(&response.body)?;
        Ok(raw.0.into_iter().map(DataPoint::from).collect())
    }

    /// Delete one data point.
    pub fn delete_data(&mut self, feed_key: &str, data_id: &str) -> Result<(), Error> {
        validate::key(feed_key)?;
        validate::data_id(data_id)?;
        let path = api_path(format_args!("feeds/{feed_key}/data/{data_id}"))?;
        self.execute(Method::Delete, &path, None).map(drop)
    }

    // --- Groups ---

    /// Create a group named `name`.
    pub fn create_group(&mut self, name: &str, description: Option<&str>) -> Result<Group, Error> {
        validate::name(name)?;
        let mut body = [0u8; MAX_REQUEST_BODY_LEN];
        let body = encode(&NewFeed { name, description }, &mut body)?;
        let response = self.execute(Method::Post, "groups", Some(body))?;
        decode::<RawGroup>(&response.body).map(Group::from)
    }

    /// Fetch a group with its member feeds.
    pub fn get_group(&mut self, key: &str) -> Result<Group, Error> {
        validate::key(key)?;
        let path = api_path(format_args!("groups/{key}"))?;
        let response = self.execute(Method::Get, &path, None)?;
        decode::<RawGroup>(&response.body).map(Group::from)
    }

    /// Delete a group. Its feeds are kept.
    pub fn delete_group(&mut self, key: &str) -> Result<(), Error> {
        validate::key(key)?;
        let path = api_path(format_args!("groups/{key}"))?;
        self.execute(Method::Delete, &path, None).map(drop)
    }

    /// Make an existing feed a member of a group.
    pub fn add_feed_to_group(&mut self, group_key: &str, feed_key: &str) -> Result<(), Error> {
        validate::key(group_key)?;
        validate::key(feed_key)?;
        let path = api_path(format_args!("groups/{group_key}/add"))?;
        let mut body = [0u8; MAX_REQUEST_BODY_LEN];
        let body = encode(&GroupMembership { feed_key }, &mut body)?;
        self.execute(Method::Post, &path, Some(body)).map(drop)
    }

    /// Create a new feed directly inside a group.
    pub fn create_feed_in_group(&mut self, group_key: &str, name: &str) -> Result<Feed, Error> {
        validate::key(group_key)?;
        validate::name(name)?;
        let path = api_path(format_args!("groups/{group_key}/feeds"))?;
        let mut body = [0u8; MAX_REQUEST_BODY_LEN];
        let new_feed = NewGroupFeed {
            feed: NewFeed {
                name,
                description: None,
            },
        };
        let body = encode(&new_feed, &mut body)?;
        let response = self.execute(Method::Post, &path, Some(body))?;
        decode(&response.body)
    }

    /// Send one value to each of several member feeds of a group.
    pub fn send_group_data(
        &mut self,
        group_key: &str,
        values: &[(&str, &str)],
        location: Option<Location>,
    ) -> Result<(), Error> {
        validate::key(group_key)?;
        validate::count(values.len(), MAX_GROUP_VALUES)?;
        let mut feeds = Vec::new();
        for &(key, value) in values {
            validate::key(key)?;
            validate::value(value)?;
            feeds
                .push(GroupValue { key, value })
                .map_err(|_| Error::Validation(Invalid::Capacity))?;
        }
        let data = NewGroupData {
            feeds,
            lat: location.map(|l| l.lat),
            lon: location.map(|l| l.lon),
            ele: location.and_then(|l| l.ele),
        };
        let path = api_path(format_args!("groups/{group_key}/data"))?;
        let mut body = [0u8; MAX_REQUEST_BODY_LEN];
        let body = encode(&data, &mut body)?;
        self.execute(Method::Post, &path, Some(body)).map(drop)
    }

    // --- Account ---

    /// The account's data rate, also used to resynchronise the throttle
    /// tracker.
    pub fn rate_info(&mut self) -> Result<RateInfo, Error> {
        let response = self.execute(Method::Get, "throttle", None)?;
        let info: RateInfo = decode(&response.body)?;
        self.throttle.sync(&info, self.clock.now_ms());
        Ok(info)
    }

    /// The account behind the configured key.
    pub fn user_info(&mut self) -> Result<UserInfo, Error> {
        let signed = signer::sign_absolute(self.config, Method::Get, "/api/v2/user", None)?;
        let response = self.send(&signed)?;
        decode::<RawUserInfo>(&response.body).map(|raw| raw.user)
    }

    fn execute(&mut self, method: Method, path: &str, body: Option<&[u8]>) -> Result<Response, Error> {
        let signed = signer::sign(self.config, method, path, body)?;
        self.send(&signed)
    }

    /// Issue one request: reserve, connect, exchange, close, map.
    fn send(&mut self, signed: &SignedRequest<'_>) -> Result<Response, Error> {
        let (method, path) = (signed.method, signed.path.as_str());
        self.throttle.reserve(self.clock.now_ms())?;

        let remote = self.config.http.remote();
        let connection = self.connector.connect(&remote).map_err(|_| {
            warn!("rest: cannot reach {}:{}", remote.host, remote.port);
            Error::Connect(NetworkError::ConnectionRefused)
        })?;

        let mut client = http::Client::new(connection).with_timeout(self.config.request_timeout_ms);
        let exchanged = client.request(&signed.request());
        if client.into_inner().close().is_err() {
            debug!("rest: close after {} {} failed", method.as_str(), path);
        }
        let response = exchanged.map_err(|e| {
            warn!("rest: {} {} failed: {}", method.as_str(), path, e);
            Error::Connect(e)
        })?;

        let now = self.clock.now_ms();
        self.throttle.observe(Feedback::Response(&response), now);
        if response.is_success() {
            trace!("rest: {} {} -> {}", method.as_str(), path, response.status_code);
            Ok(response)
        } else {
            warn!("rest: {} {} -> {}", method.as_str(), path, response.status_code);
            Err(Error::from_status(
                response.status_code,
                self.throttle.retry_after_ms(now),
            ))
        }
    }
}

fn api_path(args: core::fmt::Arguments<'_>) -> Result<String<MAX_PATH_LEN>, Error> {
    let mut path = String::new();
    path.write_fmt(args)
        .map_err(|_| Error::Validation(Invalid::Capacity))?;
    Ok(path)
}

fn encode<'b, S: Serialize>(value: &S, buf: &'b mut [u8]) -> Result<&'b [u8], Error> {
    let len = serde_json_core::to_slice(value, buf).map_err(|_| Error::Validation(Invalid::Capacity))?;
    Ok(&buf[..len])
}

fn decode<'de, D: Deserialize<'de>>(body: &'de [u8]) -> Result<D, Error> {
    match serde_json_core::from_slice::<D>(body) {
        Ok((value, _)) => Ok(value),
        Err(_) => {
            warn!("rest: undecodable {} byte body", body.len());
            Err(Error::Decode)
        }
    }
}

fn trim(body: &[u8]) -> &[u8] {
    let start = body.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(body.len());
    let end = body.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &body[start..end]
}
