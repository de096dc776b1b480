//! Feeds, groups and data points as the service describes them.
//!
//! Response types own their text in fixed-capacity `heapless` strings so they
//! outlive the response buffer they were decoded from. Fields the service
//! sends but this crate does not model are skipped while decoding.

use core::fmt;
use core::marker::PhantomData;
use heapless::{LinearMap, String, Vec};
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};

/// Longest feed or group key.
pub const MAX_KEY_LEN: usize = 128;
/// Longest feed or group name.
pub const MAX_NAME_LEN: usize = 128;
/// Longest description kept from a response.
pub const MAX_DESCRIPTION_LEN: usize = 256;
/// Longest data value, in bytes.
pub const MAX_VALUE_LEN: usize = 256;
/// Longest server-assigned data point id.
pub const MAX_ID_LEN: usize = 32;
/// Longest timestamp string (ISO 8601).
pub const MAX_TIMESTAMP_LEN: usize = 32;
/// Most member feeds kept from a group. Further members are dropped.
pub const MAX_GROUP_FEEDS: usize = 8;
/// Most values in one group publish, and most kept from a group update.
pub const MAX_GROUP_VALUES: usize = 8;
/// Most data points returned by one `receive_n_data` or `receive_all_data`
/// call, and most sent by one `send_batch_data` call.
pub const MAX_DATA_POINTS: usize = 8;
/// Longest user name kept from the user endpoint.
pub const MAX_USERNAME_LEN: usize = 64;

/// Who can read a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Anyone with the link.
    Public,
    /// The owner and users it was shared with.
    #[default]
    Private,
}

/// A named time series of data points.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Feed {
    /// Numeric id assigned by the service.
    #[serde(default)]
    pub id: Option<u32>,
    /// URL-safe identifier, unique per account.
    pub key: String<MAX_KEY_LEN>,
    /// Display name.
    #[serde(default)]
    pub name: String<MAX_NAME_LEN>,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String<MAX_DESCRIPTION_LEN>>,
    /// Who can read the feed.
    #[serde(default)]
    pub visibility: Visibility,
    /// Most recent value, if any data has been sent.
    #[serde(default)]
    pub last_value: Option<String<MAX_VALUE_LEN>>,
}

/// An ordered collection of feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Numeric id assigned by the service.
    pub id: Option<u32>,
    /// URL-safe identifier, unique per account.
    pub key: String<MAX_KEY_LEN>,
    /// Display name.
    pub name: String<MAX_NAME_LEN>,
    /// Free-text description.
    pub description: Option<String<MAX_DESCRIPTION_LEN>>,
    /// Keys of the member feeds, in the order the service lists them.
    pub feeds: Vec<String<MAX_KEY_LEN>, MAX_GROUP_FEEDS>,
}

/// Where a data point was recorded, in double precision.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Location {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Elevation in meters.
    pub ele: Option<f64>,
}

impl Location {
    /// A location without elevation.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon, ele: None }
    }

    /// Add an elevation.
    pub fn with_elevation(mut self, ele: f64) -> Self {
        self.ele = Some(ele);
        self
    }
}

/// One value recorded on a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint {
    /// Server-assigned id. Only present once the point was created.
    pub id: Option<String<MAX_ID_LEN>>,
    /// Text-encoded value.
    pub value: String<MAX_VALUE_LEN>,
    /// Feed the point belongs to.
    pub feed_key: Option<String<MAX_KEY_LEN>>,
    /// Creation time as reported by the service.
    pub created_at: Option<String<MAX_TIMESTAMP_LEN>>,
    /// Where the point was recorded.
    pub location: Option<Location>,
}

/// One value of a [`send_batch_data`](super::RestClient::send_batch_data) call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchPoint<'a> {
    /// Text-encoded value.
    pub value: &'a str,
    /// Creation time to record instead of the arrival time.
    pub created_at: Option<&'a str>,
    /// Where the value was recorded.
    pub location: Option<Location>,
}

impl<'a> BatchPoint<'a> {
    /// A bare value.
    pub fn new(value: &'a str) -> Self {
        Self {
            value,
            created_at: None,
            location: None,
        }
    }

    /// Record the value at `location`.
    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

/// The account behind the configured key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    /// Numeric id assigned by the service.
    #[serde(default)]
    pub id: Option<u32>,
    /// Login name, the first level of every topic.
    pub username: String<MAX_USERNAME_LEN>,
    /// Display name.
    #[serde(default)]
    pub name: Option<String<MAX_NAME_LEN>>,
    /// Time zone the account is configured for.
    #[serde(default)]
    pub time_zone: Option<String<MAX_NAME_LEN>>,
}

/// Envelope of the user endpoint.
#[derive(Deserialize)]
pub(crate) struct RawUserInfo {
    pub user: UserInfo,
}

/// The account's data rate as reported by the throttle endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RateInfo {
    /// Data points allowed per minute.
    pub data_rate_limit: u32,
    /// Data points used in the current window.
    #[serde(default)]
    pub active_data_rate: u32,
}

impl RateInfo {
    /// Data points left in the current window.
    pub fn remaining(&self) -> u32 {
        self.data_rate_limit.saturating_sub(self.active_data_rate)
    }
}

// --- Wire shapes ---

#[derive(Deserialize)]
pub(crate) struct RawGroup {
    #[serde(default)]
    id: Option<u32>,
    key: String<MAX_KEY_LEN>,
    #[serde(default)]
    name: String<MAX_NAME_LEN>,
    #[serde(default)]
    description: Option<String<MAX_DESCRIPTION_LEN>>,
    #[serde(default)]
    feeds: Bounded<RawMember, MAX_GROUP_FEEDS>,
}

#[derive(Deserialize)]
struct RawMember {
    key: String<MAX_KEY_LEN>,
}

impl From<RawGroup> for Group {
    fn from(raw: RawGroup) -> Self {
        Group {
            id: raw.id,
            key: raw.key,
            name: raw.name,
            description: raw.description,
            feeds: raw
                .feeds
                .0
                .into_iter()
                .map(|member| member.key)
                .collect(),
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct RawDataPoint {
    #[serde(default)]
    id: Option<String<MAX_ID_LEN>>,
    #[serde(default)]
    value: Option<String<MAX_VALUE_LEN>>,
    #[serde(default)]
    feed_key: Option<String<MAX_KEY_LEN>>,
    #[serde(default)]
    created_at: Option<String<MAX_TIMESTAMP_LEN>>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    ele: Option<f64>,
}

impl From<RawDataPoint> for DataPoint {
    fn from(raw: RawDataPoint) -> Self {
        let location = match (raw.lat, raw.lon) {
            (Some(lat), Some(lon)) => Some(Location {
                lat,
                lon,
                ele: raw.ele,
            }),
            _ => None,
        };
        DataPoint {
            id: raw.id,
            value: raw.value.unwrap_or_default(),
            feed_key: raw.feed_key,
            created_at: raw.created_at,
            location,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct NewFeed<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
}

#[derive(Serialize)]
pub(crate) struct NewGroupFeed<'a> {
    pub feed: NewFeed<'a>,
}

#[derive(Serialize)]
pub(crate) struct GroupMembership<'a> {
    pub feed_key: &'a str,
}

#[derive(Serialize)]
pub(crate) struct NewData<'a> {
    pub value: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ele: Option<f64>,
}

impl<'a> NewData<'a> {
    pub(crate) fn new(value: &'a str, created_at: Option<&'a str>, location: Option<Location>) -> Self {
        Self {
            value,
            created_at,
            lat: location.map(|l| l.lat),
            lon: location.map(|l| l.lon),
            ele: location.and_then(|l| l.ele),
        }
    }
}

impl<'a> From<&BatchPoint<'a>> for NewData<'a> {
    fn from(point: &BatchPoint<'a>) -> Self {
        NewData::new(point.value, point.created_at, point.location)
    }
}

#[derive(Serialize)]
pub(crate) struct NewBatch<'a> {
    pub data: Vec<NewData<'a>, MAX_DATA_POINTS>,
}

#[derive(Serialize)]
pub(crate) struct GroupValue<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

#[derive(Serialize)]
pub(crate) struct NewGroupData<'a> {
    pub feeds: Vec<GroupValue<'a>, MAX_GROUP_VALUES>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ele: Option<f64>,
}

// --- Bounded collections ---

/// A JSON array (or `null`) decoded into at most `N` elements.
///
/// Elements past capacity are parsed and dropped, so a response that lists
/// more than the device can hold still decodes.
pub(crate) struct Bounded<T, const N: usize>(pub Vec<T, N>);

impl<T, const N: usize> Default for Bounded<T, N> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<'de, T: Deserialize<'de>, const N: usize> Deserialize<'de> for Bounded<T, N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SeqVisitor<T, const N: usize>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>, const N: usize> Visitor<'de> for SeqVisitor<T, N> {
            type Value = Bounded<T, N>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an array or null")
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(Bounded::default())
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(Bounded::default())
            }

            fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
                deserializer.deserialize_seq(self)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut items = Vec::new();
                while !items.is_full() {
                    match seq.next_element()? {
                        Some(item) => {
                            let _ = items.push(item);
                        }
                        None => return Ok(Bounded(items)),
                    }
                }
                let mut dropped: usize = 0;
                while seq.next_element::<IgnoredAny>()?.is_some() {
                    dropped += 1;
                }
                if dropped > 0 {
                    debug!("model: kept {} elements, dropped {}", N, dropped);
                }
                Ok(Bounded(items))
            }
        }

        deserializer.deserialize_option(SeqVisitor(PhantomData))
    }
}

/// Decode a JSON object into at most `N` entries, dropping the rest.
pub(crate) fn bounded_map<'de, D, K, V, const N: usize>(
    deserializer: D,
) -> Result<LinearMap<K, V, N>, D::Error>
where
    D: Deserializer<'de>,
    K: Deserialize<'de> + Eq,
    V: Deserialize<'de>,
{
    struct MapVisitor<K, V, const N: usize>(PhantomData<(K, V)>);

    impl<'de, K, V, const N: usize> Visitor<'de> for MapVisitor<K, V, N>
    where
        K: Deserialize<'de> + Eq,
        V: Deserialize<'de>,
    {
        type Value = LinearMap<K, V, N>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an object")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut entries = LinearMap::new();
            while entries.len() < N {
                match access.next_entry::<K, V>()? {
                    Some((key, value)) => {
                        let _ = entries.insert(key, value);
                    }
                    None => return Ok(entries),
                }
            }
            let mut dropped: usize = 0;
            while access.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {
                dropped += 1;
            }
            if dropped > 0 {
                debug!("model: kept {} entries, dropped {}", N, dropped);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(MapVisitor(PhantomData))
}
