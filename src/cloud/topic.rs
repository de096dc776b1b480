//! # Topic codec
//!
//! The broker names everything `<user>/<kind>/<key>`:
//!
//! | topic                         | direction | payload                          |
//! |-------------------------------|-----------|----------------------------------|
//! | `<user>/feeds/<key>`          | both      | the value as text                |
//! | `<user>/feeds/<key>/csv`      | publish   | `value,lat,lon,ele`              |
//! | `<user>/feeds/<key>/get`      | publish   | anything; asks for the last value|
//! | `<user>/groups/<key>`         | both      | `{"feeds":{"<key>":"<value>"}}`  |
//! | `<user>/throttle`             | receive   | text with a "N seconds" hint     |
//! | `<user>/errors`               | receive   | text                             |
//! | `time/seconds`, `time/millis`, `time/ISO-8601` | receive | the broker's clock  |
//!
//! The short forms `f` and `g` are accepted when parsing. [`classify`] turns
//! an inbound topic and payload into a [`Message`] exactly once; anything it
//! does not understand becomes [`Message::Unrecognized`] rather than an error.

use super::error::{Error, Invalid};
use super::model::{self, MAX_GROUP_VALUES, MAX_KEY_LEN, MAX_VALUE_LEN};
use super::validate;
use core::fmt::Write as _;
use heapless::{LinearMap, String};
use serde::Deserialize;

pub use crate::network::application::mqtt::client::MAX_TOPIC_LEN;

/// Feed key to value, as carried by a group update.
pub type GroupValues = LinearMap<String<MAX_KEY_LEN>, String<MAX_VALUE_LEN>, MAX_GROUP_VALUES>;

/// Clock formats the broker publishes under `time/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeFormat {
    /// Seconds since the Unix epoch.
    Seconds,
    /// Milliseconds since the Unix epoch.
    Millis,
    /// An ISO 8601 timestamp.
    Iso8601,
}

impl TimeFormat {
    /// The topic level naming this format.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFormat::Seconds => "seconds",
            TimeFormat::Millis => "millis",
            TimeFormat::Iso8601 => "ISO-8601",
        }
    }

    fn from_level(level: &str) -> Option<Self> {
        match level {
            "seconds" => Some(TimeFormat::Seconds),
            "millis" => Some(TimeFormat::Millis),
            "ISO-8601" => Some(TimeFormat::Iso8601),
            _ => None,
        }
    }
}

/// A topic of the service's naming scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Topic<'a> {
    /// Values of one feed, owned by `user`.
    Feed {
        /// Owner of the feed.
        user: &'a str,
        /// Feed key.
        key: &'a str,
    },
    /// Publish a value with its location.
    FeedCsv {
        /// Owner of the feed.
        user: &'a str,
        /// Feed key.
        key: &'a str,
    },
    /// Ask the broker to republish the feed's last value.
    FeedGet {
        /// Owner of the feed.
        user: &'a str,
        /// Feed key.
        key: &'a str,
    },
    /// Values of all feeds of one group.
    Group {
        /// Owner of the group.
        user: &'a str,
        /// Group key.
        key: &'a str,
    },
    /// Rate-limit notices for `user`.
    Throttle {
        /// Account the notices are about.
        user: &'a str,
    },
    /// Rejected publishes and subscriptions of `user`.
    Errors {
        /// Account the notices are about.
        user: &'a str,
    },
    /// The broker's clock. Not tied to an account.
    Time {
        /// Representation published on this topic.
        format: TimeFormat,
    },
}

impl<'a> Topic<'a> {
    /// Render the topic name.
    ///
    /// # Errors
    ///
    /// * [`Invalid::Key`] - the key breaks the key grammar
    /// * [`Invalid::Topic`] - the user name cannot appear in a topic
    /// * [`Invalid::Capacity`] - the name is longer than [`MAX_TOPIC_LEN`]
    pub fn build(&self) -> Result<String<MAX_TOPIC_LEN>, Error> {
        if self.user().is_some_and(|user| !validate::user(user)) {
            return Err(Error::Validation(Invalid::Topic));
        }
        let mut topic: String<MAX_TOPIC_LEN> = String::new();
        let written = match *self {
            Topic::Feed { user, key } => {
                validate::key(key)?;
                write!(topic, "{user}/feeds/{key}")
            }
            Topic::FeedCsv { user, key } => {
                validate::key(key)?;
                write!(topic, "{user}/feeds/{key}/csv")
            }
            Topic::FeedGet { user, key } => {
                validate::key(key)?;
                write!(topic, "{user}/feeds/{key}/get")
            }
            Topic::Group { user, key } => {
                validate::key(key)?;
                write!(topic, "{user}/groups/{key}")
            }
            Topic::Throttle { user } => write!(topic, "{user}/throttle"),
            Topic::Errors { user } => write!(topic, "{user}/errors"),
            Topic::Time { format } => write!(topic, "time/{}", format.as_str()),
        };
        written.map_err(|_| Error::Validation(Invalid::Capacity))?;
        Ok(topic)
    }

    /// Recognise a topic name, or `None` if it is not part of the scheme.
    pub fn parse(topic: &'a str) -> Option<Self> {
        if let Some(format) = topic.strip_prefix("time/").and_then(TimeFormat::from_level) {
            return Some(Topic::Time { format });
        }

        let mut levels = topic.split('/');
        let user = levels.next().filter(|u| validate::user(u))?;
        let kind = levels.next()?;
        let key = levels.next();
        let suffix = levels.next();
        if levels.next().is_some() {
            return None;
        }

        let Some(key) = key else {
            return match kind {
                "throttle" => Some(Topic::Throttle { user }),
                "errors" => Some(Topic::Errors { user }),
                _ => None,
            };
        };
        validate::key(key).ok()?;
        match (kind, suffix) {
            ("feeds" | "f", None) => Some(Topic::Feed { user, key }),
            ("feeds" | "f", Some("csv")) => Some(Topic::FeedCsv { user, key }),
            ("feeds" | "f", Some("get")) => Some(Topic::FeedGet { user, key }),
            ("groups" | "g", None) => Some(Topic::Group { user, key }),
            _ => None,
        }
    }

    /// The account the topic belongs to, `None` for the broker's clock.
    pub fn user(&self) -> Option<&'a str> {
        match *self {
            Topic::Feed { user, .. }
            | Topic::FeedCsv { user, .. }
            | Topic::FeedGet { user, .. }
            | Topic::Group { user, .. }
            | Topic::Throttle { user }
            | Topic::Errors { user } => Some(user),
            Topic::Time { .. } => None,
        }
    }

    /// Whether the broker delivers messages on this topic.
    pub fn is_subscribable(&self) -> bool {
        !matches!(self, Topic::FeedCsv { .. } | Topic::FeedGet { .. })
    }

    /// Whether the broker accepts publishes on this topic.
    pub fn is_publishable(&self) -> bool {
        !matches!(
            self,
            Topic::Throttle { .. } | Topic::Errors { .. } | Topic::Time { .. }
        )
    }
}

/// An inbound message, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum Message<'a> {
    /// A new value on a feed.
    FeedUpdate {
        /// Owner of the feed; differs from the configured user for shared feeds.
        owner: &'a str,
        /// Feed key.
        feed_key: &'a str,
        /// The value as text.
        value: &'a str,
    },
    /// New values on feeds of a group.
    GroupUpdate {
        /// Group key.
        group_key: &'a str,
        /// Member feed key to value.
        values: GroupValues,
    },
    /// The account is being rate limited.
    ThrottleNotice {
        /// Notice as sent by the service.
        text: &'a str,
        /// Seconds to wait, when the notice states it.
        retry_after_secs: Option<u32>,
    },
    /// The service rejected a publish or subscription.
    ErrorNotice {
        /// Notice as sent by the service.
        text: &'a str,
    },
    /// A tick of the broker's clock.
    Time {
        /// Representation of `value`.
        format: TimeFormat,
        /// The time as text, e.g. `1700000000` or `2023-11-14T22:13:20.000Z`.
        value: &'a str,
    },
    /// Not part of the scheme, or a payload of the wrong shape.
    Unrecognized {
        /// Topic the message arrived on.
        topic: &'a str,
        /// Raw payload.
        payload: &'a [u8],
    },
}

#[derive(Deserialize)]
struct GroupPayload {
    #[serde(deserialize_with = "model::bounded_map")]
    feeds: GroupValues,
}

/// Classify an inbound message. Never fails.
pub fn classify<'a>(topic: &'a str, payload: &'a [u8]) -> Message<'a> {
    let unrecognized = Message::Unrecognized { topic, payload };
    let text = core::str::from_utf8(payload).ok();

    match (Topic::parse(topic), text) {
        (Some(Topic::Feed { user, key }), Some(value)) if !value.is_empty() => Message::FeedUpdate {
            owner: user,
            feed_key: key,
            value,
        },
        (Some(Topic::Group { key, .. }), _) => {
            match serde_json_core::from_slice::<GroupPayload>(payload) {
                Ok((group, _)) => Message::GroupUpdate {
                    group_key: key,
                    values: group.feeds,
                },
                Err(_) => unrecognized,
            }
        }
        (Some(Topic::Throttle { .. }), Some(text)) => Message::ThrottleNotice {
            text,
            retry_after_secs: retry_hint(text),
        },
        (Some(Topic::Errors { .. }), Some(text)) => Message::ErrorNotice { text },
        (Some(Topic::Time { format }), Some(value)) if !value.is_empty() => Message::Time { format, value },
        _ => unrecognized,
    }
}

/// Find "N seconds" in a throttle notice.
pub fn retry_hint(text: &str) -> Option<u32> {
    let mut previous: Option<&str> = None;
    for word in text.split(|c: char| c.is_whitespace() || c == ',') {
        if word.is_empty() {
            continue;
        }
        if word.starts_with("second") {
            if let Some(secs) = previous.and_then(|p| p.parse::<u32>().ok()) {
                return Some(secs);
            }
        }
        previous = Some(word);
    }
    None
}
