//! Subscription table: topic to handler.

use super::error::{Error, Invalid};
use super::topic::{MAX_TOPIC_LEN, Message, Topic};
use heapless::{FnvIndexMap, String};

/// Most topics one session can be subscribed to. Must be a power of two.
pub const MAX_SUBSCRIPTIONS: usize = 8;

/// Receives classified messages for one subscription.
///
/// Closures taking `&Message<'_>` implement it, so most callers never name
/// the trait. Handlers run on the caller's thread, inside
/// [`Session::poll`](super::Session::poll).
pub trait Handler {
    /// Handle one message.
    fn call(&mut self, message: &Message<'_>);
}

impl<F> Handler for F
where
    F: FnMut(&Message<'_>),
{
    fn call(&mut self, message: &Message<'_>) {
        self(message)
    }
}

/// Subscribed topics and their handlers.
pub struct Registry<H> {
    handlers: FnvIndexMap<String<MAX_TOPIC_LEN>, H, MAX_SUBSCRIPTIONS>,
}

impl<H> core::fmt::Debug for Registry<H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.handlers.keys()).finish()
    }
}

impl<H: Handler> Registry<H> {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            handlers: FnvIndexMap::new(),
        }
    }

    /// Bind `topic` to `handler`, returning the handler it replaces.
    ///
    /// # Errors
    ///
    /// [`Invalid::Capacity`] when the table is full or the topic too long.
    pub fn insert(&mut self, topic: &str, handler: H) -> Result<Option<H>, Error> {
        let key = String::try_from(topic).map_err(|_| Error::Validation(Invalid::Capacity))?;
        self.handlers
            .insert(key, handler)
            .map_err(|_| Error::Validation(Invalid::Capacity))
    }

    /// Drop the binding for `topic`.
    pub fn remove(&mut self, topic: &str) -> Option<H> {
        let key = self.handlers.keys().find(|k| k.as_str() == topic)?.clone();
        self.handlers.remove(&key)
    }

    /// Whether `topic` is bound.
    pub fn contains(&self, topic: &str) -> bool {
        self.handlers.keys().any(|k| k.as_str() == topic)
    }

    /// Whether another, new topic can be bound.
    pub fn has_room_for(&self, topic: &str) -> bool {
        self.contains(topic) || self.handlers.len() < MAX_SUBSCRIPTIONS
    }

    /// The `index`-th bound topic.
    pub fn topic(&self, index: usize) -> Option<&str> {
        self.handlers.keys().nth(index).map(|k| k.as_str())
    }

    /// Bound topics.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(|k| k.as_str())
    }

    /// Number of bound topics.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no topic is bound.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke the handler bound to `topic`.
    ///
    /// A topic matches its binding literally, or when both name the same
    /// place in the scheme (`adabot/f/temp` reaches `adabot/feeds/temp`).
    /// Returns whether a handler ran.
    pub fn dispatch(&mut self, topic: &str, message: &Message<'_>) -> bool {
        let parsed = Topic::parse(topic);
        let handler = self.handlers.iter_mut().find_map(|(bound, handler)| {
            let same = bound.as_str() == topic
                || (parsed.is_some() && Topic::parse(bound) == parsed);
            same.then_some(handler)
        });
        match handler {
            Some(handler) => {
                handler.call(message);
                true
            }
            None => false,
        }
    }
}

impl<H: Handler> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}
