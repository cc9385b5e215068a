//! Subscriber bookkeeping for pub/sub commands.
//!
//! The [`Bus`] is a bounded table of `(topic, stream)` pairs with exact
//! byte-for-byte topic matching. A topic is held exclusively: once any
//! stream subscribes it, further SUBSCRIBEs of that topic are refused
//! until it is released, so a PUBLISH reaches at most one subscriber.
//! Delivery itself is not done here: PUBLISH hands the push frame to a
//! [`Fanout`], which routes it to the holder's own output.

use tracing::debug;

/// Identifies one logical input/output stream (one connection, one serial
/// link). Assigned by the embedding layer.
pub type StreamId = u64;

/// Upper bound on concurrently held subscriptions, across all streams.
pub const MAX_SUBSCRIPTIONS: usize = 32;

/// Routes an encoded push frame to a subscriber's own output.
pub trait Fanout {
    fn deliver(&mut self, stream: StreamId, frame: &[u8]);
}

/// Subscription errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeError {
    /// Some stream already holds this topic.
    TopicHeld,
    /// The subscription table is full.
    TableFull,
}

impl std::fmt::Display for SubscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscribeError::TopicHeld => write!(f, "topic already subscribed"),
            SubscribeError::TableFull => write!(f, "subscription table full"),
        }
    }
}

impl std::error::Error for SubscribeError {}

struct Subscription {
    topic: Vec<u8>,
    stream: StreamId,
}

/// Bounded subscription table.
#[derive(Default)]
pub struct Bus {
    subs: Vec<Subscription>,
}

impl Bus {
    pub fn new() -> Self {
        Bus { subs: Vec::new() }
    }

    /// Register `(stream, topic)`. A topic held by any stream, this one
    /// included, is refused. Returns the number of topics the stream is
    /// subscribed to afterwards.
    pub fn subscribe(&mut self, stream: StreamId, topic: &[u8]) -> Result<usize, SubscribeError> {
        if self.subs.iter().any(|s| s.topic == topic) {
            return Err(SubscribeError::TopicHeld);
        }
        if self.subs.len() >= MAX_SUBSCRIPTIONS {
            return Err(SubscribeError::TableFull);
        }
        self.subs.push(Subscription {
            topic: topic.to_vec(),
            stream,
        });
        debug!(
            stream,
            topic = %String::from_utf8_lossy(topic),
            "Subscribed"
        );
        Ok(self.count_for(stream))
    }

    /// Remove one subscription; returns whether it was held.
    pub fn unsubscribe(&mut self, stream: StreamId, topic: &[u8]) -> bool {
        let before = self.subs.len();
        self.subs
            .retain(|s| !(s.stream == stream && s.topic == topic));
        let removed = self.subs.len() != before;
        if removed {
            debug!(
                stream,
                topic = %String::from_utf8_lossy(topic),
                "Unsubscribed"
            );
        }
        removed
    }

    /// Drop every subscription a stream holds; returns how many were
    /// removed. Called on transport close as well as by bare UNSUBSCRIBE.
    pub fn unsubscribe_all(&mut self, stream: StreamId) -> usize {
        let before = self.subs.len();
        self.subs.retain(|s| s.stream != stream);
        let removed = before - self.subs.len();
        if removed > 0 {
            debug!(stream, removed, "Dropped all subscriptions");
        }
        removed
    }

    /// Number of topics a stream is subscribed to.
    pub fn count_for(&self, stream: StreamId) -> usize {
        self.subs.iter().filter(|s| s.stream == stream).count()
    }

    /// Streams subscribed to `topic` — at most one under the exclusive-hold
    /// rule, but walked as an iterator so delivery code has one shape.
    pub fn subscribers<'a>(&'a self, topic: &'a [u8]) -> impl Iterator<Item = StreamId> + 'a {
        self.subs
            .iter()
            .filter(move |s| s.topic == topic)
            .map(|s| s.stream)
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }
}
