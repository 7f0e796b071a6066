//! Topic subscription hub for real-time pushes.
//!
//! DESIGN
//! ======
//! A topic maps subscriber ids to bounded `mpsc` senders. Publishing clones
//! the frame into every sender with `try_send`; a full or closed channel is
//! skipped so one slow client never blocks a writer.
//!
//! Subscriptions are owned: `Hub::subscribe` returns a [`Subscription`] whose
//! `Drop` removes the entry. A websocket connection keeps its guards in a map
//! keyed by topic, so closing a topic or the connection releases everything
//! without a separate cleanup pass.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::frame::{Data, Frame};
use crate::services::chat;

// =============================================================================
// TOPICS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Chat(String),
    Inbox(Uuid),
    Community,
    Replies(Uuid),
    Pdfs,
    Quizzes,
    Courses,
    Lectures,
    Uploads(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    #[error("unknown topic: {0}")]
    Unknown(String),
    #[error("malformed topic: {0}")]
    Malformed(String),
    #[error("not allowed to subscribe to {0}")]
    Forbidden(String),
}

impl crate::frame::ErrorCode for TopicError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Unknown(_) => "E_TOPIC_UNKNOWN",
            Self::Malformed(_) => "E_TOPIC_MALFORMED",
            Self::Forbidden(_) => "E_FORBIDDEN",
        }
    }
}

impl Topic {
    /// Parse a wire topic such as `chat:a_b` or `community`.
    ///
    /// # Errors
    ///
    /// Unknown prefixes and bad ids are rejected.
    pub fn parse(raw: &str) -> Result<Self, TopicError> {
        let malformed = || TopicError::Malformed(raw.to_owned());
        let uuid = |s: &str| Uuid::parse_str(s).map_err(|_| malformed());

        match raw.split_once(':') {
            None => match raw {
                "community" => Ok(Self::Community),
                "pdfs" => Ok(Self::Pdfs),
                "quizzes" => Ok(Self::Quizzes),
                "courses" => Ok(Self::Courses),
                "lectures" => Ok(Self::Lectures),
                _ => Err(TopicError::Unknown(raw.to_owned())),
            },
            Some(("chat", id)) => {
                chat::participants(id).ok_or_else(malformed)?;
                Ok(Self::Chat(id.to_owned()))
            }
            Some(("inbox", id)) => Ok(Self::Inbox(uuid(id)?)),
            Some(("replies", id)) => Ok(Self::Replies(uuid(id)?)),
            Some(("uploads", id)) => Ok(Self::Uploads(uuid(id)?)),
            Some(_) => Err(TopicError::Unknown(raw.to_owned())),
        }
    }

    /// Private topics carry one user's data.
    #[must_use]
    pub fn is_private(&self) -> bool {
        matches!(self, Self::Chat(_) | Self::Inbox(_) | Self::Uploads(_))
    }

    /// Whether `user_id` may subscribe. Chat participation is read off the
    /// deterministic chat id, so no lookup is needed.
    #[must_use]
    pub fn allows(&self, user_id: Uuid) -> bool {
        if !self.is_private() {
            return true;
        }
        match self {
            Self::Chat(id) => chat::participants(id).is_some_and(|(a, b)| a == user_id || b == user_id),
            Self::Inbox(owner) | Self::Uploads(owner) => *owner == user_id,
            _ => false,
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat(id) => write!(f, "chat:{id}"),
            Self::Inbox(id) => write!(f, "inbox:{id}"),
            Self::Community => f.write_str("community"),
            Self::Replies(id) => write!(f, "replies:{id}"),
            Self::Pdfs => f.write_str("pdfs"),
            Self::Quizzes => f.write_str("quizzes"),
            Self::Courses => f.write_str("courses"),
            Self::Lectures => f.write_str("lectures"),
            Self::Uploads(id) => write!(f, "uploads:{id}"),
        }
    }
}

// =============================================================================
// HUB
// =============================================================================

type Subscribers = HashMap<Uuid, mpsc::Sender<Frame>>;

#[derive(Clone, Default)]
pub struct Hub {
    topics: Arc<RwLock<HashMap<Topic, Subscribers>>>,
}

impl Hub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber` on `topic`. Re-subscribing replaces the sender.
    #[must_use = "dropping the guard unsubscribes immediately"]
    pub fn subscribe(&self, topic: Topic, subscriber: Uuid, tx: mpsc::Sender<Frame>) -> Subscription {
        {
            let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
            topics.entry(topic.clone()).or_default().insert(subscriber, tx);
        }
        Subscription { hub: self.clone(), topic, subscriber }
    }

    /// Push `syscall` with `data` to every subscriber of `topic`. Returns the
    /// number of channels that accepted the frame.
    pub fn publish(&self, topic: &Topic, syscall: &str, data: Data) -> usize {
        let frame = Frame::request(syscall, data).with_topic(topic.to_string());
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        let Some(subscribers) = topics.get(topic) else {
            return 0;
        };

        let mut delivered = 0;
        for tx in subscribers.values() {
            // Best-effort: if a subscriber's channel is full, skip it.
            if tx.try_send(frame.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    #[must_use]
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        topics.get(topic).map_or(0, HashMap::len)
    }

    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn unsubscribe(&self, topic: &Topic, subscriber: Uuid) {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(subscribers) = topics.get_mut(topic) {
            subscribers.remove(&subscriber);
            if subscribers.is_empty() {
                topics.remove(topic);
            }
        }
    }
}

// =============================================================================
// SUBSCRIPTION GUARD
// =============================================================================

/// Live registration on one topic. Unsubscribes on drop.
pub struct Subscription {
    hub: Hub,
    topic: Topic,
    subscriber: Uuid,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(&self.topic, self.subscriber);
    }
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
