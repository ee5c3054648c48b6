//! Process-wide chat room: broadcast/subscribe pub/sub with bounded history.
//!
//! One room serves the whole board. Each subscriber owns an unbounded
//! receiver; [`ChatRoom::unsubscribe`] drops the matching sender, which
//! closes the channel and tells the subscriber's receiver task to exit.
//!
//! Delivery rules:
//! - [`broadcast`](ChatRoom::broadcast) fans out to every subscriber
//!   **except the sender** — the chat runnable renders the sender's own
//!   line locally so it appears instantly regardless of channel latency.
//! - [`broadcast_system`](ChatRoom::broadcast_system) reaches everyone.
//! - Messages are delivered to each subscriber in broadcast order.

// Rust guideline compliant 2026-02

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Number of messages kept for scrollback on join.
const HISTORY_LIMIT: usize = 100;

/// One chat-room message.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Sender's node (0 for system messages).
    pub node: u16,
    /// Sender's handle at send time.
    pub handle: String,
    /// Message body.
    pub text: String,
    /// Broadcast timestamp.
    pub timestamp: DateTime<Utc>,
    /// System messages render with a distinguished prefix.
    pub is_system: bool,
}

impl ChatMessage {
    fn system(text: &str) -> Self {
        Self {
            node: 0,
            handle: String::new(),
            text: text.to_string(),
            timestamp: Utc::now(),
            is_system: true,
        }
    }
}

#[derive(Debug)]
struct Subscriber {
    handle: String,
    tx: mpsc::UnboundedSender<ChatMessage>,
}

/// The board's single chat room.
#[derive(Debug, Default)]
pub struct ChatRoom {
    inner: Mutex<RoomInner>,
}

#[derive(Debug, Default)]
struct RoomInner {
    subscribers: HashMap<u16, Subscriber>,
    history: VecDeque<ChatMessage>,
}

impl RoomInner {
    fn record(&mut self, message: &ChatMessage) {
        if self.history.len() >= HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(message.clone());
    }

    fn fan_out(&mut self, message: &ChatMessage, skip_node: Option<u16>) {
        // A send only fails when the receiver is gone; drop such entries on
        // the next unsubscribe rather than mid-iteration.
        for (node, subscriber) in &self.subscribers {
            if Some(*node) == skip_node {
                continue;
            }
            let _ = subscriber.tx.send(message.clone());
        }
    }
}

impl ChatRoom {
    /// Creates an empty room.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RoomInner> {
        self.inner.lock().expect("chat room lock poisoned")
    }

    /// Joins the room, returning the message channel to drain.
    ///
    /// A node re-subscribing replaces its previous channel (the old receiver
    /// closes).
    #[must_use]
    pub fn subscribe(&self, node: u16, handle: &str) -> mpsc::UnboundedReceiver<ChatMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        inner.subscribers.insert(
            node,
            Subscriber {
                handle: handle.to_string(),
                tx,
            },
        );
        rx
    }

    /// Leaves the room; closes the channel returned by `subscribe`.
    pub fn unsubscribe(&self, node: u16) {
        self.lock().subscribers.remove(&node);
    }

    /// Broadcasts a user message to every subscriber except the sender.
    pub fn broadcast(&self, node: u16, handle: &str, text: &str) {
        let message = ChatMessage {
            node,
            handle: handle.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
            is_system: false,
        };
        let mut inner = self.lock();
        inner.record(&message);
        inner.fan_out(&message, Some(node));
    }

    /// Broadcasts a system announcement to every subscriber.
    pub fn broadcast_system(&self, text: &str) {
        let message = ChatMessage::system(text);
        let mut inner = self.lock();
        inner.record(&message);
        inner.fan_out(&message, None);
    }

    /// The last [`HISTORY_LIMIT`] messages, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<ChatMessage> {
        self.lock().history.iter().cloned().collect()
    }

    /// Current occupants as `(node, handle)`, ordered by node.
    #[must_use]
    pub fn occupants(&self) -> Vec<(u16, String)> {
        let inner = self.lock();
        let mut list: Vec<(u16, String)> = inner
            .subscribers
            .iter()
            .map(|(node, s)| (*node, s.handle.clone()))
            .collect();
        list.sort_by_key(|(node, _)| *node);
        list
    }
}
