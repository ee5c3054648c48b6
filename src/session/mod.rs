//! Per-node session records and the process-wide coordination pieces.
//!
//! A [`Session`] is one connected node's shared record: the fields other
//! node tasks are allowed to see (who-is-online listings) or mutate (page
//! queue, invisibility). Everything else about a session — its user record,
//! terminal, input handler — stays owned by the node task running the menu
//! executor.
//!
//! # Locking
//!
//! Each session guards its mutable fields with its own mutex. The owning
//! node task writes most fields; other node tasks only touch the page queue
//! and read snapshots. Lock hold times are a few field copies, so a plain
//! `std::sync::Mutex` is right even on the async runtime.

// Rust guideline compliant 2026-02

pub mod chat;
pub mod registry;

pub use chat::{ChatMessage, ChatRoom};
pub use registry::NodeRegistry;

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Upper bound on queued pages per session; oldest entries drop first.
const PAGE_QUEUE_LIMIT: usize = 10;

/// A page waiting for the target session to poll.
#[derive(Debug, Clone)]
pub struct PageMessage {
    /// Node that sent the page.
    pub from_node: u16,
    /// Handle of the sender at send time.
    pub from_handle: String,
    /// Message body.
    pub text: String,
    /// Enqueue timestamp.
    pub sent_at: DateTime<Utc>,
}

/// Mutable state other tasks may observe, behind the session mutex.
#[derive(Debug)]
struct SessionShared {
    handle: Option<String>,
    user_id: Option<u32>,
    access_level: u8,
    location: String,
    activity: String,
    invisible: bool,
    pages: VecDeque<PageMessage>,
    width: u16,
    height: u16,
}

/// Read-only snapshot of a session for listings.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Node number.
    pub node: u16,
    /// Handle once authenticated.
    pub handle: Option<String>,
    /// User location, if known.
    pub location: String,
    /// Free-text current activity ("Main menu", "In door: LORD", ...).
    pub activity: String,
    /// Whether the session asked to be hidden from listings.
    pub invisible: bool,
    /// Connection timestamp.
    pub connected_at: DateTime<Utc>,
}

/// One connected node's shared record.
#[derive(Debug)]
pub struct Session {
    /// Node number, unique within `[1, MaxNodes]` while registered.
    pub node: u16,
    /// Connection timestamp; immutable for the session's lifetime.
    pub connected_at: DateTime<Utc>,
    /// Whether the transport is a local console (ACS atom `L`).
    pub local: bool,
    shared: Mutex<SessionShared>,
}

impl Session {
    /// Creates the shared record for a freshly accepted connection.
    #[must_use]
    pub fn new(node: u16, local: bool, width: u16, height: u16) -> Self {
        Self {
            node,
            connected_at: Utc::now(),
            local,
            shared: Mutex::new(SessionShared {
                handle: None,
                user_id: None,
                access_level: 0,
                location: String::new(),
                activity: "Connecting".to_string(),
                invisible: false,
                pages: VecDeque::new(),
                width,
                height,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionShared> {
        self.shared.lock().expect("session lock poisoned")
    }

    /// Records the authenticated user's identity on the shared record.
    pub fn set_user(&self, id: u32, handle: &str, location: &str, access_level: u8) {
        let mut shared = self.lock();
        shared.user_id = Some(id);
        shared.handle = Some(handle.to_string());
        shared.location = location.to_string();
        shared.access_level = access_level;
    }

    /// Updates the activity string shown in who-is-online listings.
    pub fn set_activity(&self, activity: &str) {
        self.lock().activity = activity.to_string();
    }

    /// Sets or clears invisibility.
    pub fn set_invisible(&self, invisible: bool) {
        self.lock().invisible = invisible;
    }

    /// Whether the session is currently invisible.
    #[must_use]
    pub fn is_invisible(&self) -> bool {
        self.lock().invisible
    }

    /// Access level recorded at authentication (0 before login).
    #[must_use]
    pub fn access_level(&self) -> u8 {
        self.lock().access_level
    }

    /// Handle recorded at authentication.
    #[must_use]
    pub fn handle(&self) -> Option<String> {
        self.lock().handle.clone()
    }

    /// Terminal dimensions recorded at accept time.
    #[must_use]
    pub fn dimensions(&self) -> (u16, u16) {
        let shared = self.lock();
        (shared.width, shared.height)
    }

    /// Queues a page for this session, dropping the oldest beyond the cap.
    pub fn enqueue_page(&self, page: PageMessage) {
        let mut shared = self.lock();
        if shared.pages.len() >= PAGE_QUEUE_LIMIT {
            shared.pages.pop_front();
        }
        shared.pages.push_back(page);
    }

    /// Takes every queued page, oldest first.
    #[must_use]
    pub fn drain_pages(&self) -> Vec<PageMessage> {
        self.lock().pages.drain(..).collect()
    }

    /// Snapshot for listings.
    #[must_use]
    pub fn info(&self) -> SessionInfo {
        let shared = self.lock();
        SessionInfo {
            node: self.node,
            handle: shared.handle.clone(),
            location: shared.location.clone(),
            activity: shared.activity.clone(),
            invisible: shared.invisible,
            connected_at: self.connected_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_queue_drops_oldest_beyond_cap() {
        let session = Session::new(1, false, 80, 25);
        for i in 0..(PAGE_QUEUE_LIMIT + 3) {
            session.enqueue_page(PageMessage {
                from_node: 2,
                from_handle: "Pager".to_string(),
                text: format!("msg {i}"),
                sent_at: Utc::now(),
            });
        }
        let pages = session.drain_pages();
        assert_eq!(pages.len(), PAGE_QUEUE_LIMIT);
        assert_eq!(pages[0].text, "msg 3");
        assert!(session.drain_pages().is_empty());
    }

    #[test]
    fn test_info_reflects_authentication() {
        let session = Session::new(3, true, 80, 25);
        assert_eq!(session.info().handle, None);
        session.set_user(9, "Raven", "Night City", 200);
        let info = session.info();
        assert_eq!(info.handle.as_deref(), Some("Raven"));
        assert_eq!(info.location, "Night City");
        assert_eq!(session.access_level(), 200);
    }
}
