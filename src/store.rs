//! Opaque message and file repositories.
//!
//! The engine treats both stores as external collaborators reached through
//! narrow traits: the list overlays need headers and bodies, the file
//! browser needs entries with descriptions. The in-memory implementations
//! back `boardwalk local` and the tests; they can seed themselves from a
//! JSON file in the board data directory.

// Rust guideline compliant 2026-02

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Header of one stored message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Message id, unique within its area.
    pub id: u32,
    /// Area tag the message lives in.
    pub area: String,
    /// Author handle.
    pub from: String,
    /// Recipient handle or `All`.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Post timestamp.
    pub posted_at: DateTime<Utc>,
}

/// A full message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Header fields.
    pub header: MessageHeader,
    /// Body text (pipe codes allowed).
    pub body: String,
}

/// One file-base entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Stable identifier used in the user's tagged-file list.
    pub id: String,
    /// Area tag the entry lives in.
    pub area: String,
    /// Display filename.
    pub name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Uploader handle.
    pub uploader: String,
    /// Upload timestamp.
    pub uploaded_at: DateTime<Utc>,
    /// Long description; word-wrapped by the file list overlay.
    pub description: String,
    /// On-disk location, when the store knows it (viewing, transfers).
    #[serde(default)]
    pub path: Option<std::path::PathBuf>,
}

/// Read access to the message base.
pub trait MessageStore: Send + Sync {
    /// Known area tags.
    fn area_tags(&self) -> Vec<String>;
    /// Headers in an area, ascending by id.
    fn headers(&self, area: &str) -> Result<Vec<MessageHeader>>;
    /// Full message by area and id.
    fn read(&self, area: &str, id: u32) -> Result<Option<Message>>;
}

/// Read access to the file base.
pub trait FileStore: Send + Sync {
    /// Known area tags.
    fn area_tags(&self) -> Vec<String>;
    /// Entries in an area, newest first.
    fn entries(&self, area: &str) -> Result<Vec<FileEntry>>;
}

/// In-memory message base, optionally seeded from JSON.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    messages: Mutex<HashMap<String, Vec<Message>>>,
}

impl InMemoryMessageStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store from a JSON array of [`Message`], if the file exists.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let store = Self::new();
        if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read message base {}", path.display()))?;
            let list: Vec<Message> = serde_json::from_str(&raw)
                .with_context(|| format!("malformed message base {}", path.display()))?;
            for message in list {
                store.insert(message);
            }
        }
        Ok(store)
    }

    /// Adds a message under its area tag.
    pub fn insert(&self, message: Message) {
        let mut messages = self.messages.lock().expect("message store lock poisoned");
        messages
            .entry(message.header.area.to_uppercase())
            .or_default()
            .push(message);
    }
}

impl MessageStore for InMemoryMessageStore {
    fn area_tags(&self) -> Vec<String> {
        let messages = self.messages.lock().expect("message store lock poisoned");
        let mut tags: Vec<String> = messages.keys().cloned().collect();
        tags.sort();
        tags
    }

    fn headers(&self, area: &str) -> Result<Vec<MessageHeader>> {
        let messages = self.messages.lock().expect("message store lock poisoned");
        let mut headers: Vec<MessageHeader> = messages
            .get(&area.to_uppercase())
            .map(|list| list.iter().map(|m| m.header.clone()).collect())
            .unwrap_or_default();
        headers.sort_by_key(|h| h.id);
        Ok(headers)
    }

    fn read(&self, area: &str, id: u32) -> Result<Option<Message>> {
        let messages = self.messages.lock().expect("message store lock poisoned");
        Ok(messages
            .get(&area.to_uppercase())
            .and_then(|list| list.iter().find(|m| m.header.id == id))
            .cloned())
    }
}

/// In-memory file base, optionally seeded from JSON.
#[derive(Debug, Default)]
pub struct InMemoryFileStore {
    entries: Mutex<HashMap<String, Vec<FileEntry>>>,
}

impl InMemoryFileStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store from a JSON array of [`FileEntry`], if the file
    /// exists.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let store = Self::new();
        if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read file base {}", path.display()))?;
            let list: Vec<FileEntry> = serde_json::from_str(&raw)
                .with_context(|| format!("malformed file base {}", path.display()))?;
            for entry in list {
                store.insert(entry);
            }
        }
        Ok(store)
    }

    /// Adds an entry under its area tag.
    pub fn insert(&self, entry: FileEntry) {
        let mut entries = self.entries.lock().expect("file store lock poisoned");
        entries
            .entry(entry.area.to_uppercase())
            .or_default()
            .push(entry);
    }
}

impl FileStore for InMemoryFileStore {
    fn area_tags(&self) -> Vec<String> {
        let entries = self.entries.lock().expect("file store lock poisoned");
        let mut tags: Vec<String> = entries.keys().cloned().collect();
        tags.sort();
        tags
    }

    fn entries(&self, area: &str) -> Result<Vec<FileEntry>> {
        let entries = self.entries.lock().expect("file store lock poisoned");
        let mut list = entries
            .get(&area.to_uppercase())
            .cloned()
            .unwrap_or_default();
        list.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(area: &str, id: u32, subject: &str) -> Message {
        Message {
            header: MessageHeader {
                id,
                area: area.to_string(),
                from: "Author".to_string(),
                to: "All".to_string(),
                subject: subject.to_string(),
                posted_at: Utc::now(),
            },
            body: "body".to_string(),
        }
    }

    #[test]
    fn test_headers_sorted_by_id_and_area_insensitive() {
        let store = InMemoryMessageStore::new();
        store.insert(message("general", 3, "third"));
        store.insert(message("GENERAL", 1, "first"));
        let headers = store.headers("General").expect("headers");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].id, 1);
        assert_eq!(headers[1].id, 3);
    }

    #[test]
    fn test_read_finds_message_by_id() {
        let store = InMemoryMessageStore::new();
        store.insert(message("GENERAL", 7, "hello"));
        let found = store.read("GENERAL", 7).expect("read").expect("present");
        assert_eq!(found.header.subject, "hello");
        assert!(store.read("GENERAL", 8).expect("read").is_none());
    }

    #[test]
    fn test_file_entries_newest_first() {
        let store = InMemoryFileStore::new();
        let older = FileEntry {
            id: "OLD.ZIP".to_string(),
            area: "UPLOADS".to_string(),
            name: "OLD.ZIP".to_string(),
            size_bytes: 100,
            uploader: "A".to_string(),
            uploaded_at: Utc::now() - chrono::Duration::days(2),
            description: "old".to_string(),
            path: None,
        };
        let newer = FileEntry {
            id: "NEW.ZIP".to_string(),
            uploaded_at: Utc::now(),
            ..older.clone()
        };
        store.insert(older);
        store.insert(newer);
        let entries = store.entries("uploads").expect("entries");
        assert_eq!(entries[0].id, "NEW.ZIP");
    }
}
