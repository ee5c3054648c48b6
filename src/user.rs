//! User records and the user-store boundary.
//!
//! The engine treats the user store as an external collaborator: everything
//! it needs is behind [`UserManager`]. The shipped [`JsonUserManager`] is a
//! development store (plain-text credentials in a JSON file) good enough for
//! `boardwalk local` and the test suite; production deployments implement
//! the trait against their own account system.

// Rust guideline compliant 2026-02

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user account as the menu engine sees it.
///
/// Carries everything the ACS evaluator, prompt renderer, and drop-file
/// generator consume. Fields the engine never mutates directly (counters,
/// areas) are updated by runnables and persisted through [`UserManager::save`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable numeric record id (`U<n>` ACS atom, drop-file record number).
    pub id: u32,
    /// Login handle / alias.
    pub handle: String,
    /// Real name (drop files, sysop listings).
    pub real_name: String,
    /// City/state free text.
    #[serde(default)]
    pub location: String,
    /// Voice phone.
    #[serde(default)]
    pub home_phone: String,
    /// Data/work phone.
    #[serde(default)]
    pub work_phone: String,
    /// Access level 0-255 (`S<n>` ACS atom).
    pub access_level: u8,
    /// Flag characters (`F<c>` ACS atom, case-insensitive).
    #[serde(default)]
    pub flags: String,
    /// Whether the sysop has validated the account (`V` ACS atom).
    #[serde(default)]
    pub validated: bool,
    /// Session time limit in minutes.
    #[serde(default = "default_time_limit")]
    pub time_limit_minutes: u32,
    /// Total completed calls.
    #[serde(default)]
    pub calls_total: u32,
    /// Timestamp of the previous call.
    #[serde(default)]
    pub last_call: Option<DateTime<Utc>>,
    /// Total files uploaded.
    #[serde(default)]
    pub uploads: u32,
    /// Total files downloaded.
    #[serde(default)]
    pub downloads: u32,
    /// Kilobytes downloaded today.
    #[serde(default)]
    pub daily_kb_down: u64,
    /// Daily download allowance in kilobytes.
    #[serde(default = "default_daily_kb")]
    pub daily_kb_limit: u64,
    /// Lifetime upload volume in kilobytes.
    #[serde(default)]
    pub total_kb_up: u64,
    /// Lifetime download volume in kilobytes.
    #[serde(default)]
    pub total_kb_down: u64,
    /// File-point balance (`P<n>` ACS atom).
    #[serde(default)]
    pub file_points: u32,
    /// Sysop-only note (`Z<substr>` ACS atom).
    #[serde(default)]
    pub private_note: String,
    /// Birth date as `MM/DD/YY` free text (drop files).
    #[serde(default)]
    pub birth_date: String,
    /// Preferred terminal width; doors honor this over live resizes.
    #[serde(default = "default_width")]
    pub screen_width: u16,
    /// Preferred terminal height.
    #[serde(default = "default_height")]
    pub screen_height: u16,
    /// Expert mode suppresses long-form menu help.
    #[serde(default)]
    pub expert_mode: bool,
    /// Default pipe color for prompts.
    #[serde(default = "default_color")]
    pub default_color: u8,
    /// Banked time credits in minutes.
    #[serde(default)]
    pub time_credits: u32,
    /// Current message area pointer.
    #[serde(default)]
    pub msg_area: u32,
    /// Textual tag of the current message area.
    #[serde(default)]
    pub msg_area_tag: String,
    /// Current file area pointer.
    #[serde(default)]
    pub file_area: u32,
    /// Textual tag of the current file area.
    #[serde(default)]
    pub file_area_tag: String,
    /// File identifiers tagged for batch download.
    #[serde(default)]
    pub tagged_files: Vec<String>,
    /// Highest-read message id per area tag.
    #[serde(default)]
    pub last_read: HashMap<String, u32>,
    /// Total messages posted.
    #[serde(default)]
    pub messages_posted: u32,
    /// Total door launches.
    #[serde(default)]
    pub doors_run: u32,
    /// Files downloaded today.
    #[serde(default)]
    pub files_today: u32,
    /// Development-store credential. Real deployments keep credentials out
    /// of the user record entirely.
    #[serde(default)]
    pub password: String,
}

fn default_time_limit() -> u32 {
    60
}
fn default_daily_kb() -> u64 {
    10_240
}
fn default_width() -> u16 {
    80
}
fn default_height() -> u16 {
    25
}
fn default_color() -> u8 {
    7
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: 0,
            handle: String::new(),
            real_name: String::new(),
            location: String::new(),
            home_phone: String::new(),
            work_phone: String::new(),
            access_level: 10,
            flags: String::new(),
            validated: false,
            time_limit_minutes: default_time_limit(),
            calls_total: 0,
            last_call: None,
            uploads: 0,
            downloads: 0,
            daily_kb_down: 0,
            daily_kb_limit: default_daily_kb(),
            total_kb_up: 0,
            total_kb_down: 0,
            file_points: 0,
            private_note: String::new(),
            birth_date: String::new(),
            screen_width: default_width(),
            screen_height: default_height(),
            expert_mode: false,
            default_color: default_color(),
            time_credits: 0,
            msg_area: 0,
            msg_area_tag: String::new(),
            file_area: 0,
            file_area_tag: String::new(),
            tagged_files: Vec::new(),
            last_read: HashMap::new(),
            messages_posted: 0,
            doors_run: 0,
            files_today: 0,
            password: String::new(),
        }
    }
}

impl User {
    /// Minutes remaining this session given when the session started.
    #[must_use]
    pub fn minutes_left(&self, session_start: DateTime<Utc>) -> i64 {
        let elapsed = (Utc::now() - session_start).num_minutes();
        i64::from(self.time_limit_minutes) - elapsed
    }

    /// Toggles membership of `file_id` in the tagged-file list.
    ///
    /// Returns `true` when the file is tagged after the call.
    pub fn toggle_tagged(&mut self, file_id: &str) -> bool {
        if let Some(pos) = self.tagged_files.iter().position(|f| f == file_id) {
            self.tagged_files.remove(pos);
            false
        } else {
            self.tagged_files.push(file_id.to_string());
            true
        }
    }
}

/// Boundary to the external account store.
///
/// Implementations must be safe for concurrent use: every node task holds
/// the same manager behind an `Arc`.
pub trait UserManager: Send + Sync {
    /// Verifies credentials, returning the user on success.
    ///
    /// `Ok(None)` is a failed login; `Err` is a store fault.
    fn authenticate(&self, handle: &str, password: &str) -> Result<Option<User>>;

    /// Looks a user up by handle (case-insensitive).
    fn get_by_handle(&self, handle: &str) -> Result<Option<User>>;

    /// Persists a mutated user record.
    fn save(&self, user: &User) -> Result<()>;
}

/// JSON-file user store for development and tests.
///
/// The whole file is held in memory behind a mutex and rewritten on every
/// save; fine for a handful of accounts, not meant for a production board.
#[derive(Debug)]
pub struct JsonUserManager {
    path: PathBuf,
    users: Mutex<HashMap<String, User>>,
}

impl JsonUserManager {
    /// Loads the store from `path`, starting empty if the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        let users = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read user store {}", path.display()))?;
            let list: Vec<User> = serde_json::from_str(&raw)
                .with_context(|| format!("malformed user store {}", path.display()))?;
            list.into_iter()
                .map(|u| (u.handle.to_uppercase(), u))
                .collect()
        } else {
            HashMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            users: Mutex::new(users),
        })
    }

    /// Inserts or replaces a user without touching disk (test setup).
    pub fn insert(&self, user: User) {
        let mut users = self.users.lock().expect("user store lock poisoned");
        users.insert(user.handle.to_uppercase(), user);
    }

    fn persist(&self, users: &HashMap<String, User>) -> Result<()> {
        let mut list: Vec<&User> = users.values().collect();
        list.sort_by_key(|u| u.id);
        let raw = serde_json::to_string_pretty(&list)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("failed to write user store {}", self.path.display()))
    }
}

impl UserManager for JsonUserManager {
    fn authenticate(&self, handle: &str, password: &str) -> Result<Option<User>> {
        let users = self.users.lock().expect("user store lock poisoned");
        match users.get(&handle.to_uppercase()) {
            Some(user) if user.password == password => Ok(Some(user.clone())),
            _ => Ok(None),
        }
    }

    fn get_by_handle(&self, handle: &str) -> Result<Option<User>> {
        let users = self.users.lock().expect("user store lock poisoned");
        Ok(users.get(&handle.to_uppercase()).cloned())
    }

    fn save(&self, user: &User) -> Result<()> {
        let mut users = self.users.lock().expect("user store lock poisoned");
        users.insert(user.handle.to_uppercase(), user.clone());
        self.persist(&users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: 1,
            handle: "Phoenix".to_string(),
            real_name: "Pat Sample".to_string(),
            access_level: 50,
            password: "secret".to_string(),
            ..User::default()
        }
    }

    #[test]
    fn test_authenticate_checks_password() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mgr = JsonUserManager::load(&dir.path().join("users.json")).expect("load");
        mgr.insert(sample_user());

        assert!(mgr
            .authenticate("phoenix", "secret")
            .expect("auth")
            .is_some());
        assert!(mgr
            .authenticate("phoenix", "wrong")
            .expect("auth")
            .is_none());
        assert!(mgr.authenticate("nobody", "secret").expect("auth").is_none());
    }

    #[test]
    fn test_save_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("users.json");
        {
            let mgr = JsonUserManager::load(&path).expect("load");
            let mut user = sample_user();
            user.tagged_files.push("GAME.ZIP".to_string());
            mgr.save(&user).expect("save");
        }
        let mgr = JsonUserManager::load(&path).expect("reload");
        let user = mgr
            .get_by_handle("PHOENIX")
            .expect("get")
            .expect("user present");
        assert_eq!(user.tagged_files, vec!["GAME.ZIP".to_string()]);
    }

    #[test]
    fn test_toggle_tagged_flips_membership() {
        let mut user = sample_user();
        assert!(user.toggle_tagged("A.ZIP"));
        assert!(user.tagged_files.contains(&"A.ZIP".to_string()));
        assert!(!user.toggle_tagged("A.ZIP"));
        assert!(user.tagged_files.is_empty());
    }
}
