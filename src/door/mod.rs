//! External door programs.
//!
//! A door is an interactive subprocess that talks raw CP437 bytes to the
//! remote terminal through a PTY and learns about the caller from drop
//! files. Door configs are JSON records in the board's `doors/` directory;
//! a menu command `DOOR:LORD` loads `doors/LORD.json` and hands it to the
//! platform runner.
//!
//! Door support requires PTY allocation and is compiled only on Unix; other
//! platforms get a stub whose runner reports "not supported" to the user
//! without failing the session.

// Rust guideline compliant 2026-02

pub mod dropfile;

#[cfg(unix)]
mod runner;
#[cfg(unix)]
pub use runner::run_door;

#[cfg(not(unix))]
mod runner_stub;
#[cfg(not(unix))]
pub use runner_stub::run_door;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::user::User;

use dropfile::DropFileKind;

/// One door's launch configuration (`doors/<NAME>.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct DoorConfig {
    /// Program to execute (or the DOS emulator for `dos` doors). `~` is
    /// expanded.
    pub command: String,
    /// Arguments; substitution tokens like `{NODE}` are replaced before
    /// launch.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory; defaults to the per-node drop-file directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Extra environment; values go through substitution too.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Drop files to write; all four when omitted.
    #[serde(default)]
    pub drop_files: Option<Vec<DropFileKind>>,
    /// Whether the PTY master goes into raw mode for the door's lifetime.
    #[serde(default)]
    pub raw_terminal: bool,
    /// DOS door: `command` is the emulator, the per-node directory is
    /// mapped into its filesystem via the arg template.
    #[serde(default)]
    pub dos: bool,
}

impl DoorConfig {
    /// The drop-file set this door wants.
    #[must_use]
    pub fn drop_file_kinds(&self) -> Vec<DropFileKind> {
        self.drop_files
            .clone()
            .unwrap_or_else(|| DropFileKind::all().to_vec())
    }
}

/// Directory of door configs.
#[derive(Debug, Clone)]
pub struct DoorSet {
    dir: PathBuf,
}

impl DoorSet {
    /// Wraps the board's `doors/` directory.
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Loads `doors/<NAME>.json`.
    pub fn load(&self, name: &str) -> Result<DoorConfig> {
        let path = self.dir.join(format!("{}.json", name.to_uppercase()));
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read door config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("malformed door config {}", path.display()))
    }
}

/// Everything substitution and drop files need about the launch.
#[derive(Debug, Clone, Copy)]
pub struct DoorLaunch<'a> {
    /// The caller.
    pub user: &'a User,
    /// Node number.
    pub node: u16,
    /// Board name.
    pub board_name: &'a str,
    /// Sysop display name.
    pub sysop_name: &'a str,
    /// Session start (time-left calculations).
    pub session_start: DateTime<Utc>,
}

impl DoorLaunch<'_> {
    fn minutes_left(&self) -> i64 {
        self.user.minutes_left(self.session_start).max(0)
    }

    /// The substitution table applied to args and env values.
    ///
    /// `DROPDIR` is resolved by the runner once the per-node directory
    /// exists.
    #[must_use]
    pub fn substitutions(&self, drop_dir: &Path) -> Vec<(&'static str, String)> {
        vec![
            ("{NODE}", self.node.to_string()),
            ("{PORT}", "0".to_string()),
            ("{TIMELEFT}", self.minutes_left().to_string()),
            ("{BAUD}", "38400".to_string()),
            ("{USERHANDLE}", self.user.handle.clone()),
            ("{USERID}", self.user.id.to_string()),
            ("{REALNAME}", self.user.real_name.clone()),
            ("{LEVEL}", self.user.access_level.to_string()),
            ("{DROPDIR}", drop_dir.display().to_string()),
        ]
    }

    /// Standard environment injected into every door.
    #[must_use]
    pub fn standard_env(&self, width: u16, height: u16) -> Vec<(&'static str, String)> {
        vec![
            ("BBS_USERHANDLE", self.user.handle.clone()),
            ("BBS_USERID", self.user.id.to_string()),
            ("BBS_NODE", self.node.to_string()),
            ("BBS_TIMELEFT", self.minutes_left().to_string()),
            ("LINES", height.to_string()),
            ("COLUMNS", width.to_string()),
        ]
    }

    /// Drop-file context view of the same facts.
    #[must_use]
    pub fn dropfile_context(&self) -> dropfile::DropFileContext<'_> {
        dropfile::DropFileContext {
            user: self.user,
            node: self.node,
            board_name: self.board_name,
            sysop_name: self.sysop_name,
            session_start: self.session_start,
        }
    }
}

/// Applies the substitution table to one string.
#[must_use]
pub fn substitute(template: &str, table: &[(&'static str, String)]) -> String {
    let mut out = template.to_string();
    for (token, value) in table {
        if out.contains(token) {
            out = out.replace(token, value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launch_user() -> User {
        User {
            id: 9,
            handle: "Nomad".to_string(),
            real_name: "Nora Mad".to_string(),
            access_level: 50,
            time_limit_minutes: 45,
            ..User::default()
        }
    }

    #[test]
    fn test_substitution_table_applies() {
        let user = launch_user();
        let launch = DoorLaunch {
            user: &user,
            node: 4,
            board_name: "Testboard",
            sysop_name: "Op",
            session_start: Utc::now(),
        };
        let table = launch.substitutions(Path::new("/tmp/node4"));
        let arg = substitute("-n {NODE} -u {USERHANDLE} -d {DROPDIR}", &table);
        assert_eq!(arg, "-n 4 -u Nomad -d /tmp/node4");
        // No token, no change.
        assert_eq!(substitute("plain", &table), "plain");
    }

    #[test]
    fn test_standard_env_includes_dimensions() {
        let user = launch_user();
        let launch = DoorLaunch {
            user: &user,
            node: 4,
            board_name: "Testboard",
            sysop_name: "Op",
            session_start: Utc::now(),
        };
        let env = launch.standard_env(80, 25);
        assert!(env.contains(&("COLUMNS", "80".to_string())));
        assert!(env.contains(&("LINES", "25".to_string())));
        assert!(env.contains(&("BBS_NODE", "4".to_string())));
    }

    #[test]
    fn test_door_config_defaults() {
        let config: DoorConfig =
            serde_json::from_str(r#"{"command": "/usr/bin/lord"}"#).expect("parse");
        assert!(config.args.is_empty());
        assert!(!config.raw_terminal);
        assert!(!config.dos);
        assert_eq!(config.drop_file_kinds().len(), 4);
    }

    #[test]
    fn test_door_config_named_drop_files() {
        let config: DoorConfig = serde_json::from_str(
            r#"{"command": "/usr/bin/lord", "drop_files": ["DOOR32.SYS"], "raw_terminal": true}"#,
        )
        .expect("parse");
        assert_eq!(config.drop_file_kinds(), vec![DropFileKind::Door32Sys]);
        assert!(config.raw_terminal);
    }

    #[test]
    fn test_door_set_loads_by_uppercase_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("LORD.json"),
            r#"{"command": "/usr/bin/lord"}"#,
        )
        .expect("write");
        let doors = DoorSet::new(dir.path());
        assert!(doors.load("lord").is_ok());
        assert!(doors.load("TW2002").is_err());
    }
}
