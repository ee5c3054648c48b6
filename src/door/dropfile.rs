//! Legacy drop-file generation.
//!
//! Doors learn about the caller from fixed-format CRLF text files written to
//! a per-node directory before launch: `DOOR.SYS` (52 lines), `DOOR32.SYS`
//! (11), `DORINFO1.DEF` (13), `CHAIN.TXT` (30). The line counts and field
//! orders are load-bearing — decades-old door binaries index these files by
//! line number — so each generator is a literal, ordered list.

// Rust guideline compliant 2026-02

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user::User;

/// Supported drop-file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropFileKind {
    /// 52-line GAP/PCBoard-style `DOOR.SYS`.
    #[serde(rename = "DOOR.SYS")]
    DoorSys,
    /// 11-line Mystic-style `DOOR32.SYS`.
    #[serde(rename = "DOOR32.SYS")]
    Door32Sys,
    /// 13-line RBBS `DORINFO1.DEF`.
    #[serde(rename = "DORINFO1.DEF")]
    Dorinfo1Def,
    /// 30-line WWIV `CHAIN.TXT`.
    #[serde(rename = "CHAIN.TXT")]
    ChainTxt,
}

impl DropFileKind {
    /// Filename the door expects.
    #[must_use]
    pub fn filename(self) -> &'static str {
        match self {
            Self::DoorSys => "DOOR.SYS",
            Self::Door32Sys => "DOOR32.SYS",
            Self::Dorinfo1Def => "DORINFO1.DEF",
            Self::ChainTxt => "CHAIN.TXT",
        }
    }

    /// Every supported format, the default set written for a door.
    #[must_use]
    pub fn all() -> [Self; 4] {
        [Self::DoorSys, Self::Door32Sys, Self::Dorinfo1Def, Self::ChainTxt]
    }
}

/// Session facts the generators draw from.
#[derive(Debug, Clone, Copy)]
pub struct DropFileContext<'a> {
    /// The caller.
    pub user: &'a User,
    /// Node number.
    pub node: u16,
    /// Board name (doubles as sysop name in `DOOR.SYS`).
    pub board_name: &'a str,
    /// Sysop display name.
    pub sysop_name: &'a str,
    /// Session start, for time-left fields.
    pub session_start: DateTime<Utc>,
}

impl DropFileContext<'_> {
    fn minutes_left(&self) -> i64 {
        self.user.minutes_left(self.session_start).max(0)
    }

    fn seconds_left(&self) -> i64 {
        self.minutes_left() * 60
    }

    fn last_call_date(&self) -> String {
        self.user
            .last_call
            .map_or_else(|| "01/01/80".to_string(), |t| t.format("%m/%d/%y").to_string())
    }

    fn last_call_time(&self) -> String {
        self.user
            .last_call
            .map_or_else(|| "00:00".to_string(), |t| t.format("%H:%M").to_string())
    }
}

/// Renders one drop file as CRLF text.
#[must_use]
pub fn render(kind: DropFileKind, ctx: &DropFileContext<'_>) -> String {
    let lines = match kind {
        DropFileKind::DoorSys => door_sys_lines(ctx),
        DropFileKind::Door32Sys => door32_sys_lines(ctx),
        DropFileKind::Dorinfo1Def => dorinfo1_lines(ctx),
        DropFileKind::ChainTxt => chain_txt_lines(ctx),
    };
    let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 2).sum());
    for line in lines {
        out.push_str(&line);
        out.push_str("\r\n");
    }
    out
}

/// Writes the named drop files into `dir`, returning their paths.
pub fn write_drop_files(
    dir: &Path,
    kinds: &[DropFileKind],
    ctx: &DropFileContext<'_>,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let path = dir.join(kind.filename());
        std::fs::write(&path, render(*kind, ctx))
            .with_context(|| format!("failed to write drop file {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

fn door_sys_lines(ctx: &DropFileContext<'_>) -> Vec<String> {
    let u = ctx.user;
    let now = Utc::now();
    vec![
        "COM1:".to_string(),                           // 1  COM port
        "38400".to_string(),                           // 2  baud
        "8".to_string(),                               // 3  data bits
        ctx.node.to_string(),                          // 4  node
        "38400".to_string(),                           // 5  locked baud
        "Y".to_string(),                               // 6  screen on
        "N".to_string(),                               // 7  printer
        "Y".to_string(),                               // 8  page bell
        "Y".to_string(),                               // 9  caller alarm
        u.real_name.clone(),                           // 10 full name
        u.location.clone(),                            // 11 location
        u.home_phone.clone(),                          // 12 home phone
        u.work_phone.clone(),                          // 13 work phone
        "XXXXXXXX".to_string(),                        // 14 password placeholder
        u.access_level.to_string(),                    // 15 security level
        u.calls_total.to_string(),                     // 16 total calls
        ctx.last_call_date(),                          // 17 last call date
        ctx.seconds_left().to_string(),                // 18 seconds left
        u.time_limit_minutes.to_string(),              // 19 time limit
        "GR".to_string(),                              // 20 graphics mode
        u.screen_height.to_string(),                   // 21 screen height
        if u.expert_mode { "Y" } else { "N" }.to_string(), // 22 expert mode
        String::new(),                                 // 23 conferences registered
        String::new(),                                 // 24 conference exited
        String::new(),                                 // 25 expiration
        u.id.to_string(),                              // 26 user record number
        String::new(),                                 // 27 default protocol
        u.uploads.to_string(),                         // 28 total uploads
        u.downloads.to_string(),                       // 29 total downloads
        u.daily_kb_down.to_string(),                   // 30 daily K down
        u.daily_kb_limit.to_string(),                  // 31 daily K allowed
        u.birth_date.clone(),                          // 32 birth date
        String::new(),                                 // 33 main-dir path
        String::new(),                                 // 34 gen-dir path
        ctx.board_name.to_string(),                    // 35 sysop name (== BBS name)
        u.handle.clone(),                              // 36 handle
        "none".to_string(),                            // 37 next event
        "Y".to_string(),                               // 38 error-free
        "N".to_string(),                               // 39 always-N
        "Y".to_string(),                               // 40 always-Y
        u.default_color.to_string(),                   // 41 default color
        u.time_credits.to_string(),                    // 42 time credits
        ctx.last_call_date(),                          // 43 last new-file scan
        now.format("%H:%M").to_string(),               // 44 time of this call
        ctx.last_call_time(),                          // 45 time of last call
        "999".to_string(),                             // 46 max daily files
        u.files_today.to_string(),                     // 47 files downloaded today
        u.total_kb_up.to_string(),                     // 48 total K up
        u.total_kb_down.to_string(),                   // 49 total K down
        u.private_note.clone(),                        // 50 comment
        u.doors_run.to_string(),                       // 51 total doors
        u.messages_posted.to_string(),                 // 52 total messages
    ]
}

fn door32_sys_lines(ctx: &DropFileContext<'_>) -> Vec<String> {
    let u = ctx.user;
    vec![
        "0".to_string(),                  // 1  comm type (local)
        "0".to_string(),                  // 2  comm/socket handle
        "38400".to_string(),              // 3  baud
        ctx.board_name.to_string(),       // 4  BBS name
        u.id.to_string(),                 // 5  user record number
        u.real_name.clone(),              // 6  real name
        u.handle.clone(),                 // 7  handle
        u.access_level.to_string(),       // 8  access level
        ctx.minutes_left().to_string(),   // 9  minutes remaining
        "1".to_string(),                  // 10 emulation (ANSI)
        ctx.node.to_string(),             // 11 node number
    ]
}

fn dorinfo1_lines(ctx: &DropFileContext<'_>) -> Vec<String> {
    let u = ctx.user;
    let mut names = u.real_name.split_whitespace();
    let first = names.next().unwrap_or("").to_string();
    let last = names.collect::<Vec<_>>().join(" ");
    vec![
        ctx.board_name.to_string(),          // 1  BBS name
        "Sysop".to_string(),                 // 2  sysop first name
        String::new(),                       // 3  sysop last name
        "COM1".to_string(),                  // 4  port
        "115200 BAUD,N,8,1".to_string(),     // 5  port settings
        "0".to_string(),                     // 6  networked
        first,                               // 7  user first name
        last,                                // 8  user last name
        u.location.clone(),                  // 9  location
        "1".to_string(),                     // 10 graphics
        u.access_level.to_string(),          // 11 security level
        ctx.minutes_left().to_string(),      // 12 minutes remaining
        "-1".to_string(),                    // 13 FOSSIL
    ]
}

/// User-preference dimension with a fallback for unset records.
fn fallback_dim(value: u16, fallback: u16) -> u16 {
    if value == 0 {
        fallback
    } else {
        value
    }
}

fn chain_txt_lines(ctx: &DropFileContext<'_>) -> Vec<String> {
    let u = ctx.user;
    let now = Utc::now();
    vec![
        u.id.to_string(),                          // 1  user record number
        u.handle.clone(),                          // 2  handle
        u.real_name.clone(),                       // 3  real name
        String::new(),                             // 4  callsign
        "0".to_string(),                           // 5  age
        "M".to_string(),                           // 6  sex
        "0.00".to_string(),                        // 7  gold
        ctx.last_call_date(),                      // 8  last call date
        fallback_dim(u.screen_width, 80).to_string(), // 9 screen width
        fallback_dim(u.screen_height, 25).to_string(), // 10 screen height
        u.access_level.to_string(),                // 11 security level
        "1".to_string(),                           // 12 ANSI capable
        "1".to_string(),                           // 13 remote
        ctx.seconds_left().to_string(),            // 14 time left in seconds
        now.format("%m/%d/%y").to_string(),        // 15 today's date
        String::new(),                             // 16 gfiles dir
        String::new(),                             // 17 data dir
        "NONE".to_string(),                        // 18 protocol
        "0".to_string(),                           // 19 registered conferences
        "0".to_string(),                           // 20 minutes this call
        u.uploads.to_string(),                     // 21 total uploads
        u.total_kb_up.to_string(),                 // 22 total K up
        u.downloads.to_string(),                   // 23 total downloads
        u.total_kb_down.to_string(),               // 24 total K down
        "8N1".to_string(),                         // 25 port settings
        "38400".to_string(),                       // 26 baud
        "1".to_string(),                           // 27 com port
        ctx.board_name.to_string(),                // 28 board name
        ctx.sysop_name.to_string(),                // 29 sysop name
        "Y".to_string(),                           // 30 ok flag
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(user: &User) -> DropFileContext<'_> {
        DropFileContext {
            user,
            node: 3,
            board_name: "Testboard",
            sysop_name: "The Op",
            session_start: Utc::now(),
        }
    }

    fn sample_user() -> User {
        User {
            id: 42,
            handle: "Nomad".to_string(),
            real_name: "Nora Mad".to_string(),
            location: "Elsewhere".to_string(),
            access_level: 50,
            time_limit_minutes: 60,
            screen_width: 80,
            screen_height: 25,
            ..User::default()
        }
    }

    fn line_count(text: &str) -> usize {
        assert!(text.ends_with("\r\n"), "drop files are CRLF-terminated");
        text.split("\r\n").count() - 1
    }

    #[test]
    fn test_line_counts_match_the_formats() {
        let user = sample_user();
        let ctx = context(&user);
        assert_eq!(line_count(&render(DropFileKind::DoorSys, &ctx)), 52);
        assert_eq!(line_count(&render(DropFileKind::Door32Sys, &ctx)), 11);
        assert_eq!(line_count(&render(DropFileKind::Dorinfo1Def, &ctx)), 13);
        assert_eq!(line_count(&render(DropFileKind::ChainTxt, &ctx)), 30);
    }

    #[test]
    fn test_door_sys_key_fields() {
        let user = sample_user();
        let ctx = context(&user);
        let text = render(DropFileKind::DoorSys, &ctx);
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines[0], "COM1:");
        assert_eq!(lines[3], "3"); // node
        assert_eq!(lines[9], "Nora Mad");
        assert_eq!(lines[14], "50"); // security level
        assert_eq!(lines[19], "GR");
        assert_eq!(lines[25], "42"); // record number
        assert_eq!(lines[34], "Testboard"); // sysop name == BBS name
        assert_eq!(lines[35], "Nomad");
    }

    #[test]
    fn test_door32_sys_fields() {
        let user = sample_user();
        let ctx = context(&user);
        let text = render(DropFileKind::Door32Sys, &ctx);
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines[0], "0");
        assert_eq!(lines[2], "38400");
        assert_eq!(lines[3], "Testboard");
        assert_eq!(lines[6], "Nomad");
        assert_eq!(lines[9], "1");
        assert_eq!(lines[10], "3");
    }

    #[test]
    fn test_dorinfo1_splits_real_name() {
        let user = sample_user();
        let ctx = context(&user);
        let text = render(DropFileKind::Dorinfo1Def, &ctx);
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines[1], "Sysop");
        assert_eq!(lines[4], "115200 BAUD,N,8,1");
        assert_eq!(lines[6], "Nora");
        assert_eq!(lines[7], "Mad");
        assert_eq!(lines[12], "-1");
    }

    #[test]
    fn test_chain_txt_notable_fields() {
        let user = sample_user();
        let ctx = context(&user);
        let text = render(DropFileKind::ChainTxt, &ctx);
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines[2], "Nora Mad");
        assert_eq!(lines[8], "80");
        assert_eq!(lines[9], "25");
        assert_eq!(lines[17], "NONE");
        // Seconds, not minutes.
        let seconds: i64 = lines[13].parse().expect("seconds left");
        assert!(seconds > 0 && seconds <= 3600);
    }

    #[test]
    fn test_write_drop_files_creates_all_four() {
        let dir = tempfile::tempdir().expect("tempdir");
        let user = sample_user();
        let ctx = context(&user);
        let written =
            write_drop_files(dir.path(), &DropFileKind::all(), &ctx).expect("write");
        assert_eq!(written.len(), 4);
        for path in written {
            assert!(path.exists());
        }
        assert!(dir.path().join("DOOR.SYS").exists());
        assert!(dir.path().join("CHAIN.TXT").exists());
    }
}
