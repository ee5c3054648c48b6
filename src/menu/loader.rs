//! Declarative menu, command, and lightbar records.
//!
//! A menu set is a directory tree:
//!
//! ```text
//! <menuSet>/mnu/<NAME>.MNU       menu record (JSON object)
//! <menuSet>/cfg/<NAME>.CFG       command list (JSON array)
//! <menuSet>/bar/<NAME>.BAR       lightbar options (CSV)
//! <menuSet>/ansi/<NAME>.ANS      authored screen
//! <menuSet>/templates/...        list templates
//! ```
//!
//! A missing `.CFG` yields an empty command list; a missing `.MNU` is fatal
//! for the visit. Key tokens are normalized to upper case at load time so
//! matching never has to think about case again.

// Rust guideline compliant 2026-02

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Key token marking a once-per-session autorun entry.
pub const KEYS_AUTORUN_ONCE: &str = "//";
/// Key token marking an every-visit autorun entry.
pub const KEYS_AUTORUN_EVERY: &str = "~~";

/// Per-menu metadata from `<NAME>.MNU`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MenuRecord {
    /// Clear screen before display (either flag triggers).
    #[serde(rename = "CLR", default)]
    pub clr: bool,
    /// Alternate clear-screen flag kept for record compatibility.
    #[serde(rename = "CLS", default)]
    pub cls: bool,
    /// Whether to render the prompt template after the screen.
    #[serde(rename = "USEPROMPT", default)]
    pub use_prompt: bool,
    /// Primary prompt template (pipe codes and placeholders allowed).
    #[serde(rename = "PROMPT1", default)]
    pub prompt1: String,
    /// Secondary prompt template.
    #[serde(rename = "PROMPT2", default)]
    pub prompt2: String,
    /// Menu to transition to when no keystroke matches.
    #[serde(rename = "FALLBACK", default)]
    pub fallback: String,
    /// Access expression evaluated before display.
    #[serde(rename = "ACS", default)]
    pub acs: String,
    /// Menu password; non-empty means up to three prompt attempts.
    #[serde(rename = "PASS", default)]
    pub password: String,
}

impl MenuRecord {
    /// Whether the screen should be cleared before display.
    #[must_use]
    pub fn clear_screen(&self) -> bool {
        self.clr || self.cls
    }
}

/// One action entry from `<NAME>.CFG`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandRecord {
    /// Whitespace-separated key tokens; `//`, `~~`, and `""` are special.
    #[serde(rename = "KEYS", default)]
    pub keys: String,
    /// Action string: `GOTO:X`, `RUN:X`, `DOOR:X`, `LOGOFF`.
    #[serde(rename = "CMD", default)]
    pub command: String,
    /// Gating access expression.
    #[serde(rename = "ACS", default)]
    pub acs: String,
    /// Hidden entries are excluded from numeric indexing and listings but
    /// stay dispatchable by key.
    #[serde(rename = "HIDDEN", default)]
    pub hidden: bool,
    /// Optional autorun descriptor.
    #[serde(rename = "AUTORUN", default)]
    pub autorun: Option<String>,
}

impl CommandRecord {
    /// Uppercased key tokens.
    #[must_use]
    pub fn key_tokens(&self) -> Vec<String> {
        self.keys
            .split_whitespace()
            .map(str::to_uppercase)
            .collect()
    }

    /// Fires once per session per menu.
    #[must_use]
    pub fn is_autorun_once(&self) -> bool {
        self.keys.trim() == KEYS_AUTORUN_ONCE
    }

    /// Fires on every menu visit.
    #[must_use]
    pub fn is_autorun_every(&self) -> bool {
        self.keys.trim() == KEYS_AUTORUN_EVERY
    }

    /// Any autorun form.
    #[must_use]
    pub fn is_autorun(&self) -> bool {
        self.is_autorun_once() || self.is_autorun_every()
    }

    /// Default action used by post-authentication transitions.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.keys.trim().is_empty()
    }

    /// Whether uppercased `input` matches one of this entry's key tokens.
    #[must_use]
    pub fn matches(&self, input: &str) -> bool {
        self.key_tokens().iter().any(|k| k == input)
    }

    /// Whether the entry participates in numeric selection.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        !self.hidden && !self.is_autorun() && !self.is_default()
    }
}

/// One line of a `.BAR` lightbar config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightbarOption {
    /// 1-based column.
    pub col: u16,
    /// 1-based row.
    pub row: u16,
    /// Pipe color value while selected.
    pub hi_color: u8,
    /// Pipe color value while not selected.
    pub lo_color: u8,
    /// Case-insensitive hotkey.
    pub hotkey: char,
    /// Value returned on confirm; falls back to the hotkey when empty.
    pub return_value: String,
    /// Text drawn at `(row, col)`.
    pub text: String,
}

impl LightbarOption {
    /// The string handed back to the menu loop on confirm.
    #[must_use]
    pub fn value(&self) -> String {
        if self.return_value.is_empty() {
            self.hotkey.to_string()
        } else {
            self.return_value.clone()
        }
    }
}

/// Parses `.BAR` content: `X,Y,HiColor,LoColor,HotKey,ReturnValue,DisplayText`.
///
/// Lines starting with `;` and blank lines are comments. Malformed lines are
/// skipped with a warning — a typo in one option must not take the whole
/// menu down.
#[must_use]
pub fn parse_bar(content: &str) -> Vec<LightbarOption> {
    let mut options = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        let fields: Vec<&str> = line.splitn(7, ',').collect();
        if fields.len() < 7 {
            log::warn!("BAR line {}: expected 7 fields, got {}", lineno + 1, fields.len());
            continue;
        }
        let parsed = (
            fields[0].trim().parse::<u16>(),
            fields[1].trim().parse::<u16>(),
            fields[2].trim().parse::<u8>(),
            fields[3].trim().parse::<u8>(),
            fields[4].trim().chars().next(),
        );
        let (Ok(col), Ok(row), Ok(hi), Ok(lo), Some(hotkey)) = parsed else {
            log::warn!("BAR line {}: malformed fields", lineno + 1);
            continue;
        };
        options.push(LightbarOption {
            col,
            row,
            hi_color: hi,
            lo_color: lo,
            hotkey: hotkey.to_ascii_uppercase(),
            return_value: fields[5].trim().to_uppercase(),
            text: fields[6].to_string(),
        });
    }
    options
}

/// Handle to a menu-set directory.
#[derive(Debug, Clone)]
pub struct MenuSet {
    root: PathBuf,
}

impl MenuSet {
    /// Wraps a menu-set root directory.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Menu-set root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the authored screen for `name`.
    #[must_use]
    pub fn screen_path(&self, name: &str) -> PathBuf {
        self.root.join("ansi").join(format!("{}.ANS", name.to_uppercase()))
    }

    /// Path of an include or template file under `ansi/`.
    #[must_use]
    pub fn ansi_path(&self, file: &str) -> PathBuf {
        self.root.join("ansi").join(file)
    }

    /// Path of a list template under `templates/`.
    #[must_use]
    pub fn template_path(&self, file: &str) -> PathBuf {
        self.root.join("templates").join(file)
    }

    /// Loads the menu record for `name`. Missing `.MNU` is an error.
    pub fn load_menu(&self, name: &str) -> Result<MenuRecord> {
        let path = self
            .root
            .join("mnu")
            .join(format!("{}.MNU", name.to_uppercase()));
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read menu record {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("malformed menu record {}", path.display()))
    }

    /// Loads the command list for `name`. Missing `.CFG` yields an empty
    /// list.
    pub fn load_commands(&self, name: &str) -> Result<Vec<CommandRecord>> {
        let path = self
            .root
            .join("cfg")
            .join(format!("{}.CFG", name.to_uppercase()));
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read command list {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("malformed command list {}", path.display()))
    }

    /// Loads lightbar options for `name`, `None` when no `.BAR` exists.
    pub fn load_lightbar(&self, name: &str) -> Result<Option<Vec<LightbarOption>>> {
        let path = self
            .root
            .join("bar")
            .join(format!("{}.BAR", name.to_uppercase()));
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read lightbar config {}", path.display()))?;
        Ok(Some(parse_bar(&raw)))
    }

    /// Names of every menu in the set (from `mnu/*.MNU`), for validation.
    pub fn menu_names(&self) -> Result<Vec<String>> {
        let dir = self.root.join("mnu");
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("failed to list {}", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("MNU")) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_uppercase());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_record_fields_parse_uppercase_keys() {
        let raw = r#"{"CLR": true, "USEPROMPT": true, "PROMPT1": "|09[|11MAIN|09]: ",
                      "FALLBACK": "MAIN", "ACS": "S10", "PASS": ""}"#;
        let record: MenuRecord = serde_json::from_str(raw).expect("parse");
        assert!(record.clear_screen());
        assert!(record.use_prompt);
        assert_eq!(record.fallback, "MAIN");
        assert_eq!(record.acs, "S10");
        assert!(record.password.is_empty());
    }

    #[test]
    fn test_command_record_key_tokens_uppercase() {
        let raw = r#"{"KEYS": "m msg", "CMD": "GOTO:MESSAGES"}"#;
        let record: CommandRecord = serde_json::from_str(raw).expect("parse");
        assert_eq!(record.key_tokens(), vec!["M".to_string(), "MSG".to_string()]);
        assert!(record.matches("MSG"));
        assert!(!record.matches("X"));
    }

    #[test]
    fn test_autorun_and_default_classification() {
        let once = CommandRecord {
            keys: "//".to_string(),
            ..CommandRecord::default()
        };
        let every = CommandRecord {
            keys: "~~".to_string(),
            ..CommandRecord::default()
        };
        let default = CommandRecord::default();
        assert!(once.is_autorun_once() && once.is_autorun());
        assert!(every.is_autorun_every() && every.is_autorun());
        assert!(default.is_default());
        assert!(!once.is_selectable());
        assert!(!default.is_selectable());
    }

    #[test]
    fn test_parse_bar_skips_comments_and_malformed() {
        let content = "\
; menu bar
10,5,15,7,M,MSG,Message Areas
garbage line
20,5,15,7,F,,File Areas

;done";
        let options = parse_bar(content);
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].hotkey, 'M');
        assert_eq!(options[0].value(), "MSG");
        assert_eq!(options[0].col, 10);
        assert_eq!(options[0].row, 5);
        // Empty return value falls back to the hotkey.
        assert_eq!(options[1].value(), "F");
    }

    #[test]
    fn test_missing_cfg_is_empty_not_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let set = MenuSet::new(dir.path());
        let commands = set.load_commands("MAIN").expect("load");
        assert!(commands.is_empty());
        assert!(set.load_menu("MAIN").is_err());
    }

    #[test]
    fn test_load_round_trip_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("mnu")).expect("mkdir");
        std::fs::create_dir_all(dir.path().join("cfg")).expect("mkdir");
        std::fs::write(
            dir.path().join("mnu/MAIN.MNU"),
            r#"{"CLR": true, "PROMPT1": "cmd: "}"#,
        )
        .expect("write");
        std::fs::write(
            dir.path().join("cfg/MAIN.CFG"),
            r#"[{"KEYS": "G", "CMD": "LOGOFF"}]"#,
        )
        .expect("write");

        let set = MenuSet::new(dir.path());
        let menu = set.load_menu("main").expect("menu");
        assert!(menu.clear_screen());
        let commands = set.load_commands("main").expect("commands");
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].command, "LOGOFF");
    }
}
