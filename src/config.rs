//! Configuration loading and persistence.
//!
//! Handles reading and writing the board configuration file. Paths in the
//! file may use `~`; they are expanded at load time so the rest of the
//! engine only ever sees absolute-ish paths.

// Rust guideline compliant 2026-02

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ansi::OutputMode;

/// Board-wide configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BoardConfig {
    /// Board name shown in prompts and drop files.
    pub board_name: String,
    /// Sysop display name.
    pub sysop_name: String,
    /// Root of the active menu set (`mnu/`, `cfg/`, `bar/`, `ansi/`,
    /// `templates/`).
    pub menu_set: PathBuf,
    /// Directory of per-door config records (`<NAME>.json`).
    pub doors_dir: PathBuf,
    /// Directory holding the development user store and message/file bases.
    pub data_dir: PathBuf,
    /// Maximum concurrent nodes.
    pub max_nodes: u16,
    /// Default output mode for sessions that do not negotiate one.
    #[serde(default)]
    pub output_mode: OutputMode,
    /// Menu the executor starts unauthenticated sessions at.
    #[serde(default = "default_login_menu")]
    pub login_menu: String,
    /// Access level at and above which a user is treated as sysop
    /// (paging invisible nodes, seeing hidden sessions).
    #[serde(default = "default_sysop_level")]
    pub sysop_level: u8,
}

fn default_login_menu() -> String {
    "LOGIN".to_string()
}

fn default_sysop_level() -> u8 {
    250
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            board_name: "Boardwalk BBS".to_string(),
            sysop_name: "Sysop".to_string(),
            menu_set: PathBuf::from("menus/default"),
            doors_dir: PathBuf::from("doors"),
            data_dir: PathBuf::from("data"),
            max_nodes: 8,
            output_mode: OutputMode::Auto,
            login_menu: default_login_menu(),
            sysop_level: default_sysop_level(),
        }
    }
}

impl BoardConfig {
    /// Platform-standard location of the config file.
    ///
    /// `BOARDWALK_CONFIG` overrides for tests and odd deployments.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(explicit) = std::env::var("BOARDWALK_CONFIG") {
            return Ok(PathBuf::from(explicit));
        }
        let dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(dir.join("boardwalk").join("boardwalk.json"))
    }

    /// Loads the config from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("malformed config {}", path.display()))?;
        config.expand_paths();
        Ok(config)
    }

    /// Writes the config to `path`, creating parent directories.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)
            .with_context(|| format!("failed to write config {}", path.display()))
    }

    fn expand_paths(&mut self) {
        for path in [&mut self.menu_set, &mut self.doors_dir, &mut self.data_dir] {
            if let Some(s) = path.to_str() {
                let expanded = shellexpand::tilde(s);
                *path = PathBuf::from(expanded.as_ref());
            }
        }
    }

    /// Whether `level` is sysop-or-above.
    #[must_use]
    pub fn is_sysop_level(&self, level: u8) -> bool {
        level >= self.sysop_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = BoardConfig::load(&dir.path().join("nope.json")).expect("load");
        assert_eq!(config.board_name, "Boardwalk BBS");
        assert_eq!(config.max_nodes, 8);
        assert_eq!(config.login_menu, "LOGIN");
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sub").join("boardwalk.json");
        let mut config = BoardConfig::default();
        config.board_name = "Test Board".to_string();
        config.max_nodes = 2;
        config.save(&path).expect("save");

        let reloaded = BoardConfig::load(&path).expect("reload");
        assert_eq!(reloaded.board_name, "Test Board");
        assert_eq!(reloaded.max_nodes, 2);
    }

    #[test]
    fn test_sysop_level_threshold() {
        let config = BoardConfig::default();
        assert!(config.is_sysop_level(250));
        assert!(config.is_sysop_level(255));
        assert!(!config.is_sysop_level(249));
    }
}
