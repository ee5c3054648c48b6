//! Prompt-template rendering: named placeholders and file inclusion.
//!
//! Prompt strings from menu records may embed `|NODE`-style named
//! placeholders and `%%file.ans%%` inclusion markers alongside ordinary
//! pipe color codes. This pass resolves both down to plain pipe-coded text;
//! the terminal's print path then compiles the colors.
//!
//! Named placeholders are substituted longest-name-first so `|NAME` never
//! collides with a later single-letter substitution, and inclusion is
//! depth-limited so a template that includes itself cannot wedge a node.

// Rust guideline compliant 2026-02

use chrono::{DateTime, Local, Utc};

use crate::ansi::cp437::cp437_to_char;
use crate::menu::loader::MenuSet;
use crate::user::User;

/// Maximum `%%file%%` nesting depth.
const MAX_INCLUDE_DEPTH: usize = 5;

/// Everything the placeholder table can draw from.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    /// Authenticated user, if any; user placeholders render empty without
    /// one.
    pub user: Option<&'a User>,
    /// Node number.
    pub node: u16,
    /// Board name.
    pub board_name: &'a str,
    /// Current menu name (`|MN`).
    pub menu_name: &'a str,
    /// Session start, for `|TL`.
    pub session_start: DateTime<Utc>,
}

fn last_call_text(user: &User) -> String {
    user.last_call
        .map_or_else(|| "Never".to_string(), |t| t.format("%m/%d/%y %H:%M").to_string())
}

/// Substitutes the named `|XXX` placeholders.
#[must_use]
pub fn substitute_named(template: &str, ctx: &PromptContext<'_>) -> String {
    let now = Local::now();
    let empty = String::new();
    let user_field = |f: fn(&User) -> String| ctx.user.map(f).unwrap_or_else(|| empty.clone());

    // Longest names first so no placeholder is a prefix casualty.
    let table: [(&str, String); 14] = [
        ("|HANDLE", user_field(|u| u.handle.clone())),
        ("|ALIAS", user_field(|u| u.handle.clone())),
        ("|LCALL", user_field(last_call_text)),
        ("|LEVEL", user_field(|u| u.access_level.to_string())),
        ("|UPLDS", user_field(|u| u.uploads.to_string())),
        ("|CALLS", user_field(|u| u.calls_total.to_string())),
        ("|PHONE", user_field(|u| u.home_phone.clone())),
        ("|NODE", ctx.node.to_string()),
        ("|DATE", now.format("%m/%d/%y").to_string()),
        ("|TIME", now.format("%H:%M").to_string()),
        ("|NAME", user_field(|u| u.real_name.clone())),
        ("|MN", ctx.menu_name.to_string()),
        ("|TL", ctx.user.map_or_else(
            || empty.clone(),
            |u| u.minutes_left(ctx.session_start).max(0).to_string(),
        )),
        ("|CA", user_field(|u| u.msg_area_tag.clone())),
    ];

    let mut out = template.to_string();
    for (name, value) in &table {
        if out.contains(name) {
            out = out.replace(name, value);
        }
    }
    out
}

/// Expands `%%file.ext%%` inclusion markers relative to `<menuSet>/ansi/`.
///
/// Included files are CP437; their bytes are widened for string processing
/// and narrowed again when the prompt is finally rendered. Unknown files
/// leave the marker in place (visible, so the sysop notices). Depth beyond
/// [`MAX_INCLUDE_DEPTH`] stops expanding.
#[must_use]
pub fn expand_includes(template: &str, menuset: &MenuSet, depth: usize) -> String {
    if depth >= MAX_INCLUDE_DEPTH {
        return template.to_string();
    }
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("%%") {
        let after = &rest[start + 2..];
        let Some(len) = after.find("%%") else {
            break;
        };
        let file = &after[..len];
        out.push_str(&rest[..start]);
        let path = menuset.ansi_path(file);
        match std::fs::read(&path) {
            Ok(bytes) => {
                let included: String = bytes.iter().map(|&b| cp437_to_char(b)).collect();
                out.push_str(&expand_includes(&included, menuset, depth + 1));
            }
            Err(e) => {
                log::warn!("prompt include {} unreadable: {e}", path.display());
                out.push_str(&rest[start..start + 2 + len + 2]);
            }
        }
        rest = &after[len + 2..];
    }
    out.push_str(rest);
    out
}

/// Full prompt render: inclusion, then named placeholders.
///
/// The result still carries `|DD` color codes for the terminal to compile.
#[must_use]
pub fn render_prompt(template: &str, ctx: &PromptContext<'_>, menuset: &MenuSet) -> String {
    substitute_named(&expand_includes(template, menuset, 0), ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        User {
            id: 3,
            handle: "Nomad".to_string(),
            real_name: "N. Omad".to_string(),
            access_level: 90,
            calls_total: 12,
            uploads: 4,
            msg_area_tag: "GENERAL".to_string(),
            ..User::default()
        }
    }

    fn ctx<'a>(user: &'a User, menu: &'a str) -> PromptContext<'a> {
        PromptContext {
            user: Some(user),
            node: 2,
            board_name: "Testboard",
            menu_name: menu,
            session_start: Utc::now(),
        }
    }

    #[test]
    fn test_named_placeholders() {
        let user = test_user();
        let out = substitute_named("|HANDLE on node |NODE in |MN (|CA)", &ctx(&user, "MAIN"));
        assert_eq!(out, "Nomad on node 2 in MAIN (GENERAL)");
    }

    #[test]
    fn test_handle_is_not_clobbered_by_shorter_names() {
        let user = test_user();
        // |HANDLE must not decay into |H + "ANDLE" or collide with |NAME.
        let out = substitute_named("|HANDLE/|NAME/|LEVEL", &ctx(&user, "MAIN"));
        assert_eq!(out, "Nomad/N. Omad/90");
    }

    #[test]
    fn test_placeholders_without_user_render_empty() {
        let context = PromptContext {
            user: None,
            node: 1,
            board_name: "B",
            menu_name: "LOGIN",
            session_start: Utc::now(),
        };
        assert_eq!(substitute_named("[|HANDLE]", &context), "[]");
    }

    #[test]
    fn test_include_expansion_and_depth_limit() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("ansi")).expect("mkdir");
        std::fs::write(dir.path().join("ansi/INNER.ANS"), b"deep").expect("write");
        // SELF.ANS includes itself; the expansion must terminate.
        std::fs::write(dir.path().join("ansi/SELF.ANS"), b"x%%SELF.ANS%%").expect("write");
        let set = MenuSet::new(dir.path());

        let out = expand_includes("a %%INNER.ANS%% b", &set, 0);
        assert_eq!(out, "a deep b");

        let looped = expand_includes("%%SELF.ANS%%", &set, 0);
        // Five levels of "x" then the unexpanded marker.
        assert!(looped.starts_with("xxxxx"));
        assert!(looped.contains("%%SELF.ANS%%"));
    }

    #[test]
    fn test_missing_include_left_visible() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("ansi")).expect("mkdir");
        let set = MenuSet::new(dir.path());
        let out = expand_includes("see %%NOPE.ANS%%", &set, 0);
        assert_eq!(out, "see %%NOPE.ANS%%");
    }
}
