//! Registry of built-in runnables.
//!
//! A menu command `RUN:X` resolves through this registry to a handler. All
//! handlers receive the same [`RunContext`] bundle — terminal, input, the
//! shared coordination pieces, and a mutable slot for the current user — and
//! return a [`RunOutcome`] whose optional `next_action` lets a runnable
//! chain into another menu action (e.g. a file browser handing back
//! `GOTO:FILES`).
//!
//! The executor resets the session input handler before and after each
//! runnable so stale escape-sequence state never leaks across subsystems.

// Rust guideline compliant 2026-02

pub mod chat;
pub mod filelist;
pub mod msglist;
pub mod pager;
pub mod page;
pub mod who;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::BoardConfig;
use crate::input::InputHandler;
use crate::menu::loader::MenuSet;
use crate::session::{ChatRoom, NodeRegistry, Session};
use crate::store::{FileStore, MessageStore};
use crate::terminal::SessionTerminal;
use crate::user::{User, UserManager};

/// Uniform argument bundle handed to every runnable.
pub struct RunContext<'a> {
    /// Session output.
    pub terminal: &'a SessionTerminal,
    /// Session input (exclusive while the runnable runs).
    pub input: &'a mut InputHandler,
    /// This node's shared session record.
    pub session: &'a Arc<Session>,
    /// Process-wide node table.
    pub registry: &'a NodeRegistry,
    /// Process-wide chat room.
    pub chat: &'a ChatRoom,
    /// External user store.
    pub users: &'a dyn UserManager,
    /// External message base.
    pub messages: &'a dyn MessageStore,
    /// External file base.
    pub files: &'a dyn FileStore,
    /// Board configuration.
    pub config: &'a BoardConfig,
    /// Active menu set.
    pub menuset: &'a MenuSet,
    /// Current user; runnables may mutate and are responsible for saving.
    pub user: &'a mut Option<User>,
    /// Node number.
    pub node: u16,
    /// Session start time.
    pub session_start: DateTime<Utc>,
    /// Argument string from the action (`RUN:CHAT` → `"CHAT"`, anything
    /// after a second colon arrives verbatim).
    pub arg: &'a str,
}

impl std::fmt::Debug for RunContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("node", &self.node)
            .field("arg", &self.arg)
            .finish_non_exhaustive()
    }
}

impl RunContext<'_> {
    /// Saves the current user, logging instead of failing the action.
    ///
    /// A store fault must not abort the enclosing runnable; the state change
    /// already happened on screen.
    pub fn save_user_logged(&mut self) {
        if let Some(user) = self.user.as_ref() {
            if let Err(e) = self.users.save(user) {
                log::error!("failed to save user {}: {e}", user.handle);
            }
        }
    }

    /// Whether the current user is sysop-or-above.
    #[must_use]
    pub fn is_sysop(&self) -> bool {
        self.user
            .as_ref()
            .is_some_and(|u| self.config.is_sysop_level(u.access_level))
    }
}

/// What a runnable hands back to the menu loop.
#[derive(Debug, Default, Clone)]
pub struct RunOutcome {
    /// Action string the executor should dispatch next, if any.
    pub next_action: Option<String>,
}

impl RunOutcome {
    /// Plain completion; back to the menu.
    #[must_use]
    pub fn done() -> Self {
        Self { next_action: None }
    }

    /// Completion chaining into another menu action.
    #[must_use]
    pub fn chain(action: &str) -> Self {
        Self {
            next_action: Some(action.to_string()),
        }
    }
}

/// A named handler invocable through `RUN:<name>`.
#[async_trait]
pub trait Runnable: Send + Sync {
    /// Registry key (uppercase).
    fn name(&self) -> &'static str;

    /// Executes the runnable.
    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<RunOutcome>;
}

/// Process-global mapping from action string to handler.
#[derive(Default)]
pub struct RunnableRegistry {
    handlers: HashMap<String, Arc<dyn Runnable>>,
}

impl std::fmt::Debug for RunnableRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("RunnableRegistry")
            .field("handlers", &names)
            .finish()
    }
}

impl RunnableRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with every built-in.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(chat::ChatRunnable));
        registry.register(Arc::new(page::PageRunnable));
        registry.register(Arc::new(who::WhoRunnable));
        registry.register(Arc::new(InvisibleRunnable));
        registry.register(Arc::new(msglist::MsgListRunnable));
        registry.register(Arc::new(filelist::FileListRunnable));
        registry
    }

    /// Registers a handler under its own name.
    pub fn register(&mut self, runnable: Arc<dyn Runnable>) {
        self.handlers
            .insert(runnable.name().to_uppercase(), runnable);
    }

    /// Looks up a handler by the `RUN:` argument's first segment.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Runnable>> {
        self.handlers.get(&name.to_uppercase()).map(Arc::clone)
    }
}

/// Toggles this session's visibility in who-is-online listings.
///
/// Menu records gate this behind a sysop ACS; the runnable itself only
/// flips the flag.
#[derive(Debug)]
pub struct InvisibleRunnable;

#[async_trait]
impl Runnable for InvisibleRunnable {
    fn name(&self) -> &'static str {
        "INVISIBLE"
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<RunOutcome> {
        let now_invisible = !ctx.session.is_invisible();
        ctx.session.set_invisible(now_invisible);
        let state = if now_invisible {
            "|08You are now invisible.|07"
        } else {
            "|15You are now visible.|07"
        };
        ctx.terminal.print_line(state).await?;
        Ok(RunOutcome::done())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_lookup_is_case_insensitive() {
        let registry = RunnableRegistry::with_builtins();
        assert!(registry.get("chat").is_some());
        assert!(registry.get("CHAT").is_some());
        assert!(registry.get("WHO").is_some());
        assert!(registry.get("PAGE").is_some());
        assert!(registry.get("INVISIBLE").is_some());
        assert!(registry.get("MSGLIST").is_some());
        assert!(registry.get("FILELIST").is_some());
        assert!(registry.get("NOPE").is_none());
    }

    #[test]
    fn test_outcome_chain_carries_action() {
        assert!(RunOutcome::done().next_action.is_none());
        assert_eq!(
            RunOutcome::chain("GOTO:MAIN").next_action.as_deref(),
            Some("GOTO:MAIN")
        );
    }
}
