//! The board: process-wide state and the session entry point.
//!
//! One [`Board`] exists per process. Transport acceptors call
//! [`Board::run_session`] with a negotiated [`SessionLink`]; the board
//! allocates a node number, registers the session, runs the menu executor,
//! and guarantees the node is unregistered (and out of the chat room) no
//! matter how the executor returned.

// Rust guideline compliant 2026-02

use std::sync::Arc;

use anyhow::Result;
use tokio::io::AsyncWriteExt;

use crate::config::BoardConfig;
use crate::door::DoorSet;
use crate::link::SessionLink;
use crate::menu::executor::{ExecutorOutcome, MenuExecutor};
use crate::menu::loader::MenuSet;
use crate::runnables::RunnableRegistry;
use crate::session::{ChatRoom, NodeRegistry, Session};
use crate::store::{FileStore, MessageStore};
use crate::user::UserManager;

/// Process-wide state shared by every node task.
pub struct Board {
    /// Board configuration.
    pub config: BoardConfig,
    /// Active menu set.
    pub menuset: MenuSet,
    /// Door config directory.
    pub doors: DoorSet,
    /// Node table.
    pub registry: NodeRegistry,
    /// The chat room.
    pub chat: ChatRoom,
    /// External user store.
    pub users: Arc<dyn UserManager>,
    /// External message base.
    pub messages: Arc<dyn MessageStore>,
    /// External file base.
    pub files: Arc<dyn FileStore>,
    /// Action-string → handler registry.
    pub runnables: RunnableRegistry,
    /// Optional programmatic screen renderer.
    ///
    /// When set, it is consulted for every menu except the login menu; a
    /// `Some` return replaces the authored `.ANS` bytes (pre-processing).
    /// Boards use this to generate themed menus without hand-drawn art.
    pub screen_renderer: Option<ScreenRenderer>,
}

/// Programmatic alternative to authored screens: `(menu name) -> raw bytes`.
pub type ScreenRenderer = Box<dyn Fn(&str) -> Option<Vec<u8>> + Send + Sync>;

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("board_name", &self.config.board_name)
            .field("max_nodes", &self.config.max_nodes)
            .finish_non_exhaustive()
    }
}

impl Board {
    /// Assembles a board from its configuration and external stores.
    #[must_use]
    pub fn new(
        config: BoardConfig,
        users: Arc<dyn UserManager>,
        messages: Arc<dyn MessageStore>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        let menuset = MenuSet::new(&config.menu_set);
        let doors = DoorSet::new(&config.doors_dir);
        let registry = NodeRegistry::new(config.max_nodes);
        Self {
            config,
            menuset,
            doors,
            registry,
            chat: ChatRoom::new(),
            users,
            messages,
            files,
            runnables: RunnableRegistry::with_builtins(),
            screen_renderer: None,
        }
    }

    /// Serves one connection to completion.
    ///
    /// Allocates the lowest free node; a full board gets a short message and
    /// a clean close. The session is unregistered on every exit path.
    pub async fn run_session(self: &Arc<Self>, mut link: SessionLink) -> Result<ExecutorOutcome> {
        let Some(node) = self.registry.first_free_node() else {
            log::warn!("connection from {} rejected: board full", link.remote_addr);
            let _ = link
                .writer
                .write_all(b"\r\nAll nodes are in use; try again soon.\r\n")
                .await;
            return Ok(ExecutorOutcome::Logoff);
        };

        let session = Arc::new(Session::new(node, link.local, link.width, link.height));
        self.registry.register(node, Arc::clone(&session))?;
        log::info!(
            "node {node}: connection from {} ({}x{})",
            link.remote_addr,
            link.width,
            link.height
        );

        let executor = MenuExecutor::new(Arc::clone(self), Arc::clone(&session), link);
        let result = executor.run().await;

        // Teardown runs regardless of how the executor ended.
        self.chat.unsubscribe(node);
        self.registry.unregister(node);
        result
    }
}
