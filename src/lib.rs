//! Boardwalk — a multi-node terminal BBS host.
//!
//! The crate is the engine behind the `boardwalk` binary: a per-session
//! menu executor driving declarative menu records, a CP437/ANSI render
//! pipeline with pipe-code markup, a fixed-capacity node registry with
//! chat and paging, and a PTY-backed runner for external door programs.
//!
//! Transport acceptors (SSH, telnet) live outside the crate; they hand a
//! negotiated [`link::SessionLink`] to [`board::Board::run_session`] and
//! close the transport when it returns.

// Library modules
pub mod acs;
pub mod ansi;
pub mod board;
pub mod config;
pub mod door;
pub mod errors;
pub mod input;
pub mod link;
pub mod menu;
pub mod runnables;
pub mod session;
pub mod store;
pub mod terminal;
pub mod user;

// Re-export commonly used types
pub use acs::{check_acs, AcsContext};
pub use ansi::OutputMode;
pub use board::Board;
pub use config::BoardConfig;
pub use errors::{SessionError, SessionResult};
pub use input::{InputHandler, Key};
pub use link::SessionLink;
pub use menu::{ExecutorOutcome, MenuExecutor, MenuSet};
pub use session::{ChatMessage, ChatRoom, NodeRegistry, Session};
pub use terminal::SessionTerminal;
pub use user::{JsonUserManager, User, UserManager};
