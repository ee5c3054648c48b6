//! Session-level error taxonomy.
//!
//! Most plumbing in this crate returns `anyhow::Result`; this enum exists for
//! the few cases callers must branch on: a dropped transport versus an
//! interrupted read versus an ordinary I/O failure. The menu executor maps
//! `Disconnected` to a silent `LOGOFF`, and the door runner relies on
//! `Interrupted` to shut down its input pump without eating the next
//! keystroke.

// Rust guideline compliant 2026-02

use thiserror::Error;

/// Errors surfaced by session reads and writes.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The remote side closed the transport (EOF or reset).
    #[error("session disconnected")]
    Disconnected,

    /// An in-flight read was cancelled through the read-interrupt token.
    ///
    /// The pending byte, if any, stays buffered in the input handler and is
    /// delivered to the next reader.
    #[error("read interrupted")]
    Interrupted,

    /// Underlying transport I/O error.
    #[error("session I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for session-facing operations.
pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    /// Returns `true` when the error means the caller should treat the
    /// session as gone and return `LOGOFF` without user-visible output.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::Disconnected => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            Self::Interrupted => false,
        }
    }
}
