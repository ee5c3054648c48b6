//! What a transport acceptor hands the engine.
//!
//! SSH and telnet listeners live outside this crate. When one accepts a
//! connection and finishes its protocol negotiation, it packages the byte
//! stream and the negotiated terminal facts into a [`SessionLink`] and calls
//! [`Board::run_session`](crate::board::Board::run_session). The engine
//! never sees transport details beyond this.

// Rust guideline compliant 2026-02

use tokio::sync::mpsc;

use crate::ansi::OutputMode;
use crate::input::SessionReader;
use crate::terminal::SessionWriter;

/// A connected, negotiated session transport.
pub struct SessionLink {
    /// Byte stream from the remote terminal.
    pub reader: SessionReader,
    /// Byte stream to the remote terminal.
    pub writer: SessionWriter,
    /// Window-resize events, if the transport reports them (SSH does).
    /// Ignored during doors by design; menus re-read dimensions per session.
    pub resize: Option<mpsc::UnboundedReceiver<(u16, u16)>>,
    /// Whether this is a local console (ACS atom `L`).
    pub local: bool,
    /// Display address for logs ("203.0.113.9:22", "console").
    pub remote_addr: String,
    /// Negotiated terminal width.
    pub width: u16,
    /// Negotiated terminal height.
    pub height: u16,
    /// Negotiated output character set.
    pub output_mode: OutputMode,
}

impl std::fmt::Debug for SessionLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLink")
            .field("local", &self.local)
            .field("remote_addr", &self.remote_addr)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("output_mode", &self.output_mode)
            .finish_non_exhaustive()
    }
}

impl SessionLink {
    /// Wraps a plain duplex byte stream with defaults suitable for tests
    /// and the local console.
    #[must_use]
    pub fn from_stream(
        reader: SessionReader,
        writer: SessionWriter,
        local: bool,
        output_mode: OutputMode,
    ) -> Self {
        Self {
            reader,
            writer,
            resize: None,
            local,
            remote_addr: if local { "console" } else { "unknown" }.to_string(),
            width: 80,
            height: 25,
            output_mode,
        }
    }
}
