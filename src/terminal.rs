//! Serialized writer for a session's outbound byte stream.
//!
//! A session's terminal is written from more than one task at a time — the
//! menu loop, the chat receiver, a door's output pump — so every write goes
//! through one async mutex. Interleaved escape sequences garble remote
//! terminals in ways that are miserable to reproduce; the lock is the whole
//! defense.
//!
//! The terminal knows the session's negotiated [`OutputMode`] and dimensions;
//! `print`/`print_line` run text through the pipe-code renderer, while
//! `write_processed` sends bytes that already went through screen processing.

// Rust guideline compliant 2026-02

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::ansi::{self, OutputMode, PipeSubstitutions};
use crate::errors::{SessionError, SessionResult};

/// Boxed write half of a session transport.
pub type SessionWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Cloneable handle to a session's output stream.
///
/// Cheap to clone; all clones share the writer lock.
#[derive(Clone)]
pub struct SessionTerminal {
    writer: Arc<Mutex<SessionWriter>>,
    mode: OutputMode,
    width: u16,
    height: u16,
}

impl std::fmt::Debug for SessionTerminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTerminal")
            .field("mode", &self.mode)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl SessionTerminal {
    /// Wraps the write half of a session transport.
    ///
    /// `mode` is resolved here; engine code never sees `Auto`.
    #[must_use]
    pub fn new(writer: SessionWriter, mode: OutputMode, width: u16, height: u16) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            mode: mode.resolved(),
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Negotiated output mode (never `Auto`).
    #[must_use]
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Terminal width in columns.
    #[must_use]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Terminal height in rows.
    #[must_use]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Writes raw bytes with no processing whatsoever.
    pub async fn write_raw(&self, bytes: &[u8]) -> SessionResult<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await.map_err(SessionError::Io)?;
        writer.flush().await.map_err(SessionError::Io)?;
        Ok(())
    }

    /// Writes bytes that already went through screen processing.
    pub async fn write_processed(&self, bytes: &[u8]) -> SessionResult<()> {
        self.write_raw(bytes).await
    }

    /// Renders `text` (pipe codes honored) and writes it.
    pub async fn print(&self, text: &str) -> SessionResult<()> {
        self.write_raw(&ansi::render_str(text, self.mode, None)).await
    }

    /// Renders `text` with a substitution map and writes it.
    pub async fn print_with(&self, text: &str, subs: &PipeSubstitutions) -> SessionResult<()> {
        self.write_raw(&ansi::render_str(text, self.mode, Some(subs)))
            .await
    }

    /// `print` plus CRLF.
    pub async fn print_line(&self, text: &str) -> SessionResult<()> {
        let mut bytes = ansi::render_str(text, self.mode, None);
        bytes.extend_from_slice(b"\r\n");
        self.write_raw(&bytes).await
    }

    /// Clears the screen and homes the cursor.
    pub async fn clear_screen(&self) -> SessionResult<()> {
        self.write_raw(b"\x1b[2J\x1b[H").await
    }

    /// Moves the cursor to 1-based `(row, col)`.
    pub async fn goto(&self, row: u16, col: u16) -> SessionResult<()> {
        self.write_raw(format!("\x1b[{row};{col}H").as_bytes()).await
    }

    /// Resets SGR attributes.
    pub async fn reset_attributes(&self) -> SessionResult<()> {
        self.write_raw(b"\x1b[0m").await
    }

    /// Confines scrolling to rows `top..=bottom` (1-based, inclusive).
    ///
    /// Callers must pair this with [`reset_scroll_region`](Self::reset_scroll_region)
    /// on every exit path.
    pub async fn set_scroll_region(&self, top: u16, bottom: u16) -> SessionResult<()> {
        self.write_raw(format!("\x1b[{top};{bottom}r").as_bytes())
            .await
    }

    /// Restores full-screen scrolling.
    pub async fn reset_scroll_region(&self) -> SessionResult<()> {
        self.write_raw(b"\x1b[r").await
    }

    /// Hides the cursor.
    pub async fn hide_cursor(&self) -> SessionResult<()> {
        self.write_raw(b"\x1b[?25l").await
    }

    /// Shows the cursor.
    pub async fn show_cursor(&self) -> SessionResult<()> {
        self.write_raw(b"\x1b[?25h").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Terminal wired to an in-memory duplex; returns the far read end.
    fn test_terminal(mode: OutputMode) -> (SessionTerminal, tokio::io::DuplexStream) {
        let (near, far) = tokio::io::duplex(4096);
        (SessionTerminal::new(Box::new(near), mode, 80, 25), far)
    }

    async fn read_available(far: &mut tokio::io::DuplexStream) -> Vec<u8> {
        use tokio::io::AsyncReadExt;
        let mut buf = vec![0u8; 4096];
        let n = far.read(&mut buf).await.expect("read");
        buf.truncate(n);
        buf
    }

    #[tokio::test]
    async fn test_print_expands_pipe_codes() {
        let (term, mut far) = test_terminal(OutputMode::Utf8);
        term.print("|07ok").await.expect("print");
        let out = read_available(&mut far).await;
        assert_eq!(out, b"\x1b[37;40mok".to_vec());
    }

    #[tokio::test]
    async fn test_goto_and_clear() {
        let (term, mut far) = test_terminal(OutputMode::Cp437);
        term.clear_screen().await.expect("clear");
        term.goto(5, 10).await.expect("goto");
        let out = read_available(&mut far).await;
        assert_eq!(out, b"\x1b[2J\x1b[H\x1b[5;10H".to_vec());
    }

    #[tokio::test]
    async fn test_auto_mode_resolves_at_construction() {
        let (term, _far) = test_terminal(OutputMode::Auto);
        assert_eq!(term.mode(), OutputMode::Utf8);
    }
}
