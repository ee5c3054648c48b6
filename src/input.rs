//! Per-session keyboard reader.
//!
//! Exactly one [`InputHandler`] owns the read half of a session transport.
//! Every subsystem that wants keystrokes — the menu loop, the lightbar, chat,
//! a door's input pump — goes through it, so nothing ever races for bytes.
//!
//! A dedicated reader task pulls chunks off the transport and feeds a
//! channel; the handler drains that channel into an internal byte buffer.
//! Because unconsumed bytes stay buffered, interrupting a blocked read never
//! loses the keystroke that triggered it. That is the contract the door
//! runner depends on: when a door exits it cancels the read-interrupt token,
//! its input pump unblocks with [`SessionError::Interrupted`], and the user's
//! next key goes to the menu loop instead of a dead subprocess.
//!
//! # ESC ambiguity
//!
//! Byte `0x1B` is both the Escape key and the start of escape sequences. A
//! 20 ms timeout decides: no follow-up byte in time means a bare ESC,
//! otherwise the CSI/SS3 sequence is parsed into a cursor key.

// Rust guideline compliant 2026-02

use std::collections::VecDeque;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ansi::cp437::cp437_to_char;
use crate::errors::{SessionError, SessionResult};
use crate::terminal::SessionTerminal;

/// Timeout distinguishing a bare ESC from the prefix of a CSI sequence.
const ESC_SEQUENCE_TIMEOUT: Duration = Duration::from_millis(20);

/// Longest CSI parameter run we will buffer before giving up on a sequence.
const MAX_CSI_PARAMS: usize = 16;

/// Boxed read half of a session transport.
pub type SessionReader = Box<dyn AsyncRead + Send + Unpin>;

/// One resolved keystroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Printable character (CP437 input is translated).
    Char(char),
    /// CR or LF, normalized to one token.
    Enter,
    /// Backspace or DEL.
    Backspace,
    /// Bare ESC.
    Escape,
    /// Cursor up.
    Up,
    /// Cursor down.
    Down,
    /// Cursor left.
    Left,
    /// Cursor right.
    Right,
    /// Page up.
    PageUp,
    /// Page down.
    PageDown,
    /// Home.
    Home,
    /// End.
    End,
    /// Control character, e.g. `Ctrl('P')`.
    Ctrl(char),
    /// Anything unmapped (final byte of an unknown sequence).
    Other(u8),
}

/// Owns session input; see the module docs.
#[derive(Debug)]
pub struct InputHandler {
    rx: mpsc::Receiver<Vec<u8>>,
    buffer: VecDeque<u8>,
    interrupt: CancellationToken,
    eof: bool,
    /// A CR was just returned as Enter; swallow an immediately following
    /// LF or NUL (telnet sends CR LF / CR NUL).
    swallow_lf: bool,
    reader_task: JoinHandle<()>,
}

impl Drop for InputHandler {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

impl InputHandler {
    /// Takes ownership of the transport's read half and starts the reader
    /// task.
    #[must_use]
    pub fn new(mut reader: SessionReader) -> Self {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(32);
        let reader_task = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::debug!("session reader closing: {e}");
                        break;
                    }
                }
            }
        });
        Self {
            rx,
            buffer: VecDeque::new(),
            interrupt: CancellationToken::new(),
            eof: false,
            swallow_lf: false,
            reader_task,
        }
    }

    /// Token a cooperating task cancels to interrupt an in-flight read.
    ///
    /// The handler re-arms itself with a fresh token after each observed
    /// interrupt, so the clone is single-use.
    #[must_use]
    pub fn interrupt_token(&self) -> CancellationToken {
        self.interrupt.clone()
    }

    /// Cancels any in-flight read (equivalent to closing the read-interrupt
    /// channel).
    pub fn trigger_interrupt(&self) {
        self.interrupt.cancel();
    }

    /// Clears stale per-keystroke state (CR/LF pairing, unobserved
    /// interrupts).
    ///
    /// The menu executor calls this around runnables and doors so no
    /// subsystem inherits another's half-parsed input. Buffered bytes are
    /// preserved — they are real keystrokes.
    pub fn reset(&mut self) {
        self.swallow_lf = false;
        let _ = self.take_interrupt();
    }

    /// Observes and clears a pending interrupt.
    fn take_interrupt(&mut self) -> bool {
        if self.interrupt.is_cancelled() {
            self.interrupt = CancellationToken::new();
            true
        } else {
            false
        }
    }

    /// Blocks until one byte is available.
    ///
    /// Interrupt is checked before the buffer so a cancelled read never
    /// consumes the pending byte.
    pub async fn read_byte(&mut self) -> SessionResult<u8> {
        loop {
            if self.take_interrupt() {
                return Err(SessionError::Interrupted);
            }
            if let Some(byte) = self.buffer.pop_front() {
                return Ok(byte);
            }
            if self.eof {
                return Err(SessionError::Disconnected);
            }
            let token = self.interrupt.clone();
            tokio::select! {
                chunk = self.rx.recv() => match chunk {
                    Some(bytes) => self.buffer.extend(bytes),
                    None => self.eof = true,
                },
                () = token.cancelled() => {}
            }
        }
    }

    /// Drains every buffered byte, or blocks for the next chunk.
    ///
    /// This is the door input pump's read: whole chunks keep keystroke
    /// latency down through the PTY.
    pub async fn read_available(&mut self) -> SessionResult<Vec<u8>> {
        let first = self.read_byte().await?;
        let mut bytes = Vec::with_capacity(1 + self.buffer.len());
        bytes.push(first);
        while let Some(byte) = self.buffer.pop_front() {
            bytes.push(byte);
        }
        Ok(bytes)
    }

    /// `read_byte` bounded by `timeout`; `Ok(None)` when it elapses.
    async fn read_byte_within(&mut self, timeout: Duration) -> SessionResult<Option<u8>> {
        match tokio::time::timeout(timeout, self.read_byte()).await {
            Ok(result) => result.map(Some),
            Err(_elapsed) => Ok(None),
        }
    }

    /// Pushes a byte back so the next read sees it first.
    fn unread(&mut self, byte: u8) {
        self.buffer.push_front(byte);
    }

    /// Blocks until one keystroke is resolved.
    pub async fn read_key(&mut self) -> SessionResult<Key> {
        let mut byte = self.read_byte().await?;
        if self.swallow_lf {
            self.swallow_lf = false;
            if byte == b'\n' || byte == 0x00 {
                byte = self.read_byte().await?;
            }
        }
        match byte {
            0x0D => {
                self.swallow_lf = true;
                Ok(Key::Enter)
            }
            0x0A => Ok(Key::Enter),
            0x08 | 0x7F => Ok(Key::Backspace),
            0x1B => self.read_escape_sequence().await,
            0x01..=0x1A => Ok(Key::Ctrl((b'A' + byte - 1) as char)),
            0x00 | 0x1C..=0x1F => Ok(Key::Other(byte)),
            0x20..=0x7E => Ok(Key::Char(byte as char)),
            _ => Ok(Key::Char(cp437_to_char(byte))),
        }
    }

    /// Resolves what follows an ESC byte.
    async fn read_escape_sequence(&mut self) -> SessionResult<Key> {
        let Some(introducer) = self.read_byte_within(ESC_SEQUENCE_TIMEOUT).await? else {
            return Ok(Key::Escape);
        };
        match introducer {
            b'[' => {
                let mut params: Vec<u8> = Vec::new();
                loop {
                    let Some(byte) = self.read_byte_within(ESC_SEQUENCE_TIMEOUT).await? else {
                        // Unterminated sequence: report the ESC we have.
                        return Ok(Key::Escape);
                    };
                    if (0x40..=0x7E).contains(&byte) {
                        return Ok(map_csi(&params, byte));
                    }
                    params.push(byte);
                    if params.len() > MAX_CSI_PARAMS {
                        return Ok(Key::Escape);
                    }
                }
            }
            b'O' => {
                // SS3 (application cursor mode).
                match self.read_byte_within(ESC_SEQUENCE_TIMEOUT).await? {
                    Some(byte) => Ok(map_ss3(byte)),
                    None => Ok(Key::Escape),
                }
            }
            other => {
                // ESC followed by an ordinary byte (alt-chord): report ESC
                // and let the byte be read as its own key.
                self.unread(other);
                Ok(Key::Escape)
            }
        }
    }

    /// Reads an echoed line, terminated by CR or LF.
    ///
    /// Backspace erases and redraws; Ctrl-C returns
    /// [`SessionError::Interrupted`]; input beyond `max_len` is dropped.
    pub async fn read_line(
        &mut self,
        terminal: &SessionTerminal,
        max_len: usize,
    ) -> SessionResult<String> {
        self.read_line_inner(terminal, max_len, None).await
    }

    /// Reads a line echoing `*` per visible character.
    ///
    /// The entered bytes never reach the terminal, so no scrollback ever
    /// holds them.
    pub async fn read_password(
        &mut self,
        terminal: &SessionTerminal,
        max_len: usize,
    ) -> SessionResult<String> {
        self.read_line_inner(terminal, max_len, Some('*')).await
    }

    async fn read_line_inner(
        &mut self,
        terminal: &SessionTerminal,
        max_len: usize,
        mask: Option<char>,
    ) -> SessionResult<String> {
        let mut line = String::new();
        loop {
            match self.read_key().await? {
                Key::Enter => {
                    terminal.write_raw(b"\r\n").await?;
                    return Ok(line);
                }
                Key::Backspace => {
                    if line.pop().is_some() {
                        terminal.write_raw(b"\x08 \x08").await?;
                    }
                }
                Key::Ctrl('C') => return Err(SessionError::Interrupted),
                Key::Char(ch) => {
                    if line.chars().count() < max_len {
                        line.push(ch);
                        let echo = mask.unwrap_or(ch);
                        terminal.print(&echo.to_string()).await?;
                    }
                }
                // Cursor keys and stray controls are ignored inside a line.
                _ => {}
            }
        }
    }
}

/// Maps a complete CSI sequence to a key.
fn map_csi(params: &[u8], final_byte: u8) -> Key {
    match final_byte {
        b'A' => Key::Up,
        b'B' => Key::Down,
        b'C' => Key::Right,
        b'D' => Key::Left,
        b'H' => Key::Home,
        b'F' => Key::End,
        b'~' => match params {
            b"1" | b"7" => Key::Home,
            b"4" | b"8" => Key::End,
            b"5" => Key::PageUp,
            b"6" => Key::PageDown,
            _ => Key::Other(final_byte),
        },
        other => Key::Other(other),
    }
}

/// Maps an SS3 final byte (`ESC O x`) to a key.
fn map_ss3(byte: u8) -> Key {
    match byte {
        b'A' => Key::Up,
        b'B' => Key::Down,
        b'C' => Key::Right,
        b'D' => Key::Left,
        b'H' => Key::Home,
        b'F' => Key::End,
        other => Key::Other(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn handler_pair() -> (InputHandler, tokio::io::DuplexStream) {
        let (near, far) = tokio::io::duplex(1024);
        (InputHandler::new(Box::new(near)), far)
    }

    #[tokio::test]
    async fn test_plain_characters() {
        let (mut handler, mut far) = handler_pair();
        far.write_all(b"Ab1").await.expect("write");
        assert_eq!(handler.read_key().await.expect("key"), Key::Char('A'));
        assert_eq!(handler.read_key().await.expect("key"), Key::Char('b'));
        assert_eq!(handler.read_key().await.expect("key"), Key::Char('1'));
    }

    #[tokio::test]
    async fn test_crlf_is_one_enter() {
        let (mut handler, mut far) = handler_pair();
        far.write_all(b"\r\nX").await.expect("write");
        assert_eq!(handler.read_key().await.expect("key"), Key::Enter);
        assert_eq!(handler.read_key().await.expect("key"), Key::Char('X'));
    }

    #[tokio::test]
    async fn test_cursor_key_sequences() {
        let (mut handler, mut far) = handler_pair();
        far.write_all(b"\x1b[A\x1b[B\x1b[5~\x1b[6~\x1bOC")
            .await
            .expect("write");
        assert_eq!(handler.read_key().await.expect("key"), Key::Up);
        assert_eq!(handler.read_key().await.expect("key"), Key::Down);
        assert_eq!(handler.read_key().await.expect("key"), Key::PageUp);
        assert_eq!(handler.read_key().await.expect("key"), Key::PageDown);
        assert_eq!(handler.read_key().await.expect("key"), Key::Right);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bare_esc_resolves_after_timeout() {
        let (mut handler, mut far) = handler_pair();
        far.write_all(b"\x1b").await.expect("write");
        // Paused clock auto-advances once the read is idle, firing the
        // 20ms disambiguation timeout.
        assert_eq!(handler.read_key().await.expect("key"), Key::Escape);
    }

    #[tokio::test]
    async fn test_control_keys() {
        let (mut handler, mut far) = handler_pair();
        far.write_all(&[0x10, 0x03]).await.expect("write");
        assert_eq!(handler.read_key().await.expect("key"), Key::Ctrl('P'));
        assert_eq!(handler.read_key().await.expect("key"), Key::Ctrl('C'));
    }

    #[tokio::test]
    async fn test_cp437_high_byte_translates() {
        let (mut handler, mut far) = handler_pair();
        far.write_all(&[0x82]).await.expect("write");
        assert_eq!(handler.read_key().await.expect("key"), Key::Char('é'));
    }

    #[tokio::test]
    async fn test_eof_reports_disconnect() {
        let (mut handler, far) = handler_pair();
        drop(far);
        match handler.read_byte().await {
            Err(SessionError::Disconnected) => {}
            other => panic!("expected Disconnected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_interrupt_does_not_consume_pending_byte() {
        let (mut handler, mut far) = handler_pair();
        far.write_all(b"Z").await.expect("write");
        // Let the reader task move the byte into the channel.
        tokio::task::yield_now().await;
        handler.trigger_interrupt();
        match handler.read_byte().await {
            Err(SessionError::Interrupted) => {}
            other => panic!("expected Interrupted, got {other:?}"),
        }
        // The pending byte survives the interrupt.
        assert_eq!(handler.read_byte().await.expect("byte"), b'Z');
    }

    #[tokio::test]
    async fn test_interrupt_unblocks_inflight_read() {
        let (mut handler, _far) = handler_pair();
        let token = handler.interrupt_token();
        let read = tokio::spawn(async move {
            let result = handler.read_byte().await;
            (handler, result)
        });
        tokio::task::yield_now().await;
        token.cancel();
        let (_handler, result) = read.await.expect("join");
        assert!(matches!(result, Err(SessionError::Interrupted)));
    }

    #[tokio::test]
    async fn test_read_line_echo_and_backspace() {
        let (near, mut far) = tokio::io::duplex(1024);
        let (read_half, write_half) = tokio::io::split(near);
        let mut handler = InputHandler::new(Box::new(read_half));
        let terminal = SessionTerminal::new(
            Box::new(write_half),
            crate::ansi::OutputMode::Utf8,
            80,
            25,
        );
        far.write_all(b"hix\x08\r").await.expect("write");
        let line = handler.read_line(&terminal, 40).await.expect("line");
        assert_eq!(line, "hi");
    }

    #[tokio::test]
    async fn test_read_password_masks_echo() {
        use tokio::io::AsyncReadExt;
        let (near, mut far) = tokio::io::duplex(1024);
        let (read_half, write_half) = tokio::io::split(near);
        let mut handler = InputHandler::new(Box::new(read_half));
        let terminal = SessionTerminal::new(
            Box::new(write_half),
            crate::ansi::OutputMode::Utf8,
            80,
            25,
        );
        far.write_all(b"pw\r").await.expect("write");
        let line = handler.read_password(&terminal, 40).await.expect("line");
        assert_eq!(line, "pw");

        let mut echoed = vec![0u8; 64];
        let n = far.read(&mut echoed).await.expect("read echo");
        let echoed = &echoed[..n];
        assert!(!echoed.windows(2).any(|w| w == b"pw"), "password echoed");
        assert_eq!(echoed.iter().filter(|&&b| b == b'*').count(), 2);
    }
}
