//! Real-time chat room runnable.
//!
//! Full-screen layout: a header line, a scrolling message body, and a fixed
//! input line. The body is confined with a DECSTBM scroll region so new
//! messages scroll without disturbing the header or the line being typed.
//!
//! # Concurrency
//!
//! Two tasks touch the terminal at once: the node task reading input, and a
//! receiver task draining the chat subscription. Both append through one
//! atomic `write_raw` each (save cursor → print into body → restore), and
//! the terminal's writer mutex keeps the escape sequences from interleaving.
//! The receiver exits when [`ChatRoom::unsubscribe`] closes its channel.
//!
//! [`ChatRoom::unsubscribe`]: crate::session::ChatRoom::unsubscribe

// Rust guideline compliant 2026-02

use anyhow::Result;
use async_trait::async_trait;

use crate::ansi::render_str;
use crate::errors::SessionError;
use crate::session::ChatMessage;
use crate::terminal::SessionTerminal;

use super::{RunContext, RunOutcome, Runnable};

/// Messages of scrollback replayed on join.
const JOIN_HISTORY: usize = 15;

/// `RUN:CHAT` — the board-wide chat room.
#[derive(Debug)]
pub struct ChatRunnable;

#[async_trait]
impl Runnable for ChatRunnable {
    fn name(&self) -> &'static str {
        "CHAT"
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<RunOutcome> {
        let Some(handle) = ctx.user.as_ref().map(|u| u.handle.clone()) else {
            ctx.terminal
                .print_line("|12You must be logged in to chat.|07")
                .await?;
            return Ok(RunOutcome::done());
        };

        ctx.session.set_activity("Chatting");
        let result = chat_session(ctx, &handle).await;

        // The scroll region must be reset on every exit path, including a
        // dropped connection mid-chat.
        let _ = ctx.terminal.reset_scroll_region().await;
        let _ = ctx.terminal.clear_screen().await;
        ctx.session.set_activity("Menuing");

        match result {
            Ok(()) => Ok(RunOutcome::done()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Geometry of the chat screen for a given terminal height.
fn layout(height: u16) -> (u16, u16, u16) {
    let body_top = 2;
    let body_bottom = height.saturating_sub(2).max(body_top);
    let input_row = height.max(3);
    (body_top, body_bottom, input_row)
}

async fn chat_session(
    ctx: &mut RunContext<'_>,
    handle: &str,
) -> Result<(), SessionError> {
    let terminal = ctx.terminal.clone();
    let (body_top, body_bottom, input_row) = layout(terminal.height());

    terminal.clear_screen().await?;
    terminal.goto(1, 1).await?;
    terminal
        .print(&format!(
            "|B1|15 {} chat |07|B0 |08(/Q to leave)|07",
            ctx.config.board_name
        ))
        .await?;
    terminal.set_scroll_region(body_top, body_bottom).await?;

    // Replay recent history before announcing the join, so the newcomer's
    // own join line lands after the scrollback.
    let history = ctx.chat.history();
    let start = history.len().saturating_sub(JOIN_HISTORY);
    for message in &history[start..] {
        append_message(&terminal, body_bottom, message).await?;
    }

    let rx = ctx.chat.subscribe(ctx.node, handle);
    if !ctx.session.is_invisible() {
        ctx.chat
            .broadcast_system(&format!("{handle} has joined the chat"));
    }

    // Receiver: drains the subscription until unsubscribe closes it.
    let receiver_terminal = terminal.clone();
    let receiver = tokio::spawn(async move {
        let mut rx = rx;
        while let Some(message) = rx.recv().await {
            if append_message(&receiver_terminal, body_bottom, &message)
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let loop_result = input_loop(ctx, handle, body_bottom, input_row).await;

    ctx.chat.unsubscribe(ctx.node);
    if !ctx.session.is_invisible() {
        ctx.chat
            .broadcast_system(&format!("{handle} has left the chat"));
    }
    let _ = receiver.await;

    loop_result
}

async fn input_loop(
    ctx: &mut RunContext<'_>,
    handle: &str,
    body_bottom: u16,
    input_row: u16,
) -> Result<(), SessionError> {
    loop {
        ctx.terminal.goto(input_row, 1).await?;
        ctx.terminal.write_raw(b"\x1b[K").await?;
        ctx.terminal.print("|09> |07").await?;
        let line = match ctx
            .input
            .read_line(ctx.terminal, usize::from(ctx.terminal.width()).saturating_sub(4))
            .await
        {
            Ok(line) => line,
            Err(SessionError::Interrupted) => continue,
            Err(e) => return Err(e),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("/q") {
            return Ok(());
        }
        ctx.chat.broadcast(ctx.node, handle, line);
        // Self-suppression: the room does not echo to the sender, so the
        // local copy is rendered here.
        let own = ChatMessage {
            node: ctx.node,
            handle: handle.to_string(),
            text: line.to_string(),
            timestamp: chrono::Utc::now(),
            is_system: false,
        };
        append_message(ctx.terminal, body_bottom, &own).await?;
    }
}

/// Formats a chat message as a pipe-coded line.
#[must_use]
pub fn format_message(message: &ChatMessage) -> String {
    let stamp = message.timestamp.format("%H:%M");
    if message.is_system {
        format!("|08{stamp} |12*** {}|07", message.text)
    } else {
        format!("|08{stamp} |11[{}]|07 {}", message.handle, message.text)
    }
}

/// Appends one message to the scrolling body as a single atomic write.
async fn append_message(
    terminal: &SessionTerminal,
    body_bottom: u16,
    message: &ChatMessage,
) -> Result<(), SessionError> {
    let mut bytes = Vec::with_capacity(96);
    bytes.extend_from_slice(b"\x1b7"); // save cursor
    bytes.extend_from_slice(format!("\x1b[{body_bottom};1H").as_bytes());
    bytes.extend_from_slice(b"\r\n");
    bytes.extend_from_slice(&render_str(
        &format_message(message),
        terminal.mode(),
        None,
    ));
    bytes.extend_from_slice(b"\x1b8"); // restore cursor
    terminal.write_raw(&bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_layout_reserves_header_and_input() {
        let (top, bottom, input) = layout(25);
        assert_eq!(top, 2);
        assert_eq!(bottom, 23);
        assert_eq!(input, 25);
    }

    #[test]
    fn test_layout_survives_tiny_terminals() {
        let (top, bottom, input) = layout(3);
        assert!(top <= bottom);
        assert!(input >= bottom);
    }

    #[test]
    fn test_system_messages_get_distinguished_prefix() {
        let message = ChatMessage {
            node: 0,
            handle: String::new(),
            text: "Nomad has joined the chat".to_string(),
            timestamp: Utc::now(),
            is_system: true,
        };
        assert!(format_message(&message).contains("***"));

        let user_message = ChatMessage {
            node: 3,
            handle: "Nomad".to_string(),
            text: "hi".to_string(),
            timestamp: Utc::now(),
            is_system: false,
        };
        let formatted = format_message(&user_message);
        assert!(formatted.contains("[Nomad]"));
        assert!(!formatted.contains("***"));
    }
}
