//! Message-list overlay.
//!
//! Boxed 79-column list built from CP437 line-drawing characters. One row is
//! highlighted with reverse video; arrows move it, PgUp/PgDn page, Home/End
//! jump, Enter reads the message through the pager, `Q` quits.
//!
//! Refresh is optimized the same way the file browser's is: a selection
//! move inside the current page repaints exactly two rows; only a page
//! change repaints the body.

// Rust guideline compliant 2026-02

use anyhow::Result;
use async_trait::async_trait;

use crate::errors::SessionResult;
use crate::input::Key;
use crate::store::MessageHeader;
use crate::terminal::SessionTerminal;

use super::pager::page_text;
use super::{RunContext, RunOutcome, Runnable};

/// Overlay width in columns.
const BOX_WIDTH: usize = 79;
/// First body row (after top border, column headers, separator).
const BODY_TOP: u16 = 4;

/// `RUN:MSGLIST` — browse the current message area.
///
/// `RUN:MSGLIST:AREA` browses a specific area tag instead.
#[derive(Debug)]
pub struct MsgListRunnable;

#[async_trait]
impl Runnable for MsgListRunnable {
    fn name(&self) -> &'static str {
        "MSGLIST"
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<RunOutcome> {
        let area = if ctx.arg.is_empty() {
            ctx.user
                .as_ref()
                .map(|u| u.msg_area_tag.clone())
                .unwrap_or_default()
        } else {
            ctx.arg.to_uppercase()
        };
        if area.is_empty() {
            ctx.terminal
                .print_line("|12No message area selected.|07")
                .await?;
            return Ok(RunOutcome::done());
        }

        let headers = ctx.messages.headers(&area)?;
        if headers.is_empty() {
            ctx.terminal
                .print_line(&format!("|07No messages in |15{area}|07."))
                .await?;
            return Ok(RunOutcome::done());
        }

        ctx.session.set_activity("Reading messages");
        let result = browse(ctx, &area, &headers).await;
        ctx.session.set_activity("Menuing");
        ctx.terminal.clear_screen().await?;
        result?;
        Ok(RunOutcome::done())
    }
}

/// Rows of message entries per page for a terminal height.
fn page_size(height: u16) -> usize {
    usize::from(height.saturating_sub(6)).max(3)
}

async fn browse(
    ctx: &mut RunContext<'_>,
    area: &str,
    headers: &[MessageHeader],
) -> Result<()> {
    let rows = page_size(ctx.terminal.height());
    let mut selected = 0usize;
    let mut top = 0usize;

    draw_frame(ctx.terminal, area, headers.len()).await?;
    draw_body(ctx.terminal, headers, top, selected, rows).await?;

    loop {
        let key = ctx.input.read_key().await?;
        let previous = selected;
        match key {
            Key::Up => selected = selected.saturating_sub(1),
            Key::Down => selected = (selected + 1).min(headers.len() - 1),
            Key::PageUp => selected = selected.saturating_sub(rows),
            Key::PageDown => selected = (selected + rows).min(headers.len() - 1),
            Key::Home => selected = 0,
            Key::End => selected = headers.len() - 1,
            Key::Enter => {
                read_message(ctx, area, &headers[selected]).await?;
                draw_frame(ctx.terminal, area, headers.len()).await?;
                draw_body(ctx.terminal, headers, top, selected, rows).await?;
                continue;
            }
            Key::Char(c) if c.eq_ignore_ascii_case(&'q') => return Ok(()),
            Key::Escape => return Ok(()),
            _ => continue,
        }

        let new_top = fit_top(top, selected, rows);
        if new_top != top {
            top = new_top;
            draw_body(ctx.terminal, headers, top, selected, rows).await?;
        } else if selected != previous {
            // Smart refresh: repaint only the two affected rows.
            draw_row(ctx.terminal, headers, top, previous, false).await?;
            draw_row(ctx.terminal, headers, top, selected, true).await?;
        }
        draw_status(ctx.terminal, selected, headers.len()).await?;
    }
}

/// Scrolls `top` the minimum distance that keeps `selected` on the page.
fn fit_top(top: usize, selected: usize, rows: usize) -> usize {
    if selected < top {
        selected
    } else if selected >= top + rows {
        selected + 1 - rows
    } else {
        top
    }
}

/// Truncates or pads to an exact display width.
fn fit(text: &str, width: usize) -> String {
    let mut out: String = text.chars().take(width).collect();
    while out.chars().count() < width {
        out.push(' ');
    }
    out
}

async fn draw_frame(
    terminal: &SessionTerminal,
    area: &str,
    total: usize,
) -> SessionResult<()> {
    terminal.clear_screen().await?;
    let title = format!(" {area} — {total} messages ");
    let mut top_border = String::from("╔");
    top_border.push_str(&title);
    while top_border.chars().count() < BOX_WIDTH - 1 {
        top_border.push('═');
    }
    top_border.push('╗');

    terminal.goto(1, 1).await?;
    terminal.print(&format!("|09{top_border}|07")).await?;
    terminal.goto(2, 1).await?;
    terminal
        .print(&format!(
            "|09║|15{}|09║|07",
            fit("   ID  From           To             Subject                        Date", BOX_WIDTH - 2)
        ))
        .await?;
    terminal.goto(3, 1).await?;
    let mut sep = String::from("╟");
    while sep.chars().count() < BOX_WIDTH - 1 {
        sep.push('─');
    }
    sep.push('╢');
    terminal.print(&format!("|09{sep}|07")).await
}

fn format_entry(header: &MessageHeader) -> String {
    let date = header.posted_at.format("%m/%d/%y").to_string();
    format!(
        " {:>4}  {} {} {} {}",
        header.id,
        fit(&header.from, 13),
        fit(&header.to, 13),
        fit(&header.subject, 29),
        fit(&date, 8),
    )
}

async fn draw_row(
    terminal: &SessionTerminal,
    headers: &[MessageHeader],
    top: usize,
    index: usize,
    highlighted: bool,
) -> SessionResult<()> {
    let row = BODY_TOP + (index - top) as u16;
    let content = fit(&format_entry(&headers[index]), BOX_WIDTH - 2);
    terminal.goto(row, 1).await?;
    if highlighted {
        terminal.print("|09║").await?;
        terminal.write_raw(b"\x1b[7m").await?;
        terminal.print(&content).await?;
        terminal.write_raw(b"\x1b[0m").await?;
        terminal.print("|09║|07").await?;
    } else {
        terminal.print(&format!("|09║|07{content}|09║|07")).await?;
    }
    Ok(())
}

async fn draw_body(
    terminal: &SessionTerminal,
    headers: &[MessageHeader],
    top: usize,
    selected: usize,
    rows: usize,
) -> SessionResult<()> {
    for offset in 0..rows {
        let index = top + offset;
        if index < headers.len() {
            draw_row(terminal, headers, top, index, index == selected).await?;
        } else {
            // Blank filler row keeps the box closed.
            let row = BODY_TOP + offset as u16;
            terminal.goto(row, 1).await?;
            terminal
                .print(&format!("|09║|07{}|09║|07", fit("", BOX_WIDTH - 2)))
                .await?;
        }
    }
    let bottom_row = BODY_TOP + rows as u16;
    terminal.goto(bottom_row, 1).await?;
    let mut bottom = String::from("╚");
    while bottom.chars().count() < BOX_WIDTH - 1 {
        bottom.push('═');
    }
    bottom.push('╝');
    terminal.print(&format!("|09{bottom}|07")).await?;
    draw_status(terminal, selected, headers.len()).await
}

async fn draw_status(
    terminal: &SessionTerminal,
    selected: usize,
    total: usize,
) -> SessionResult<()> {
    let row = terminal.height();
    terminal.goto(row, 1).await?;
    terminal.write_raw(b"\x1b[K").await?;
    terminal
        .print(&format!(
            "|08Message {}/{} — arrows move, Enter reads, Q quits|07",
            selected + 1,
            total
        ))
        .await
}

async fn read_message(
    ctx: &mut RunContext<'_>,
    area: &str,
    header: &MessageHeader,
) -> Result<()> {
    let Some(message) = ctx.messages.read(area, header.id)? else {
        ctx.terminal
            .print_line("|12That message vanished from the base.|07")
            .await?;
        return Ok(());
    };

    let body = format!(
        "|15From:|07 {}\r\n|15To:|07   {}\r\n|15Date:|07 {}\r\n\r\n{}",
        message.header.from,
        message.header.to,
        message.header.posted_at.format("%m/%d/%y %H:%M"),
        message.body
    );
    page_text(
        ctx.terminal,
        ctx.input,
        &format!("{area} #{} — {}", header.id, header.subject),
        &body,
    )
    .await?;

    // Advance the per-area last-read pointer; a failed save is logged but
    // never aborts reading.
    if let Some(user) = ctx.user.as_mut() {
        let entry = user.last_read.entry(area.to_string()).or_insert(0);
        if header.id > *entry {
            *entry = header.id;
        }
    }
    ctx.save_user_logged();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_fit_top_keeps_selection_on_page() {
        assert_eq!(fit_top(0, 0, 10), 0);
        assert_eq!(fit_top(0, 9, 10), 0);
        assert_eq!(fit_top(0, 10, 10), 1);
        assert_eq!(fit_top(5, 3, 10), 3);
        assert_eq!(fit_top(5, 20, 10), 11);
    }

    #[test]
    fn test_fit_pads_and_truncates() {
        assert_eq!(fit("ab", 4), "ab  ");
        assert_eq!(fit("abcdef", 4), "abcd");
    }

    #[test]
    fn test_entry_row_is_fixed_width() {
        let header = MessageHeader {
            id: 12,
            area: "GENERAL".to_string(),
            from: "A very long sender handle".to_string(),
            to: "All".to_string(),
            subject: "An extremely long subject line that must be truncated".to_string(),
            posted_at: Utc::now(),
        };
        let entry = fit(&format_entry(&header), BOX_WIDTH - 2);
        assert_eq!(entry.chars().count(), BOX_WIDTH - 2);
    }

    #[test]
    fn test_page_size_floor() {
        assert_eq!(page_size(25), 19);
        assert_eq!(page_size(5), 3);
    }
}
