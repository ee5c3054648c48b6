//! File-area browser.
//!
//! Absolute-coordinate layout: an optional authored top template, a
//! scrollable body of file entries, a horizontal command bar, and a
//! pagination line. Entry height varies — one name line plus however many
//! rows the description word-wraps to at the session's width — so scrolling
//! advances the top index by whole entries until the selection fits.
//!
//! Refresh is deliberately stingy: moving the selection inside the visible
//! window repaints two name lines; only a scroll repaints the body.
//!
//! Commands: mark/unmark (persists the user's tagged-file list immediately),
//! info overlay, view (archives go to the external inspector, text to the
//! pager), download (protocol pick, transfer delegated), upload (delegated),
//! quit.

// Rust guideline compliant 2026-02

use anyhow::Result;
use async_trait::async_trait;

use crate::ansi::screen::load_screen;
use crate::errors::SessionResult;
use crate::input::Key;
use crate::store::FileEntry;
use crate::terminal::SessionTerminal;

use super::pager::{page_text, wrap_lines};
use super::{RunContext, RunOutcome, Runnable};

/// Extensions the external archive inspector handles.
const ARCHIVE_EXTENSIONS: [&str; 5] = ["ZIP", "ARJ", "LZH", "RAR", "7Z"];

/// `RUN:FILELIST` — browse the current file area (`RUN:FILELIST:AREA` for a
/// specific one).
#[derive(Debug)]
pub struct FileListRunnable;

#[async_trait]
impl Runnable for FileListRunnable {
    fn name(&self) -> &'static str {
        "FILELIST"
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<RunOutcome> {
        let area = if ctx.arg.is_empty() {
            ctx.user
                .as_ref()
                .map(|u| u.file_area_tag.clone())
                .unwrap_or_default()
        } else {
            ctx.arg.to_uppercase()
        };
        if area.is_empty() {
            ctx.terminal.print_line("|12No file area selected.|07").await?;
            return Ok(RunOutcome::done());
        }

        let entries = ctx.files.entries(&area)?;
        if entries.is_empty() {
            ctx.terminal
                .print_line(&format!("|07No files in |15{area}|07."))
                .await?;
            return Ok(RunOutcome::done());
        }

        ctx.session.set_activity("Browsing files");
        let result = browse(ctx, &area, &entries).await;
        ctx.session.set_activity("Menuing");
        ctx.terminal.clear_screen().await?;
        result?;
        Ok(RunOutcome::done())
    }
}

/// Screen geometry for the browser.
#[derive(Debug, Clone, Copy)]
struct Layout {
    body_top: u16,
    body_bottom: u16,
    command_row: u16,
    pagination_row: u16,
    width: u16,
}

impl Layout {
    fn new(width: u16, height: u16, header_rows: u16) -> Self {
        let command_row = height.saturating_sub(1).max(3);
        Self {
            body_top: header_rows + 1,
            body_bottom: command_row.saturating_sub(1),
            command_row,
            pagination_row: height.max(4),
            width,
        }
    }

    fn body_rows(&self) -> usize {
        usize::from(self.body_bottom.saturating_sub(self.body_top)) + 1
    }
}

/// Rows an entry occupies at the given width.
fn entry_height(entry: &FileEntry, width: u16) -> usize {
    1 + description_lines(entry, width).len()
}

/// Longest description rendered under a name line; the info overlay shows
/// the rest.
const MAX_DESCRIPTION_ROWS: usize = 5;

fn description_lines(entry: &FileEntry, width: u16) -> Vec<String> {
    if entry.description.trim().is_empty() {
        return Vec::new();
    }
    let mut lines = wrap_lines(&entry.description, usize::from(width).saturating_sub(10));
    lines.truncate(MAX_DESCRIPTION_ROWS);
    lines
}

/// Visible slice: `(entry_index, start_row)` pairs that fit the body.
fn visible_slice(entries: &[FileEntry], top: usize, layout: Layout) -> Vec<(usize, u16)> {
    let mut rows_used = 0usize;
    let mut out = Vec::new();
    for (index, entry) in entries.iter().enumerate().skip(top) {
        let height = entry_height(entry, layout.width);
        if rows_used + height > layout.body_rows() {
            break;
        }
        out.push((index, layout.body_top + rows_used as u16));
        rows_used += height;
    }
    out
}

/// Advances/retreats `top` by whole entries until `selected` is visible.
fn fit_top(entries: &[FileEntry], mut top: usize, selected: usize, layout: Layout) -> usize {
    if selected < top {
        return selected;
    }
    while !visible_slice(entries, top, layout)
        .iter()
        .any(|(index, _)| *index == selected)
    {
        top += 1;
        if top >= entries.len() {
            return entries.len() - 1;
        }
    }
    top
}

fn human_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1}M", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{}K", bytes.div_ceil(1024))
    }
}

async fn browse(ctx: &mut RunContext<'_>, area: &str, entries: &[FileEntry]) -> Result<()> {
    let header_rows = draw_header(ctx, area).await?;
    let layout = Layout::new(ctx.terminal.width(), ctx.terminal.height(), header_rows);
    let mut selected = 0usize;
    let mut top = 0usize;

    draw_command_bar(ctx.terminal, layout).await?;
    draw_body(ctx, entries, top, selected, layout).await?;

    loop {
        let key = ctx.input.read_key().await?;
        let previous = selected;
        match key {
            Key::Up => selected = selected.saturating_sub(1),
            Key::Down => selected = (selected + 1).min(entries.len() - 1),
            Key::PageUp => selected = selected.saturating_sub(visible_slice(entries, top, layout).len().max(1)),
            Key::PageDown => {
                let step = visible_slice(entries, top, layout).len().max(1);
                selected = (selected + step).min(entries.len() - 1);
            }
            Key::Home => selected = 0,
            Key::End => selected = entries.len() - 1,
            Key::Char(c) if c.eq_ignore_ascii_case(&'m') => {
                toggle_mark(ctx, &entries[selected]).await?;
                draw_entry(ctx, entries, top, selected, true, layout).await?;
                continue;
            }
            Key::Char(c) if c.eq_ignore_ascii_case(&'i') => {
                info_overlay(ctx, &entries[selected]).await?;
                redraw_all(ctx, area, entries, top, selected, layout).await?;
                continue;
            }
            Key::Enter => {
                info_overlay(ctx, &entries[selected]).await?;
                redraw_all(ctx, area, entries, top, selected, layout).await?;
                continue;
            }
            Key::Char(c) if c.eq_ignore_ascii_case(&'v') => {
                view_entry(ctx, &entries[selected]).await?;
                redraw_all(ctx, area, entries, top, selected, layout).await?;
                continue;
            }
            Key::Char(c) if c.eq_ignore_ascii_case(&'d') => {
                download_entry(ctx, &entries[selected]).await?;
                redraw_all(ctx, area, entries, top, selected, layout).await?;
                continue;
            }
            Key::Char(c) if c.eq_ignore_ascii_case(&'u') => {
                ctx.terminal.goto(layout.pagination_row, 1).await?;
                ctx.terminal.write_raw(b"\x1b[K").await?;
                ctx.terminal
                    .print("|07Uploads are handled by your transfer client; start one now.|07")
                    .await?;
                continue;
            }
            Key::Char(c) if c.eq_ignore_ascii_case(&'q') => return Ok(()),
            Key::Escape => return Ok(()),
            _ => continue,
        }

        let new_top = fit_top(entries, top, selected, layout);
        if new_top != top {
            top = new_top;
            draw_body(ctx, entries, top, selected, layout).await?;
        } else if selected != previous {
            draw_entry(ctx, entries, top, previous, false, layout).await?;
            draw_entry(ctx, entries, top, selected, true, layout).await?;
            draw_pagination(ctx.terminal, selected, entries.len(), layout).await?;
        }
    }
}

/// Draws the top template (authored screen if present), returning the number
/// of rows it occupied.
async fn draw_header(ctx: &mut RunContext<'_>, area: &str) -> Result<u16> {
    ctx.terminal.clear_screen().await?;
    let template = ctx.menuset.template_path("FILETOP.ANS");
    if template.exists() {
        let screen = load_screen(&template, ctx.terminal.mode(), &[], None)?;
        ctx.terminal.write_processed(&screen.bytes).await?;
        let rows = screen.bytes.iter().filter(|&&b| b == b'\n').count() as u16 + 1;
        return Ok(rows.max(1));
    }
    ctx.terminal.goto(1, 1).await?;
    ctx.terminal
        .print(&format!("|B1|15 File area: {area} |07|B0"))
        .await?;
    ctx.terminal.goto(2, 1).await?;
    ctx.terminal
        .print("|08  #  Mark Name           Size    Date      Uploader|07")
        .await?;
    Ok(2)
}

async fn draw_command_bar(terminal: &SessionTerminal, layout: Layout) -> SessionResult<()> {
    terminal.goto(layout.command_row, 1).await?;
    terminal.write_raw(b"\x1b[K").await?;
    terminal
        .print("|09(|11M|09)ark (|11I|09)nfo (|11V|09)iew (|11D|09)ownload (|11U|09)pload (|11Q|09)uit|07")
        .await
}

async fn draw_pagination(
    terminal: &SessionTerminal,
    selected: usize,
    total: usize,
    layout: Layout,
) -> SessionResult<()> {
    terminal.goto(layout.pagination_row, 1).await?;
    terminal.write_raw(b"\x1b[K").await?;
    terminal
        .print(&format!("|08Entry {}/{}|07", selected + 1, total))
        .await
}

async fn draw_entry(
    ctx: &mut RunContext<'_>,
    entries: &[FileEntry],
    top: usize,
    index: usize,
    highlighted: bool,
    layout: Layout,
) -> Result<()> {
    let Some(&(_, start_row)) = visible_slice(entries, top, layout)
        .iter()
        .find(|(i, _)| *i == index)
    else {
        return Ok(());
    };
    let entry = &entries[index];
    let marked = ctx
        .user
        .as_ref()
        .is_some_and(|u| u.tagged_files.contains(&entry.id));

    let mark = if marked { "|14■|07" } else { " " };
    let name_line = format!(
        "{:>3}   {}  |15{:<14.14}|07 {:>7}  {}  |03{:<.15}|07",
        index + 1,
        mark,
        entry.name,
        human_size(entry.size_bytes),
        entry.uploaded_at.format("%m/%d/%y"),
        entry.uploader,
    );

    ctx.terminal.goto(start_row, 1).await?;
    ctx.terminal.write_raw(b"\x1b[K").await?;
    if highlighted {
        ctx.terminal.write_raw(b"\x1b[7m").await?;
        ctx.terminal.print(&name_line).await?;
        ctx.terminal.write_raw(b"\x1b[0m").await?;
    } else {
        ctx.terminal.print(&name_line).await?;
    }

    for (offset, line) in description_lines(entry, layout.width).iter().enumerate() {
        ctx.terminal.goto(start_row + 1 + offset as u16, 1).await?;
        ctx.terminal.write_raw(b"\x1b[K").await?;
        ctx.terminal.print(&format!("         |03{line}|07")).await?;
    }
    Ok(())
}

async fn draw_body(
    ctx: &mut RunContext<'_>,
    entries: &[FileEntry],
    top: usize,
    selected: usize,
    layout: Layout,
) -> Result<()> {
    // Clear the body region line by line; a full-screen clear would eat the
    // header and command bar.
    for row in layout.body_top..=layout.body_bottom {
        ctx.terminal.goto(row, 1).await?;
        ctx.terminal.write_raw(b"\x1b[K").await?;
    }
    let visible = visible_slice(entries, top, layout);
    for &(index, _) in &visible {
        draw_entry(ctx, entries, top, index, index == selected, layout).await?;
    }
    draw_pagination(ctx.terminal, selected, entries.len(), layout).await?;
    Ok(())
}

async fn redraw_all(
    ctx: &mut RunContext<'_>,
    area: &str,
    entries: &[FileEntry],
    top: usize,
    selected: usize,
    layout: Layout,
) -> Result<()> {
    draw_header(ctx, area).await?;
    draw_command_bar(ctx.terminal, layout).await?;
    draw_body(ctx, entries, top, selected, layout).await?;
    Ok(())
}

/// Toggles the entry in the user's tagged-file list, persisting immediately.
async fn toggle_mark(ctx: &mut RunContext<'_>, entry: &FileEntry) -> Result<()> {
    let Some(user) = ctx.user.as_mut() else {
        return Ok(());
    };
    user.toggle_tagged(&entry.id);
    ctx.save_user_logged();
    Ok(())
}

async fn info_overlay(ctx: &mut RunContext<'_>, entry: &FileEntry) -> Result<()> {
    let body = format!(
        "|15Name:|07     {}\r\n|15Size:|07     {} ({} bytes)\r\n|15Uploaded:|07 {} by {}\r\n\r\n{}",
        entry.name,
        human_size(entry.size_bytes),
        entry.size_bytes,
        entry.uploaded_at.format("%m/%d/%y %H:%M"),
        entry.uploader,
        entry.description,
    );
    page_text(ctx.terminal, ctx.input, &format!("File info — {}", entry.name), &body).await?;
    Ok(())
}

fn is_archive(name: &str) -> bool {
    name.rsplit('.')
        .next()
        .is_some_and(|ext| ARCHIVE_EXTENSIONS.contains(&ext.to_uppercase().as_str()))
}

async fn view_entry(ctx: &mut RunContext<'_>, entry: &FileEntry) -> Result<()> {
    if is_archive(&entry.name) {
        ctx.terminal
            .print_line("|07Archive contents are shown by the external inspector; not configured here.|07")
            .await?;
        pause(ctx).await?;
        return Ok(());
    }
    let Some(path) = entry.path.as_ref().filter(|p| p.exists()) else {
        ctx.terminal
            .print_line("|12The file's contents are not available on this node.|07")
            .await?;
        pause(ctx).await?;
        return Ok(());
    };
    let raw = std::fs::read(path)?;
    let text: String = raw
        .iter()
        .map(|&b| crate::ansi::cp437::cp437_to_char(b))
        .collect();
    page_text(ctx.terminal, ctx.input, &entry.name, &text).await?;
    Ok(())
}

async fn download_entry(ctx: &mut RunContext<'_>, entry: &FileEntry) -> Result<()> {
    ctx.terminal
        .print(&format!(
            "\r\n|07Protocol for |15{}|07 — (|11Z|07)modem, (|11X|07)modem, (|11Q|07)uit: ",
            entry.name
        ))
        .await?;
    loop {
        match ctx.input.read_key().await? {
            Key::Char(c) if c.eq_ignore_ascii_case(&'z') || c.eq_ignore_ascii_case(&'x') => {
                // The actual transfer binaries are external collaborators;
                // nothing on this node performs the protocol itself.
                log::info!(
                    "node {}: download of {} requested via {}",
                    ctx.node,
                    entry.id,
                    c.to_ascii_uppercase()
                );
                ctx.terminal
                    .print_line("\r\n|12No transfer binary is configured for this protocol.|07")
                    .await?;
                pause(ctx).await?;
                return Ok(());
            }
            Key::Char(c) if c.eq_ignore_ascii_case(&'q') => return Ok(()),
            Key::Escape => return Ok(()),
            _ => {}
        }
    }
}

async fn pause(ctx: &mut RunContext<'_>) -> Result<()> {
    ctx.terminal.print("|08Press any key...|07").await?;
    let _ = ctx.input.read_key().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(id: &str, desc: &str) -> FileEntry {
        FileEntry {
            id: id.to_string(),
            area: "UPLOADS".to_string(),
            name: id.to_string(),
            size_bytes: 2048,
            uploader: "Nomad".to_string(),
            uploaded_at: Utc::now(),
            description: desc.to_string(),
            path: None,
        }
    }

    fn test_layout() -> Layout {
        Layout::new(80, 25, 2)
    }

    #[test]
    fn test_entry_height_counts_wrapped_description() {
        let short = entry("A.TXT", "one line");
        assert_eq!(entry_height(&short, 80), 2);
        let none = entry("B.TXT", "");
        assert_eq!(entry_height(&none, 80), 1);
        let long = entry("C.TXT", &"word ".repeat(60));
        assert!(entry_height(&long, 80) > 3);
    }

    #[test]
    fn test_visible_slice_respects_body_rows() {
        let entries: Vec<FileEntry> = (0..40).map(|i| entry(&format!("F{i}"), "desc")).collect();
        let layout = test_layout();
        let visible = visible_slice(&entries, 0, layout);
        // Each entry is 2 rows; the body is 21 rows (3..=23) → 10 entries.
        assert_eq!(visible.len(), layout.body_rows() / 2);
        assert_eq!(visible[0], (0, layout.body_top));
        assert_eq!(visible[1].1, layout.body_top + 2);
    }

    #[test]
    fn test_fit_top_advances_by_whole_entries() {
        let entries: Vec<FileEntry> = (0..40).map(|i| entry(&format!("F{i}"), "desc")).collect();
        let layout = test_layout();
        // Selecting below the window scrolls forward just enough.
        let top = fit_top(&entries, 0, 12, layout);
        assert!(visible_slice(&entries, top, layout)
            .iter()
            .any(|(i, _)| *i == 12));
        // Selecting above the window snaps the window to the selection.
        assert_eq!(fit_top(&entries, 20, 5, layout), 5);
    }

    #[test]
    fn test_archive_detection() {
        assert!(is_archive("GAME.ZIP"));
        assert!(is_archive("game.rar"));
        assert!(!is_archive("README.TXT"));
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "1K");
        assert_eq!(human_size(2048), "2K");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0M");
    }
}
