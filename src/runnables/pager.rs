//! Simple full-screen text pager.
//!
//! Used for reading messages and viewing text files from the file browser.
//! Pipe codes in the text are honored; long lines are hard-wrapped to the
//! terminal width.

// Rust guideline compliant 2026-02

use crate::ansi::visible_width;
use crate::errors::SessionResult;
use crate::input::{InputHandler, Key};
use crate::terminal::SessionTerminal;

/// Pages `text` under a title bar. Returns when the reader quits or runs
/// out of pages.
pub async fn page_text(
    terminal: &SessionTerminal,
    input: &mut InputHandler,
    title: &str,
    text: &str,
) -> SessionResult<()> {
    let width = usize::from(terminal.width());
    let page_rows = usize::from(terminal.height()).saturating_sub(3).max(1);
    let lines = wrap_lines(text, width);

    let mut offset = 0usize;
    loop {
        terminal.clear_screen().await?;
        terminal
            .print_line(&format!("|B1|15 {title} |07|B0"))
            .await?;
        for line in lines.iter().skip(offset).take(page_rows) {
            terminal.print_line(line).await?;
        }

        let at_end = offset + page_rows >= lines.len();
        if at_end {
            terminal.print("|08-- End -- press any key |07").await?;
            let _ = input.read_key().await?;
            return Ok(());
        }
        terminal
            .print("|08-- More -- Enter/Space=next, B=back, Q=quit |07")
            .await?;
        match input.read_key().await? {
            Key::Char('q') | Key::Char('Q') | Key::Escape => return Ok(()),
            Key::Char('b') | Key::Char('B') | Key::PageUp | Key::Up => {
                offset = offset.saturating_sub(page_rows);
            }
            _ => offset += page_rows,
        }
    }
}

/// Hard-wraps pipe-coded text to `width` display columns.
///
/// Wrapping counts visible columns only; color codes ride along for free.
#[must_use]
pub fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let width = width.max(8);
    let mut out = Vec::new();
    for raw_line in text.lines() {
        if visible_width(raw_line) <= width {
            out.push(raw_line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in raw_line.split(' ') {
            if current.is_empty() {
                current = word.to_string();
            } else if visible_width(&current) + 1 + visible_width(word) <= width {
                current.push(' ');
                current.push_str(word);
            } else {
                out.push(std::mem::take(&mut current));
                current = word.to_string();
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
    if out.is_empty() {
        out.push(String::new());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_respects_visible_width() {
        let lines = wrap_lines("|15one two three four five", 10);
        for line in &lines {
            assert!(visible_width(line) <= 10, "line too wide: {line}");
        }
        // Words survive intact.
        let joined = lines.join(" ");
        assert!(joined.contains("three"));
    }

    #[test]
    fn test_short_lines_pass_through() {
        let lines = wrap_lines("short\nlines", 40);
        assert_eq!(lines, vec!["short".to_string(), "lines".to_string()]);
    }

    #[test]
    fn test_empty_text_yields_one_blank_line() {
        assert_eq!(wrap_lines("", 40), vec![String::new()]);
    }
}
