//! Cursor-absolute lightbar selection widget.
//!
//! Overlays a selection list on a pre-rendered background screen. Every
//! option knows its own `(row, col)`, colors, hotkey, and return value (from
//! the menu's `.BAR` file), so redrawing a selection change touches exactly
//! two screen positions — the old option repainted regular, the new one
//! highlighted. Nothing else on the screen is disturbed.

// Rust guideline compliant 2026-02

use crate::ansi::sgr_for_pipe_color;
use crate::errors::SessionResult;
use crate::input::{InputHandler, Key};
use crate::menu::loader::LightbarOption;
use crate::terminal::SessionTerminal;

/// Runs the lightbar over `background` (already-processed screen bytes).
///
/// Returns the confirmed option's return value, or `None` on ESC. A hotkey
/// press selects and confirms in one stroke; digits `1..=9` move the bar
/// without confirming.
pub async fn run_lightbar(
    terminal: &SessionTerminal,
    input: &mut InputHandler,
    background: &[u8],
    options: &[LightbarOption],
    initial: usize,
) -> SessionResult<Option<String>> {
    if options.is_empty() {
        return Ok(None);
    }
    let mut selected = initial.min(options.len() - 1);

    terminal.clear_screen().await?;
    terminal.write_processed(background).await?;
    terminal.hide_cursor().await?;
    for (index, option) in options.iter().enumerate() {
        draw_option(terminal, option, index == selected).await?;
    }

    let result = input_loop(terminal, input, options, &mut selected).await;
    terminal.show_cursor().await?;
    terminal.reset_attributes().await?;
    result
}

async fn input_loop(
    terminal: &SessionTerminal,
    input: &mut InputHandler,
    options: &[LightbarOption],
    selected: &mut usize,
) -> SessionResult<Option<String>> {
    loop {
        match input.read_key().await? {
            Key::Up | Key::Left => {
                let next = if *selected == 0 {
                    options.len() - 1
                } else {
                    *selected - 1
                };
                move_selection(terminal, options, selected, next).await?;
            }
            Key::Down | Key::Right => {
                let next = (*selected + 1) % options.len();
                move_selection(terminal, options, selected, next).await?;
            }
            Key::Char(c @ '1'..='9') => {
                let index = (c as usize) - ('1' as usize);
                if index < options.len() {
                    move_selection(terminal, options, selected, index).await?;
                }
            }
            Key::Char(' ') => return Ok(Some(options[*selected].value())),
            Key::Char(c) => {
                let upper = c.to_ascii_uppercase();
                if let Some(index) = options.iter().position(|o| o.hotkey == upper) {
                    move_selection(terminal, options, selected, index).await?;
                    return Ok(Some(options[index].value()));
                }
            }
            Key::Enter => return Ok(Some(options[*selected].value())),
            Key::Escape => return Ok(None),
            _ => {}
        }
    }
}

/// Redraws only the two affected options.
async fn move_selection(
    terminal: &SessionTerminal,
    options: &[LightbarOption],
    selected: &mut usize,
    next: usize,
) -> SessionResult<()> {
    if next == *selected {
        return Ok(());
    }
    draw_option(terminal, &options[*selected], false).await?;
    draw_option(terminal, &options[next], true).await?;
    *selected = next;
    Ok(())
}

async fn draw_option(
    terminal: &SessionTerminal,
    option: &LightbarOption,
    highlighted: bool,
) -> SessionResult<()> {
    let color = if highlighted {
        option.hi_color
    } else {
        option.lo_color
    };
    terminal.goto(option.row, option.col).await?;
    terminal
        .write_raw(sgr_for_pipe_color(color).as_bytes())
        .await?;
    terminal.print(&option.text).await?;
    terminal.reset_attributes().await
}

/// Two-option Yes/No bar drawn in place at the current cursor position.
///
/// Left/right (and up/down) flip the selection; `Y`/`N` jump; Enter or Space
/// confirms; ESC cancels. `initial_yes` picks the starting side.
pub async fn yes_no(
    terminal: &SessionTerminal,
    input: &mut InputHandler,
    prompt: &str,
    initial_yes: bool,
) -> SessionResult<Option<bool>> {
    let mut yes = initial_yes;
    draw_yes_no(terminal, prompt, yes).await?;
    loop {
        match input.read_key().await? {
            Key::Left | Key::Right | Key::Up | Key::Down => {
                yes = !yes;
                draw_yes_no(terminal, prompt, yes).await?;
            }
            Key::Char(c) if c.eq_ignore_ascii_case(&'y') => {
                draw_yes_no(terminal, prompt, true).await?;
                terminal.write_raw(b"\r\n").await?;
                return Ok(Some(true));
            }
            Key::Char(c) if c.eq_ignore_ascii_case(&'n') => {
                draw_yes_no(terminal, prompt, false).await?;
                terminal.write_raw(b"\r\n").await?;
                return Ok(Some(false));
            }
            Key::Enter | Key::Char(' ') => {
                terminal.write_raw(b"\r\n").await?;
                return Ok(Some(yes));
            }
            Key::Escape => {
                terminal.write_raw(b"\r\n").await?;
                return Ok(None);
            }
            _ => {}
        }
    }
}

async fn draw_yes_no(terminal: &SessionTerminal, prompt: &str, yes: bool) -> SessionResult<()> {
    let (yes_text, no_text) = if yes {
        ("\x1b[7m Yes \x1b[0m", "  No  ")
    } else {
        ("  Yes  ", "\x1b[7m No \x1b[0m")
    };
    terminal.write_raw(b"\r\x1b[K").await?;
    terminal.print(prompt).await?;
    terminal.write_raw(yes_text.as_bytes()).await?;
    terminal.write_raw(b" ").await?;
    terminal.write_raw(no_text.as_bytes()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ansi::OutputMode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn options() -> Vec<LightbarOption> {
        (0u16..3)
            .map(|i| LightbarOption {
                col: 10,
                row: 5 + i,
                hi_color: 15,
                lo_color: 7,
                hotkey: (b'A' + i as u8) as char,
                return_value: format!("OPT{i}"),
                text: format!("Option {i}"),
            })
            .collect()
    }

    /// Wires a widget session: returns (terminal, input, far-end stream).
    fn widget_session() -> (SessionTerminal, InputHandler, tokio::io::DuplexStream) {
        let (near, far) = tokio::io::duplex(64 * 1024);
        let (read_half, write_half) = tokio::io::split(near);
        let terminal = SessionTerminal::new(Box::new(write_half), OutputMode::Utf8, 80, 25);
        let input = InputHandler::new(Box::new(read_half));
        (terminal, input, far)
    }

    /// Drains widget output so the duplex buffer never fills.
    fn drain(mut far_read: tokio::io::ReadHalf<tokio::io::DuplexStream>) {
        tokio::spawn(async move {
            let mut sink = vec![0u8; 4096];
            while far_read.read(&mut sink).await.is_ok_and(|n| n > 0) {}
        });
    }

    #[tokio::test]
    async fn test_down_wraps_back_to_first() {
        let (terminal, mut input, far) = widget_session();
        let (far_read, mut far_write) = tokio::io::split(far);
        drain(far_read);
        // Down, Down, Down (wrap to 0), Enter.
        far_write
            .write_all(b"\x1b[B\x1b[B\x1b[B\r")
            .await
            .expect("write");
        let opts = options();
        let picked = run_lightbar(&terminal, &mut input, b"bg", &opts, 0)
            .await
            .expect("lightbar");
        assert_eq!(picked.as_deref(), Some("OPT0"));
    }

    #[tokio::test]
    async fn test_up_from_first_wraps_to_last() {
        let (terminal, mut input, far) = widget_session();
        let (far_read, mut far_write) = tokio::io::split(far);
        drain(far_read);
        far_write.write_all(b"\x1b[A\r").await.expect("write");
        let opts = options();
        let picked = run_lightbar(&terminal, &mut input, b"bg", &opts, 0)
            .await
            .expect("lightbar");
        assert_eq!(picked.as_deref(), Some("OPT2"));
    }

    #[tokio::test]
    async fn test_hotkey_confirms_directly() {
        let (terminal, mut input, far) = widget_session();
        let (far_read, mut far_write) = tokio::io::split(far);
        drain(far_read);
        far_write.write_all(b"b").await.expect("write");
        let opts = options();
        let picked = run_lightbar(&terminal, &mut input, b"bg", &opts, 0)
            .await
            .expect("lightbar");
        assert_eq!(picked.as_deref(), Some("OPT1"));
    }

    #[tokio::test]
    async fn test_digit_jumps_then_enter_confirms() {
        let (terminal, mut input, far) = widget_session();
        let (far_read, mut far_write) = tokio::io::split(far);
        drain(far_read);
        far_write.write_all(b"3\r").await.expect("write");
        let opts = options();
        let picked = run_lightbar(&terminal, &mut input, b"bg", &opts, 0)
            .await
            .expect("lightbar");
        assert_eq!(picked.as_deref(), Some("OPT2"));
    }

    #[tokio::test]
    async fn test_escape_cancels_with_empty_value() {
        let (terminal, mut input, far) = widget_session();
        let (far_read, mut far_write) = tokio::io::split(far);
        drain(far_read);
        far_write.write_all(b"\x1b").await.expect("write");
        // Give the ESC disambiguation timeout a follow-up silence.
        let opts = options();
        let picked = run_lightbar(&terminal, &mut input, b"bg", &opts, 0)
            .await
            .expect("lightbar");
        assert_eq!(picked, None);
    }

    #[tokio::test]
    async fn test_yes_no_arrow_flip() {
        let (terminal, mut input, far) = widget_session();
        let (far_read, mut far_write) = tokio::io::split(far);
        drain(far_read);
        far_write.write_all(b"\x1b[C\r").await.expect("write");
        let answer = yes_no(&terminal, &mut input, "Sure? ", true)
            .await
            .expect("yes_no");
        assert_eq!(answer, Some(false));
    }

    #[tokio::test]
    async fn test_yes_no_hotkeys() {
        let (terminal, mut input, far) = widget_session();
        let (far_read, mut far_write) = tokio::io::split(far);
        drain(far_read);
        far_write.write_all(b"n").await.expect("write");
        let answer = yes_no(&terminal, &mut input, "Sure? ", true)
            .await
            .expect("yes_no");
        assert_eq!(answer, Some(false));
    }
}
