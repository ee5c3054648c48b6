//! Pipe-code markup and CP437/ANSI byte-stream rendering.
//!
//! Everything a session sees goes through this module. It has a double role:
//!
//! - **Pass-through ANSI forwarder** — authored `.ANS` screens must reach the
//!   remote terminal byte-for-byte (modulo character-set transcoding), so
//!   escape sequences are detected and forwarded unchanged.
//! - **Markup compiler** — `|DD` color codes and `|X` substitutions embedded
//!   in prompts and strings are compiled down to standard SGR escapes and
//!   spliced text.
//!
//! The factoring is two passes: pipe-code expansion first
//! ([`expand_pipe_codes`]), then character-set transcoding ([`transcode`]).
//! ANSI escape detection skips both.
//!
//! # Markup grammar
//!
//! ```text
//! |DD        two decimal digits: low nibble = foreground 0-15,
//!            high nibble = background 0-7, emitted as one SGR
//! |B<digit>  background only
//! |X         single-byte substitution via a caller-supplied map;
//!            unknown X passes through literally
//! ```

// Rust guideline compliant 2026-02

pub mod cp437;
pub mod screen;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Character-set negotiated for a session's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputMode {
    /// Raw CP437 bytes — authored screens pass through verbatim.
    #[serde(rename = "CP437")]
    Cp437,
    /// CP437 input is translated to UTF-8 through the fixed table.
    #[serde(rename = "UTF8")]
    Utf8,
    /// Resolved at session setup; engine code never sees `Auto`.
    #[serde(rename = "AUTO")]
    #[default]
    Auto,
}

impl OutputMode {
    /// Collapses `Auto` to a concrete mode.
    ///
    /// Modern transports overwhelmingly speak UTF-8; a legacy caller that
    /// needs raw CP437 configures it explicitly.
    #[must_use]
    pub fn resolved(self) -> Self {
        match self {
            Self::Auto => Self::Utf8,
            other => other,
        }
    }
}

/// DOS color order → SGR foreground codes 30-37 (add 60 for bright 8-15).
const FG_SGR: [u8; 8] = [30, 34, 32, 36, 31, 35, 33, 37];
/// DOS color order → SGR background codes 40-47.
const BG_SGR: [u8; 8] = [40, 44, 42, 46, 41, 45, 43, 47];

/// SGR escape for a `|DD` pipe color value.
///
/// The low nibble selects foreground 0-15, the high nibble background 0-7.
#[must_use]
pub fn sgr_for_pipe_color(value: u8) -> String {
    let fg_index = (value & 0x0F) as usize;
    let bg_index = ((value >> 4) & 0x07) as usize;
    let fg = if fg_index < 8 {
        FG_SGR[fg_index]
    } else {
        FG_SGR[fg_index - 8] + 60
    };
    format!("\x1b[{};{}m", fg, BG_SGR[bg_index])
}

/// SGR escape for a `|B<digit>` background-only code.
#[must_use]
pub fn sgr_for_pipe_background(digit: u8) -> String {
    format!("\x1b[{}m", BG_SGR[(digit & 0x07) as usize])
}

/// Tracks whether the scan position is inside an ANSI escape sequence.
///
/// Both rendering passes and the screen coordinate extractor share this state
/// machine so that pipe characters and placeholder letters inside escape
/// sequences are never misinterpreted as markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EscapeState {
    /// Plain text.
    #[default]
    Ground,
    /// Saw `ESC`, waiting for the introducer byte.
    Escape,
    /// Inside `CSI ... final`; terminates on a byte in `0x40..=0x7E`.
    Csi,
}

impl EscapeState {
    /// Advances the state machine by one byte.
    ///
    /// Returns `true` while the byte belongs to an escape sequence (including
    /// the terminating final byte). An unterminated sequence simply leaves
    /// the state where it is; callers emit what has accumulated.
    pub fn advance(&mut self, byte: u8) -> bool {
        match *self {
            Self::Ground => {
                if byte == 0x1B {
                    *self = Self::Escape;
                    true
                } else {
                    false
                }
            }
            Self::Escape => {
                if byte == b'[' {
                    *self = Self::Csi;
                } else {
                    // Two-byte escape (ESC 7, ESC 8, ESC =, ...)
                    *self = Self::Ground;
                }
                true
            }
            Self::Csi => {
                if (0x40..=0x7E).contains(&byte) {
                    *self = Self::Ground;
                }
                true
            }
        }
    }
}

/// Per-byte substitution map for `|X` pipe codes.
pub type PipeSubstitutions = HashMap<u8, String>;

/// Expands `|DD`, `|B<digit>`, and `|X` markup into raw bytes.
///
/// ANSI escape sequences in the input are copied verbatim; a `|` inside an
/// escape sequence is not markup. Unknown `|X` pairs pass through literally,
/// with the byte after the pipe rescanned so `||07` still colors.
#[must_use]
pub fn expand_pipe_codes(input: &[u8], subs: Option<&PipeSubstitutions>) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() + input.len() / 4);
    let mut esc = EscapeState::default();
    let mut i = 0;

    while i < input.len() {
        let byte = input[i];

        if esc != EscapeState::Ground || byte == 0x1B {
            esc.advance(byte);
            out.push(byte);
            i += 1;
            continue;
        }

        if byte != b'|' {
            out.push(byte);
            i += 1;
            continue;
        }

        // `|` at end of input: literal.
        let Some(&next) = input.get(i + 1) else {
            out.push(byte);
            i += 1;
            continue;
        };

        // |DD color code.
        if next.is_ascii_digit() {
            if let Some(&second) = input.get(i + 2) {
                if second.is_ascii_digit() {
                    let value = (next - b'0') * 10 + (second - b'0');
                    out.extend_from_slice(sgr_for_pipe_color(value).as_bytes());
                    i += 3;
                    continue;
                }
            }
            // Lone digit after the pipe: literal.
            out.push(byte);
            i += 1;
            continue;
        }

        // |B<digit> background-only code.
        if next == b'B' {
            if let Some(&digit) = input.get(i + 2) {
                if digit.is_ascii_digit() {
                    out.extend_from_slice(sgr_for_pipe_background(digit - b'0').as_bytes());
                    i += 3;
                    continue;
                }
            }
        }

        // |X data-file substitution.
        if let Some(replacement) = subs.and_then(|m| m.get(&next)) {
            out.extend_from_slice(replacement.as_bytes());
            i += 2;
            continue;
        }

        // Unrecognized: the pipe is literal, rescan the following byte.
        out.push(byte);
        i += 1;
    }

    out
}

/// Transcodes a byte stream to the negotiated output character set.
///
/// ANSI escape sequences are forwarded unchanged in every mode. In CP437 mode
/// high bytes pass through verbatim; in UTF-8 mode they are translated
/// through the fixed CP437 table and emitted as UTF-8.
#[must_use]
pub fn transcode(input: &[u8], mode: OutputMode) -> Vec<u8> {
    match mode.resolved() {
        OutputMode::Cp437 => input.to_vec(),
        _ => {
            let mut out = Vec::with_capacity(input.len() + input.len() / 2);
            let mut esc = EscapeState::default();
            let mut buf = [0u8; 4];
            for &byte in input {
                if esc != EscapeState::Ground || byte == 0x1B {
                    esc.advance(byte);
                    out.push(byte);
                    continue;
                }
                if byte < 0x80 {
                    out.push(byte);
                } else {
                    let ch = cp437::cp437_to_char(byte);
                    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                }
            }
            out
        }
    }
}

/// Full render: pipe-code expansion, then character-set transcoding.
#[must_use]
pub fn render(input: &[u8], mode: OutputMode, subs: Option<&PipeSubstitutions>) -> Vec<u8> {
    transcode(&expand_pipe_codes(input, subs), mode)
}

/// Renders a UTF-8 string (prompts, chat lines) for the session.
///
/// The string is narrowed to CP437 first so that pipe expansion and
/// transcoding see the same byte domain authored screens use.
#[must_use]
pub fn render_str(text: &str, mode: OutputMode, subs: Option<&PipeSubstitutions>) -> Vec<u8> {
    render(&cp437::str_to_cp437(text), mode, subs)
}

/// Number of display columns `text` occupies once pipe codes are stripped.
///
/// Escape sequences and pipe markup take no columns; everything else counts
/// as one (CP437 is a single-width code page).
#[must_use]
pub fn visible_width(text: &str) -> usize {
    let expanded = expand_pipe_codes(&cp437::str_to_cp437(text), None);
    let mut esc = EscapeState::default();
    let mut width = 0;
    for &byte in &expanded {
        if esc != EscapeState::Ground || byte == 0x1B {
            esc.advance(byte);
            continue;
        }
        if byte != b'\r' && byte != b'\n' {
            width += 1;
        }
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_color_maps_dos_order() {
        // |04 = DOS red foreground on black.
        assert_eq!(sgr_for_pipe_color(4), "\x1b[31;40m");
        // |15 = bright white foreground.
        assert_eq!(sgr_for_pipe_color(15), "\x1b[97;40m");
        // High nibble 1 = blue background.
        assert_eq!(sgr_for_pipe_color(0x17), "\x1b[37;44m");
    }

    #[test]
    fn test_expand_color_code() {
        let out = expand_pipe_codes(b"|07hello", None);
        assert_eq!(out, b"\x1b[37;40mhello".to_vec());
    }

    #[test]
    fn test_expand_background_code() {
        let out = expand_pipe_codes(b"|B1x", None);
        assert_eq!(out, b"\x1b[44mx".to_vec());
    }

    #[test]
    fn test_unknown_substitution_passes_through() {
        let out = expand_pipe_codes(b"a|Qb", None);
        assert_eq!(out, b"a|Qb".to_vec());
    }

    #[test]
    fn test_substitution_splices_replacement() {
        let mut subs = PipeSubstitutions::new();
        subs.insert(b'N', "42".to_string());
        let out = expand_pipe_codes(b"node |N!", Some(&subs));
        assert_eq!(out, b"node 42!".to_vec());
    }

    #[test]
    fn test_trailing_pipe_is_literal() {
        assert_eq!(expand_pipe_codes(b"end|", None), b"end|".to_vec());
        assert_eq!(expand_pipe_codes(b"x|7", None), b"x|7".to_vec());
    }

    #[test]
    fn test_double_pipe_rescans() {
        let out = expand_pipe_codes(b"||07", None);
        assert_eq!(out, b"|\x1b[37;40m".to_vec());
    }

    #[test]
    fn test_pipe_inside_escape_sequence_untouched() {
        // A CSI sequence containing a pipe-ish byte must pass through.
        let input = b"\x1b[1;33mhi|07";
        let out = expand_pipe_codes(input, None);
        assert!(out.starts_with(b"\x1b[1;33mhi"));
        assert!(out.ends_with(b"\x1b[37;40m"));
    }

    #[test]
    fn test_transcode_cp437_mode_is_verbatim() {
        let input = [0xC9u8, 0xCD, 0xBB];
        assert_eq!(transcode(&input, OutputMode::Cp437), input.to_vec());
    }

    #[test]
    fn test_transcode_utf8_mode_translates_high_bytes() {
        let input = [0xC9u8, b'A', 0xBB];
        let out = transcode(&input, OutputMode::Utf8);
        assert_eq!(out, "╔A╗".as_bytes().to_vec());
    }

    #[test]
    fn test_transcode_forwards_escapes_in_utf8_mode() {
        let input = b"\x1b[2J\x1b[1;1Hok";
        assert_eq!(transcode(input, OutputMode::Utf8), input.to_vec());
    }

    #[test]
    fn test_utf8_output_contains_no_bare_high_bytes() {
        let mut input: Vec<u8> = (0x80..=0xFFu8).collect();
        input.extend_from_slice(b"\x1b[5;10Hplain");
        let out = transcode(&input, OutputMode::Utf8);
        assert!(String::from_utf8(out).is_ok());
    }

    #[test]
    fn test_auto_resolves_to_utf8() {
        assert_eq!(OutputMode::Auto.resolved(), OutputMode::Utf8);
        assert_eq!(OutputMode::Cp437.resolved(), OutputMode::Cp437);
    }

    #[test]
    fn test_visible_width_ignores_markup() {
        assert_eq!(visible_width("|07hi|15!"), 3);
        assert_eq!(visible_width("plain"), 5);
    }
}
