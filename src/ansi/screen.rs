//! Authored-screen processing: SAUCE stripping, CRLF normalization, and
//! placeholder coordinate extraction.
//!
//! Screens live under `<menuSet>/ansi/<NAME>.ANS` as CP437 text with raw
//! ANSI escapes. Some screens are authored with single-letter placeholders
//! (`P` for the handle field on LOGIN, `O` for the password field, and the
//! template letters used by list overlays). While transcoding a screen for
//! interactive use we track a virtual cursor through `CSI row;colH`,
//! `CSI row;colf`, relative moves, and literal character width; when a
//! reserved letter is encountered outside an escape sequence its position is
//! recorded and the letter is elided from the output.
//!
//! # Processing order
//!
//! ```text
//! raw file bytes
//!   → strip SAUCE metadata (trailing 128-byte record + COMNT block + 0x1A)
//!   → normalize lone LF to CRLF (outside escape sequences)
//!   → expand pipe codes
//!   → extract placeholder coordinates (elide the letters)
//!   → transcode to the negotiated output mode
//! ```

// Rust guideline compliant 2026-02

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

use super::{expand_pipe_codes, transcode, EscapeState, OutputMode, PipeSubstitutions};

/// Placeholder letters reserved on the LOGIN screen: `P` = handle field,
/// `O` = password field.
pub const LOGIN_PLACEHOLDERS: &[u8] = b"PO";

/// Mapping from a placeholder letter to its 1-based `(row, col)` position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinateMap {
    coords: HashMap<char, (u16, u16)>,
}

impl CoordinateMap {
    /// Position recorded for `letter`, if the screen contained it.
    #[must_use]
    pub fn get(&self, letter: char) -> Option<(u16, u16)> {
        self.coords.get(&letter).copied()
    }

    /// Whether any placeholder was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    fn insert(&mut self, letter: char, row: u16, col: u16) {
        self.coords.insert(letter, (row, col));
    }
}

/// A screen rendered for a session plus its extracted placeholder positions.
#[derive(Debug, Clone)]
pub struct ProcessedScreen {
    /// Bytes ready to write to the session, in the negotiated output mode.
    pub bytes: Vec<u8>,
    /// Placeholder positions discovered during processing.
    pub coords: CoordinateMap,
}

/// A SAUCE record is always the trailing 128 bytes of the file.
const SAUCE_LEN: usize = 128;
/// Offset of the comment-line count within the SAUCE record.
const SAUCE_COMMENTS_OFFSET: usize = 104;
/// A comment block is `COMNT` + 64 bytes per line.
const COMNT_HEADER_LEN: usize = 5;
const COMNT_LINE_LEN: usize = 64;

/// Strips a trailing SAUCE metadata record, its comment block, and the
/// DOS EOF marker, returning the art payload.
///
/// Files without SAUCE come back unchanged.
#[must_use]
pub fn strip_sauce(raw: &[u8]) -> &[u8] {
    if raw.len() < SAUCE_LEN {
        return raw;
    }
    let record_start = raw.len() - SAUCE_LEN;
    if &raw[record_start..record_start + 7] != b"SAUCE00" {
        return raw;
    }

    let mut end = record_start;
    let comment_lines = raw[record_start + SAUCE_COMMENTS_OFFSET] as usize;
    if comment_lines > 0 {
        let block_len = COMNT_HEADER_LEN + COMNT_LINE_LEN * comment_lines;
        if end >= block_len && &raw[end - block_len..end - block_len + COMNT_HEADER_LEN] == b"COMNT"
        {
            end -= block_len;
        }
    }

    // DOS EOF marker written just before the metadata.
    if end > 0 && raw[end - 1] == 0x1A {
        end -= 1;
    }
    &raw[..end]
}

/// Rewrites lone `LF` as `CRLF` outside escape sequences.
///
/// Authored screens are CRLF files already; this protects hand-edited ones
/// from stair-stepping on terminals without LNM. Bytes inside escape
/// sequences are never touched.
#[must_use]
pub fn normalize_crlf(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + 16);
    let mut esc = EscapeState::default();
    let mut prev: u8 = 0;
    for &byte in raw {
        if esc != EscapeState::Ground || byte == 0x1B {
            esc.advance(byte);
            out.push(byte);
            prev = byte;
            continue;
        }
        if byte == b'\n' && prev != b'\r' {
            out.push(b'\r');
        }
        out.push(byte);
        prev = byte;
    }
    out
}

/// Virtual cursor used while walking a screen for placeholder extraction.
#[derive(Debug)]
struct VirtualCursor {
    row: u16,
    col: u16,
}

impl VirtualCursor {
    fn new() -> Self {
        Self { row: 1, col: 1 }
    }

    /// Applies a complete CSI sequence (`params` excludes `ESC [` and the
    /// final byte).
    fn apply_csi(&mut self, params: &[u8], final_byte: u8) {
        let mut nums = params
            .split(|&b| b == b';')
            .map(|p| std::str::from_utf8(p).ok().and_then(|s| s.parse::<u16>().ok()));
        let first = nums.next().flatten();
        let second = nums.next().flatten();
        match final_byte {
            b'H' | b'f' => {
                self.row = first.unwrap_or(1).max(1);
                self.col = second.unwrap_or(1).max(1);
            }
            b'A' => self.row = self.row.saturating_sub(first.unwrap_or(1)).max(1),
            b'B' => self.row = self.row.saturating_add(first.unwrap_or(1)),
            b'C' => self.col = self.col.saturating_add(first.unwrap_or(1)),
            b'D' => self.col = self.col.saturating_sub(first.unwrap_or(1)).max(1),
            // Clears and SGR do not move the cursor.
            _ => {}
        }
    }

    fn advance_char(&mut self) {
        self.col += 1;
    }

    fn newline(&mut self) {
        self.row += 1;
    }

    fn carriage_return(&mut self) {
        self.col = 1;
    }
}

/// Walks `input`, recording and eliding reserved placeholder letters.
///
/// Placeholder letters inside escape sequences are ignored. The returned
/// bytes are `input` minus the recognized placeholders.
#[must_use]
pub fn extract_coordinates(input: &[u8], placeholders: &[u8]) -> (Vec<u8>, CoordinateMap) {
    let mut out = Vec::with_capacity(input.len());
    let mut coords = CoordinateMap::default();
    let mut cursor = VirtualCursor::new();

    let mut esc = EscapeState::default();
    // Parameter bytes of the CSI sequence currently being scanned.
    let mut csi_params: Vec<u8> = Vec::new();

    for &byte in input {
        if esc != EscapeState::Ground || byte == 0x1B {
            let before = esc;
            esc.advance(byte);
            out.push(byte);
            match before {
                EscapeState::Ground | EscapeState::Escape => csi_params.clear(),
                EscapeState::Csi => {
                    if esc == EscapeState::Ground {
                        cursor.apply_csi(&csi_params, byte);
                        csi_params.clear();
                    } else {
                        csi_params.push(byte);
                    }
                }
            }
            continue;
        }

        match byte {
            b'\r' => {
                cursor.carriage_return();
                out.push(byte);
            }
            b'\n' => {
                cursor.newline();
                out.push(byte);
            }
            _ if placeholders.contains(&byte) => {
                coords.insert(byte as char, cursor.row, cursor.col);
                // Elided: the cursor does not advance for a letter that is
                // never written.
            }
            _ => {
                cursor.advance_char();
                out.push(byte);
            }
        }
    }

    (out, coords)
}

/// Processes raw screen-file bytes for a session.
///
/// Applies the full pipeline described in the module docs. `placeholders`
/// may be empty for plain display screens.
#[must_use]
pub fn process_screen(
    raw: &[u8],
    mode: OutputMode,
    placeholders: &[u8],
    subs: Option<&PipeSubstitutions>,
) -> ProcessedScreen {
    let stripped = strip_sauce(raw);
    let normalized = normalize_crlf(stripped);
    let expanded = expand_pipe_codes(&normalized, subs);
    let (elided, coords) = extract_coordinates(&expanded, placeholders);
    ProcessedScreen {
        bytes: transcode(&elided, mode),
        coords,
    }
}

/// Reads and processes `<path>` as an authored screen.
pub fn load_screen(
    path: &Path,
    mode: OutputMode,
    placeholders: &[u8],
    subs: Option<&PipeSubstitutions>,
) -> Result<ProcessedScreen> {
    let raw = std::fs::read(path)
        .with_context(|| format!("failed to read screen file {}", path.display()))?;
    Ok(process_screen(&raw, mode, placeholders, subs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sauce_record(comment_lines: u8) -> Vec<u8> {
        let mut rec = vec![0u8; SAUCE_LEN];
        rec[..7].copy_from_slice(b"SAUCE00");
        rec[SAUCE_COMMENTS_OFFSET] = comment_lines;
        rec
    }

    #[test]
    fn test_strip_sauce_removes_record_and_eof_marker() {
        let mut data = b"art body".to_vec();
        data.push(0x1A);
        data.extend_from_slice(&sauce_record(0));
        assert_eq!(strip_sauce(&data), b"art body");
    }

    #[test]
    fn test_strip_sauce_removes_comment_block() {
        let mut data = b"body".to_vec();
        data.push(0x1A);
        data.extend_from_slice(b"COMNT");
        data.extend_from_slice(&[b' '; COMNT_LINE_LEN]);
        data.extend_from_slice(&sauce_record(1));
        assert_eq!(strip_sauce(&data), b"body");
    }

    #[test]
    fn test_strip_sauce_leaves_plain_files_alone() {
        let data = vec![b'x'; 200];
        assert_eq!(strip_sauce(&data), data.as_slice());
    }

    #[test]
    fn test_normalize_crlf_outside_escapes_only() {
        let input = b"a\nb\r\nc\x1b[2\nm";
        // The LF inside the (malformed but in-flight) CSI must not gain a CR.
        let out = normalize_crlf(input);
        assert_eq!(out, b"a\r\nb\r\nc\x1b[2\nm".to_vec());
    }

    #[test]
    fn test_extract_login_placeholders() {
        let input = b"\x1b[5;10HP\x1b[7;10HO";
        let (bytes, coords) = extract_coordinates(input, LOGIN_PLACEHOLDERS);
        assert_eq!(coords.get('P'), Some((5, 10)));
        assert_eq!(coords.get('O'), Some((7, 10)));
        assert!(!bytes.contains(&b'P'));
        assert!(!bytes.contains(&b'O'));
    }

    #[test]
    fn test_placeholder_position_tracks_literal_width() {
        // Three characters precede the placeholder on row 1.
        let (_, coords) = extract_coordinates(b"abcP", b"P");
        assert_eq!(coords.get('P'), Some((1, 4)));
    }

    #[test]
    fn test_placeholder_after_newline() {
        let (_, coords) = extract_coordinates(b"ab\r\nP", b"P");
        assert_eq!(coords.get('P'), Some((2, 1)));
    }

    #[test]
    fn test_placeholder_inside_escape_is_ignored() {
        // `P` never appears as a CSI parameter byte in real screens, but the
        // extractor must not trip on letters inside sequences it forwards.
        let input = b"\x1b[1;1Hxyz";
        let (bytes, coords) = extract_coordinates(input, b"H");
        assert!(coords.get('H').is_none());
        assert_eq!(bytes, input.to_vec());
    }

    #[test]
    fn test_relative_cursor_moves() {
        let input = b"\x1b[3;3H\x1b[2Cab\x1b[1BP";
        let (_, coords) = extract_coordinates(input, b"P");
        // (3,3) + 2 right + "ab" = col 7, +1 down = row 4.
        assert_eq!(coords.get('P'), Some((4, 7)));
    }

    #[test]
    fn test_process_screen_elides_and_transcodes() {
        let mut raw = b"\x1b[2;4HP".to_vec();
        raw.push(0xCD); // ═
        let screen = process_screen(&raw, OutputMode::Utf8, LOGIN_PLACEHOLDERS, None);
        assert_eq!(screen.coords.get('P'), Some((2, 4)));
        let text = String::from_utf8(screen.bytes).expect("utf8 output");
        assert!(text.ends_with('═'));
        assert!(!text.contains('P'));
    }
}
