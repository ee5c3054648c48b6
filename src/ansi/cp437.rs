//! CP437 ↔ Unicode transcoding table.
//!
//! Authored BBS screens are CP437: the high half of the byte range carries
//! box-drawing, shade blocks, and a handful of Latin/Greek glyphs. When a
//! session negotiates UTF-8 output we translate through this fixed table;
//! when it stays in CP437 mode the bytes pass through untouched.
//!
//! The table is the standard IBM PC code page 437 mapping. The reverse
//! direction is a lazily-built lookup so that UTF-8 input (e.g. a handle
//! typed on a modern terminal) can be narrowed back to CP437 for drop files
//! and legacy doors.

// Rust guideline compliant 2026-02

use std::collections::HashMap;
use std::sync::OnceLock;

/// Unicode equivalents for CP437 bytes `0x80..=0xFF`.
///
/// Index with `byte - 0x80`. Bytes below `0x80` are ASCII and map to
/// themselves.
pub const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', // 0x80
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ', // 0x90
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»', // 0xA0
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐', // 0xB0
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧', // 0xC0
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀', // 0xD0
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩', // 0xE0
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{00A0}', // 0xF0
];

/// Translates a single CP437 byte to its Unicode character.
#[must_use]
pub fn cp437_to_char(byte: u8) -> char {
    if byte < 0x80 {
        byte as char
    } else {
        CP437_HIGH[(byte - 0x80) as usize]
    }
}

fn reverse_table() -> &'static HashMap<char, u8> {
    static REVERSE: OnceLock<HashMap<char, u8>> = OnceLock::new();
    REVERSE.get_or_init(|| {
        let mut map = HashMap::with_capacity(128);
        for (i, ch) in CP437_HIGH.iter().enumerate() {
            map.insert(*ch, (i + 0x80) as u8);
        }
        map
    })
}

/// Narrows a Unicode character to its CP437 byte, if one exists.
#[must_use]
pub fn char_to_cp437(ch: char) -> Option<u8> {
    if ch.is_ascii() {
        Some(ch as u8)
    } else {
        reverse_table().get(&ch).copied()
    }
}

/// Narrows a Unicode string to CP437 bytes, substituting `?` for characters
/// outside the code page.
#[must_use]
pub fn str_to_cp437(s: &str) -> Vec<u8> {
    s.chars()
        .map(|ch| char_to_cp437(ch).unwrap_or(b'?'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_is_identity() {
        for b in 0u8..0x80 {
            assert_eq!(cp437_to_char(b), b as char);
            assert_eq!(char_to_cp437(b as char), Some(b));
        }
    }

    #[test]
    fn test_round_trip_all_256_bytes() {
        for b in 0u8..=255 {
            let ch = cp437_to_char(b);
            assert_eq!(char_to_cp437(ch), Some(b), "byte 0x{b:02X} did not round-trip");
        }
    }

    #[test]
    fn test_box_drawing_glyphs() {
        assert_eq!(cp437_to_char(0xC9), '╔');
        assert_eq!(cp437_to_char(0xCD), '═');
        assert_eq!(cp437_to_char(0xBB), '╗');
        assert_eq!(cp437_to_char(0xB0), '░');
        assert_eq!(cp437_to_char(0xDB), '█');
    }

    #[test]
    fn test_untranslatable_char_narrows_to_question_mark() {
        assert_eq!(char_to_cp437('€'), None);
        assert_eq!(str_to_cp437("a€b"), b"a?b".to_vec());
    }
}
