//! DVB SI text decoding.
//!
//! Strings in SI tables are length-prefixed byte runs. A first byte below
//! 0x20 selects a character table; this implementation skips the selector
//! and decodes the remainder as Latin-1, which is what the broadcasters
//! this tool targets actually emit. The full ETSI EN 300 468 annex A
//! selector logic is deliberately not implemented.

/// Decode an SI string to UTF-8. The 0x8A control code (line break) is
/// replaced with a space.
pub fn decode_text(raw: &[u8]) -> String {
    let raw = match raw.first() {
        Some(&b) if b < 0x20 => &raw[1..],
        _ => raw,
    };
    raw.iter()
        .map(|&b| if b == 0x8A { ' ' } else { char::from(b) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        assert_eq!(decode_text(b"TestRadio"), "TestRadio");
    }

    #[test]
    fn test_charset_selector_is_skipped() {
        assert_eq!(decode_text(b"\x05Radio"), "Radio");
    }

    #[test]
    fn test_latin1_maps_to_utf8() {
        assert_eq!(decode_text(&[0x42, 0xE4, 0x72]), "B\u{e4}r");
        assert_eq!(decode_text(&[0xFC]), "\u{fc}");
    }

    #[test]
    fn test_line_break_becomes_space() {
        assert_eq!(decode_text(&[b'a', 0x8A, b'b']), "a b");
    }
}
