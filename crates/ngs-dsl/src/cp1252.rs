//! Code page 1252 helpers.
//!
//! Every input file is decoded from CP-1252 and every emitted string is
//! encoded back to it, so string bytes survive the round trip unchanged.

use encoding_rs::WINDOWS_1252;

/// Decode a whole file.
pub fn decode(bytes: &[u8]) -> String {
    WINDOWS_1252.decode(bytes).0.into_owned()
}

/// Decode a file into physical lines (`\n` separated, `\r` stripped).
pub fn decode_lines(bytes: &[u8]) -> Vec<String> {
    decode(bytes)
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
        .collect()
}

/// Encode text back to CP-1252. Text decoded by this module always maps
/// cleanly, so the round trip is byte-exact.
pub fn encode(text: &str) -> Vec<u8> {
    WINDOWS_1252.encode(text).0.into_owned()
}

/// Encoded byte length of a string (excluding any terminator).
pub fn byte_len(text: &str) -> usize {
    encode(text).len()
}

/// The character a single CP-1252 byte decodes to (used by `\xNN` escapes).
pub fn byte_char(b: u8) -> char {
    decode(&[b]).chars().next().unwrap_or('\u{FFFD}')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_high_bytes() {
        // 0xE9 is 'é', 0x80 is '€' in CP-1252.
        let text = decode(&[0x4C, 0xE9, 0x80]);
        assert_eq!(text, "Lé€");
        assert_eq!(encode(&text), vec![0x4C, 0xE9, 0x80]);
        assert_eq!(byte_len(&text), 3);
    }

    #[test]
    fn lines_strip_carriage_returns() {
        let lines = decode_lines(b"a\r\nb\nc");
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn escape_bytes_map_through_the_code_page() {
        assert_eq!(byte_char(0x80), '€');
        assert_eq!(encode(&byte_char(0x80).to_string()), vec![0x80]);
    }
}
