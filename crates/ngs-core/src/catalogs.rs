//! Parsers for the external constant catalogs.
//!
//! These files are inputs we do not own: the engine constants list, the
//! `Objects.h` header with the slot and static enums, and plugin descriptor
//! files. Each parser takes already-decoded text and is deliberately
//! tolerant — unrecognized lines are skipped, not reported.

use crate::literal::parse_int;

/// Parse `NAME: value` lines (the `scripter_constants.txt` format).
///
/// `;` starts a comment; blank lines and lines without a colon are skipped.
pub fn parse_constant_lines(text: &str) -> Vec<(String, i32)> {
    let mut out = Vec::new();
    for raw in text.lines() {
        let line = match raw.find(';') {
            Some(i) => &raw[..i],
            None => raw,
        };
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            continue;
        }
        if let Some(v) = parse_int(value) {
            out.push((name.to_string(), v as i32));
        }
    }
    out
}

/// Extract the slot and static enums from an `Objects.h` header.
///
/// The header holds C enums whose entries number sequentially unless an
/// `= n` override appears. The block containing `LARA` is the moveable
/// slot enum; the block containing `PLANT0` is the static enum.
pub fn parse_objects_header(text: &str) -> (Vec<(String, i32)>, Vec<(String, i32)>) {
    let mut slots = Vec::new();
    let mut statics = Vec::new();
    for block in enum_blocks(text) {
        let entries = parse_enum_entries(&block);
        if entries.iter().any(|(n, _)| n == "LARA") {
            slots = entries;
        } else if entries.iter().any(|(n, _)| n == "PLANT0") {
            statics = entries;
        }
    }
    (slots, statics)
}

/// Parse a plugin descriptor: constant lines between `<START_CONSTANTS>`
/// and `<END>` markers, or the whole file when no markers are present.
pub fn parse_descriptor(text: &str) -> Vec<(String, i32)> {
    let upper = text.to_ascii_uppercase();
    let section = match upper.find("<START_CONSTANTS>") {
        Some(start) => {
            let body_start = start + "<START_CONSTANTS>".len();
            let body_end = upper[body_start..]
                .find("<END>")
                .map(|i| body_start + i)
                .unwrap_or(text.len());
            &text[body_start..body_end]
        }
        None => text,
    };
    parse_constant_lines(section)
}

/// The text of every `enum { ... }` block body in the header.
fn enum_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find("enum") {
        let after = &rest[pos + 4..];
        let Some(open) = after.find('{') else { break };
        let Some(close) = after[open..].find('}') else { break };
        blocks.push(after[open + 1..open + close].to_string());
        rest = &after[open + close..];
    }
    blocks
}

fn parse_enum_entries(body: &str) -> Vec<(String, i32)> {
    let mut out = Vec::new();
    let mut next = 0i32;
    for entry in body.split(',') {
        let entry = strip_line_comments(entry);
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (name, value) = match entry.split_once('=') {
            Some((n, v)) => {
                let Some(v) = parse_int(v) else { continue };
                (n.trim(), v as i32)
            }
            None => (entry, next),
        };
        if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') && !name.is_empty() {
            next = value + 1;
            out.push((name.to_string(), value));
        }
    }
    out
}

fn strip_line_comments(entry: &str) -> String {
    entry
        .lines()
        .map(|l| match l.find("//") {
            Some(i) => &l[..i],
            None => l,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_skip_comments_and_junk() {
        let text = "\
; engine constants
CUST_AMMO: 12
CUST_DARTS: $1A ; hex value
not a constant line
BAD NAME: 3
";
        let parsed = parse_constant_lines(text);
        assert_eq!(
            parsed,
            vec![("CUST_AMMO".to_string(), 12), ("CUST_DARTS".to_string(), 0x1A)]
        );
    }

    #[test]
    fn objects_header_yields_both_enums() {
        let header = "\
typedef enum {
    LARA, // player
    PISTOLS_ANIM,
    UZI_ANIM = 3,
    SHOTGUN_ANIM,
} GAME_OBJECT_ID;

typedef enum {
    PLANT0,
    PLANT1,
    FURNITURE0 = 10,
} STATIC_OBJECT_ID;
";
        let (slots, statics) = parse_objects_header(header);
        assert_eq!(slots[0], ("LARA".to_string(), 0));
        assert_eq!(slots[2], ("UZI_ANIM".to_string(), 3));
        assert_eq!(slots[3], ("SHOTGUN_ANIM".to_string(), 4));
        assert_eq!(statics[2], ("FURNITURE0".to_string(), 10));
    }

    #[test]
    fn descriptor_markers_bound_the_constant_section() {
        let text = "\
header text, ignored: 1
<START_CONSTANTS>
TRIG_FADE: 7
TRIG_FLASH: 8
<END>
TRAILING: 9
";
        let parsed = parse_descriptor(text);
        assert_eq!(
            parsed,
            vec![("TRIG_FADE".to_string(), 7), ("TRIG_FLASH".to_string(), 8)]
        );
    }

    #[test]
    fn descriptor_without_markers_reads_everything() {
        let parsed = parse_descriptor("A: 1\nB: 2\n");
        assert_eq!(parsed.len(), 2);
    }
}
