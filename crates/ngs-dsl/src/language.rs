//! The language-file parser.
//!
//! A language file has four sections: `[Strings]`, `[PSX Strings]`,
//! `[PC Strings]` and `[ExtraNG]`. Every non-empty non-comment line is a
//! string literal (ExtraNG lines are `index: text` pairs). The parser also
//! fills in the byte offsets and cumulative section sizes the container
//! writer needs.

use ngs_core::diagnostics::{Collector, DiagnosticKind};
use ngs_core::language::LanguageTable;

use crate::cp1252;
use crate::lexer::strip_comment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LangSection {
    Strings,
    Psx,
    Pc,
    ExtraNg,
}

fn section_for(header: &str) -> Option<LangSection> {
    let key: String = header
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && *c != '_')
        .collect::<String>()
        .to_ascii_uppercase();
    match key.as_str() {
        "[STRINGS]" => Some(LangSection::Strings),
        "[PSXSTRINGS]" => Some(LangSection::Psx),
        "[PCSTRINGS]" => Some(LangSection::Pc),
        "[EXTRANG]" => Some(LangSection::ExtraNg),
        _ => None,
    }
}

/// Parse one language file.
///
/// `file` is the base name used in diagnostics. Parse problems in a
/// language file are fatal.
pub fn parse_language(text: &str, file: &str, diag: &mut Collector) -> LanguageTable {
    let mut table = LanguageTable::default();
    let mut section = LangSection::Strings;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx as u32 + 1;
        let line = strip_comment(raw, true).trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('[') {
            match section_for(line) {
                Some(s) => section = s,
                None => diag.error(
                    DiagnosticKind::Parse,
                    file,
                    line_no,
                    format!("unknown language section: {line}"),
                ),
            }
            continue;
        }
        match section {
            LangSection::ExtraNg => {
                let Some((index, text)) = line.split_once(':') else {
                    diag.error(
                        DiagnosticKind::Parse,
                        file,
                        line_no,
                        format!("extra NG entry without an index: \"{line}\""),
                    );
                    continue;
                };
                let Ok(index) = index.trim().parse::<u16>() else {
                    diag.error(
                        DiagnosticKind::Parse,
                        file,
                        line_no,
                        format!("bad extra NG index: \"{}\"", index.trim()),
                    );
                    continue;
                };
                if index & 0x8000 != 0 {
                    diag.error(
                        DiagnosticKind::Range,
                        file,
                        line_no,
                        format!("extra NG index {index} exceeds 0x7FFF"),
                    );
                    continue;
                }
                let text = unescape(text.trim_start());
                table.section_sizes[3] += cp1252::byte_len(&text) as u32 + 1;
                table.extras.push((index, text));
            }
            plain => {
                // Special tags are disabled in ExtraNG only.
                let body = strip_special_tag(line);
                let text = unescape(body);
                let slot = match plain {
                    LangSection::Strings => 0,
                    LangSection::Psx => 1,
                    _ => 2,
                };
                table.section_sizes[slot] += cp1252::byte_len(&text) as u32 + 1;
                match plain {
                    LangSection::Strings => table.strings.push(text),
                    LangSection::Psx => table.psx_strings.push(text),
                    _ => table.pc_strings.push(text),
                }
            }
        }
    }

    build_offsets(&mut table, file, diag);
    table
}

/// Drop a leading `tag:` token (no whitespace before the colon).
fn strip_special_tag(line: &str) -> &str {
    match line.find(':') {
        Some(i) if i > 0 && !line[..i].chars().any(|c| c.is_ascii_whitespace()) => {
            line[i + 1..].trim_start()
        }
        _ => line,
    }
}

/// Apply `\n`, `\t`, `\\` and `\xNN` escapes. `\xNN` names a CP-1252 byte.
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('x') => {
                let hi = chars.next();
                let lo = chars.next();
                match (hi.and_then(|c| c.to_digit(16)), lo.and_then(|c| c.to_digit(16))) {
                    (Some(hi), Some(lo)) => out.push(cp1252::byte_char((hi * 16 + lo) as u8)),
                    _ => {
                        // Malformed escape: keep the text as written.
                        out.push('\\');
                        out.push('x');
                        if let Some(c) = hi {
                            out.push(c);
                        }
                        if let Some(c) = lo {
                            out.push(c);
                        }
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Cumulative byte offsets over the three plain sections in insertion order.
fn build_offsets(table: &mut LanguageTable, file: &str, diag: &mut Collector) {
    let mut offset = 0u32;
    let all = table
        .strings
        .iter()
        .chain(table.psx_strings.iter())
        .chain(table.pc_strings.iter());
    for s in all {
        if offset > u32::from(u16::MAX) {
            diag.error(
                DiagnosticKind::Range,
                file,
                0,
                "string table exceeds 64 KiB of offsets",
            );
            break;
        }
        table.offsets.push(offset as u16);
        offset += cp1252::byte_len(s) as u32 + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> (LanguageTable, Collector) {
        let mut diag = Collector::new();
        let table = parse_language(src, "english.txt", &mut diag);
        (table, diag)
    }

    #[test]
    fn four_sections_fill_in_order() {
        let (t, d) = parse(
            "[Strings]\nINVENTORY\nLoad Game\n\n[PSX Strings]\npsx only\n\n[PC Strings]\npc only\n\n[ExtraNG]\n5: Hidden Passage\n",
        );
        assert!(!d.has_fatal());
        assert_eq!(t.strings, vec!["INVENTORY", "Load Game"]);
        assert_eq!(t.psx_strings, vec!["psx only"]);
        assert_eq!(t.pc_strings, vec!["pc only"]);
        assert_eq!(t.extras, vec![(5, "Hidden Passage".to_string())]);
    }

    #[test]
    fn offsets_are_cumulative_with_terminators() {
        let (t, _) = parse("[Strings]\nab\ncde\nf\n");
        // "ab\0" = 3 bytes, "cde\0" = 4 bytes.
        assert_eq!(t.offsets, vec![0, 3, 7]);
        assert_eq!(t.section_sizes[0], 3 + 4 + 2);
    }

    #[test]
    fn offsets_span_sections() {
        let (t, _) = parse("[Strings]\nab\n[PC Strings]\ncd\n");
        assert_eq!(t.offsets, vec![0, 3]);
        assert_eq!(t.section_sizes, [3, 0, 3, 0]);
    }

    #[test]
    fn escapes_and_special_tags() {
        let (t, _) = parse("[Strings]\nhint: line one\\nline two\ntab\\there\n");
        assert_eq!(t.strings[0], "line one\nline two");
        assert_eq!(t.strings[1], "tab\there");
    }

    #[test]
    fn hex_escape_is_a_code_page_byte() {
        let (t, _) = parse("[Strings]\nprice \\x80 only\n");
        assert_eq!(t.strings[0], "price € only");
        // One byte in CP-1252, not three as in UTF-8.
        assert_eq!(t.section_sizes[0], "price X only".len() as u32 + 1);
    }

    #[test]
    fn extra_ng_keeps_colons_in_text_but_not_tags() {
        let (t, _) = parse("[ExtraNG]\n2: speaker: hello\n");
        // The first colon separates the index; the rest is literal text.
        assert_eq!(t.extras, vec![(2, "speaker: hello".to_string())]);
    }

    #[test]
    fn bad_extra_index_is_fatal() {
        let (_, d) = parse("[ExtraNG]\nnope: hello\n");
        assert!(d.has_fatal());
    }

    #[test]
    fn semicolon_after_tag_survives() {
        let (t, _) = parse("[Strings]\nhint: pull; then push\nplain ; comment\n");
        assert_eq!(t.strings[0], "pull; then push");
        assert_eq!(t.strings[1], "plain");
    }
}
