//! Line normalization.
//!
//! Raw CP-1252 lines become logical lines: comments stripped, `>`
//! continuations joined, then split into a `(command, args)` pair on the
//! first `=` with quote-aware comma separation.

/// One normalized line with the physical line number it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    pub text: String,
    /// 1-based number of the first physical line of the run.
    pub line: u32,
}

/// Whether the line starts with a `:`-terminated token that has no
/// whitespace before the colon (the language-file special tag).
pub fn has_special_tag(line: &str) -> bool {
    match line.find(':') {
        Some(i) if i > 0 => !line[..i].chars().any(|c| c.is_ascii_whitespace()),
        _ => false,
    }
}

/// Strip the `;` comment from a line.
///
/// With `keep_after_tag` set (language files), a line carrying a special
/// tag keeps its semicolons — the text is a string literal there.
pub fn strip_comment(line: &str, keep_after_tag: bool) -> &str {
    if keep_after_tag && has_special_tag(line) {
        return line;
    }
    match line.find(';') {
        Some(i) => &line[..i],
        None => line,
    }
}

/// Normalize a whole file: trim, drop comments, join continuations.
///
/// A line whose stripped remainder ends with `>` continues on the next
/// physical line; the pieces are joined with a single space and the run
/// keeps the number of its first line. Blank results are dropped.
pub fn logical_lines(raw_lines: &[String]) -> Vec<LogicalLine> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < raw_lines.len() {
        let start = i as u32 + 1;
        let mut text = strip_comment(&raw_lines[i], false).trim().to_string();
        while text.ends_with('>') && i + 1 < raw_lines.len() {
            text.pop();
            let next = strip_comment(&raw_lines[i + 1], false).trim().to_string();
            text = format!("{} {}", text.trim_end(), next);
            i += 1;
        }
        i += 1;
        if !text.is_empty() {
            out.push(LogicalLine { text, line: start });
        }
    }
    out
}

/// Split a directive at its first `=`.
///
/// Returns the command token *including* the `=` and the comma-split
/// argument list. Lines without `=` return `None`.
pub fn split_directive(text: &str) -> Option<(String, Vec<String>)> {
    let eq = text.find('=')?;
    let command = text[..=eq].trim_start().to_string();
    let rest = &text[eq + 1..];
    Some((command, split_args(rest)))
}

/// Comma-split with double-quote awareness; each piece is space-trimmed.
///
/// Commas inside paired `"..."` do not separate arguments. An all-blank
/// suffix yields an empty list.
pub fn split_args(rest: &str) -> Vec<String> {
    if rest.trim().is_empty() {
        return Vec::new();
    }
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in rest.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    args.push(current.trim().to_string());
    args
}

/// Strip one pair of enclosing double quotes, if present.
///
/// Only applied when an argument is consumed as a string-typed value.
pub fn unquote(arg: &str) -> &str {
    let t = arg.trim();
    if t.len() >= 2 && t.starts_with('"') && t.ends_with('"') {
        &t[1..t.len() - 1]
    } else {
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &[&str]) -> Vec<String> {
        src.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn comments_and_blanks_are_dropped() {
        let out = logical_lines(&lines(&["; header", "", "Name= Tutorial ; trailing"]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].text, "Name= Tutorial");
        assert_eq!(out[0].line, 3);
    }

    #[test]
    fn continuations_join_with_single_space() {
        let out = logical_lines(&lines(&[
            "TriggerGroup= 1, >",
            "    $2000, 160, $1F, > ; comment on the run",
            "    $2000, 161, $1F",
        ]));
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].text,
            "TriggerGroup= 1, $2000, 160, $1F, $2000, 161, $1F"
        );
        assert_eq!(out[0].line, 1);
    }

    #[test]
    fn continuation_keeps_first_line_number() {
        let out = logical_lines(&lines(&["A= 1", "B= 2, >", "3", "C= 4"]));
        assert_eq!(out[1].line, 2);
        assert_eq!(out[2].text, "C= 4");
        assert_eq!(out[2].line, 4);
    }

    #[test]
    fn directive_split_keeps_equals_on_command() {
        let (cmd, args) = split_directive("Level= DATA\\tut1\\tut1, 104").unwrap();
        assert_eq!(cmd, "Level=");
        assert_eq!(args, vec!["DATA\\tut1\\tut1", "104"]);
        assert!(split_directive("[Options]").is_none());
    }

    #[test]
    fn quoted_commas_do_not_split() {
        let args = split_args(r#" 3, "Load, please", 7 "#);
        assert_eq!(args, vec!["3", "\"Load, please\"", "7"]);
        assert_eq!(unquote("\"Load, please\""), "Load, please");
        assert_eq!(unquote("plain"), "plain");
    }

    #[test]
    fn empty_argument_list() {
        let (cmd, args) = split_directive("ResetHUB=").unwrap();
        assert_eq!(cmd, "ResetHUB=");
        assert!(args.is_empty());
    }

    #[test]
    fn special_tag_protects_semicolons() {
        assert!(has_special_tag("hint: use the lever; then run"));
        assert!(!has_special_tag("a tag : with space"));
        assert_eq!(
            strip_comment("hint: use the lever; then run", true),
            "hint: use the lever; then run"
        );
        assert_eq!(strip_comment("plain text; comment", true), "plain text");
    }
}
