//! Numeric literal parsing shared by the evaluator, the classic encoders
//! and the catalog loaders.

/// Parse an integer literal in any of the accepted source notations:
/// decimal (optionally negative), `$hex`, `0xhex`, `#hex`, `&Hhex`.
///
/// Returns `None` for anything else; symbolic names are the resolver's job.
pub fn parse_int(text: &str) -> Option<i64> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    if let Some(hex) = t.strip_prefix('$') {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(hex) = t.strip_prefix('#') {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(hex) = t.strip_prefix("&H").or_else(|| t.strip_prefix("&h")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    t.parse::<i64>().ok()
}
