//! The expression evaluator.
//!
//! Expressions are strictly left-to-right sums: `+` separates additive
//! groups, `-` subtracts within a group, so `a + b - c + d` is
//! `((a + b) - c) + d`. Terms are numeric literals in any accepted base,
//! the `IGNORE` sentinel, or names resolved through the symbol table.

use ngs_core::literal::parse_int;
use ngs_core::symbols::SymbolTable;
use ngs_core::{NgsError, NgsResult};

/// Reserved sentinel evaluating to −1.
const IGNORE: &str = "IGNORE";

/// Result of evaluating one expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalOutcome {
    pub value: i64,
    /// Id of the last plugin whose constant was used, 0 when none was.
    pub plugin: u16,
}

/// Evaluate `expr` for a line of `file` (user defines are file-scoped).
pub fn evaluate(expr: &str, symbols: &SymbolTable, file: &str) -> NgsResult<EvalOutcome> {
    let mut total = 0i64;
    let mut plugin = 0u16;
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(NgsError::EmptyTerm(expr.to_string()));
    }
    for group in expr.split('+') {
        let mut parts = group.split('-');
        let first = parts.next().unwrap_or("");
        total += term(first, symbols, file, &mut plugin)?;
        for part in parts {
            total -= term(part, symbols, file, &mut plugin)?;
        }
    }
    Ok(EvalOutcome { value: total, plugin })
}

fn term(text: &str, symbols: &SymbolTable, file: &str, plugin: &mut u16) -> NgsResult<i64> {
    let t = text.trim();
    if t.is_empty() {
        return Err(NgsError::EmptyTerm(text.to_string()));
    }
    if t.eq_ignore_ascii_case(IGNORE) {
        return Ok(-1);
    }
    if let Some(v) = parse_int(t) {
        return Ok(v);
    }
    match symbols.resolve(t, file) {
        Some(r) => {
            if r.plugin != 0 {
                *plugin = r.plugin;
            }
            Ok(i64::from(r.value))
        }
        None => Err(NgsError::UnknownSymbol(t.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols() -> SymbolTable {
        let mut s = SymbolTable::new();
        s.set_engine_constants([("FT_SIZE".to_string(), 1024)]);
        s.set_slots([("LARA".to_string(), 0), ("DOG".to_string(), 36)]);
        s
    }

    #[test]
    fn left_to_right_sums() {
        let s = symbols();
        assert_eq!(evaluate("1 + 2 - 3 + 4", &s, "f").unwrap().value, 4);
        assert_eq!(evaluate("10 - 3 - 2", &s, "f").unwrap().value, 5);
    }

    #[test]
    fn mixed_bases_and_names() {
        let s = symbols();
        assert_eq!(evaluate("$10 + 0x10 + #10 + 16", &s, "f").unwrap().value, 64);
        assert_eq!(evaluate("FT_SIZE + DOG", &s, "f").unwrap().value, 1060);
    }

    #[test]
    fn ignore_is_minus_one() {
        let s = symbols();
        assert_eq!(evaluate("IGNORE", &s, "f").unwrap().value, -1);
        assert_eq!(evaluate("ignore + 1", &s, "f").unwrap().value, 0);
    }

    #[test]
    fn plugin_id_of_last_resolved_name_sticks() {
        use ngs_core::symbols::PluginTable;
        use std::collections::HashMap;
        let mut s = symbols();
        s.add_plugin_table(PluginTable {
            name: "plugin_fx".into(),
            constants: HashMap::from([("FX_BASE".to_string(), 0x100)]),
            has_descriptor: true,
        });
        s.bind_plugin("plugin_fx", 2).unwrap();
        let out = evaluate("FX_BASE + 4", &s, "f").unwrap();
        assert_eq!(out.value, 0x104);
        assert_eq!(out.plugin, 2);
        // A plain expression carries no plugin id.
        assert_eq!(evaluate("DOG + 1", &s, "f").unwrap().plugin, 0);
    }

    #[test]
    fn unknown_term_is_an_error() {
        let s = symbols();
        assert!(matches!(
            evaluate("3 + NOPE", &s, "f"),
            Err(NgsError::UnknownSymbol(n)) if n == "NOPE"
        ));
        assert!(evaluate("3 + + 4", &s, "f").is_err());
        assert!(evaluate("", &s, "f").is_err());
    }
}
