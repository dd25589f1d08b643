//! Text front end of the ngscribe compiler.
//!
//! Turns a project directory (main script, includes, language files,
//! constant catalogs, plugin descriptors) into a [`ScriptModel`] plus the
//! parsed language tables, collecting diagnostics along the way.

pub mod cp1252;
pub mod eval;
pub mod language;
pub mod lexer;
pub mod parser;

pub use parser::{parse_project, ParsedProject};

use ngs_core::ScriptModel;

// Re-exported so back-end callers need only this crate for the front end.
pub use ngs_core::Collector;

/// Convenience wrapper: parse and return `None` when a fatal diagnostic
/// was recorded (callers still print the collector's contents).
pub fn parse_checked(
    script_dir: &std::path::Path,
    diag: &mut Collector,
) -> Option<ParsedProject> {
    let parsed = parse_project(script_dir, diag);
    if diag.has_fatal() {
        None
    } else {
        Some(parsed)
    }
}

/// The section kinds the driver cares about when reporting.
pub fn summarize(model: &ScriptModel) -> String {
    format!(
        "{} section(s), {} level(s), {} language file(s), {} NG option command(s)",
        model.sections.len(),
        model.level_count(),
        model.language_files.len(),
        model.ng.options.commands.len()
    )
}
