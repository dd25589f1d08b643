//! Diagnostic collection for the compile pipeline.
//!
//! Every stage appends to a shared [`Collector`]; fatal entries raise an
//! abort flag that the driver checks at phase boundaries.

use std::fmt;

/// Severity level for diagnostics.
///
/// Errors abort the pipeline at the next phase boundary; warnings never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Broad classification of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Unknown section, missing `=`, malformed `#define`.
    Parse,
    /// Argument outside its documented bounds.
    Range,
    /// Unknown NG command, wrong argument count or argument kind.
    Schema,
    /// Unknown symbol or unknown string.
    Reference,
    /// NG command occurrence cap exceeded.
    Occurrence,
    /// Missing file or unreadable encoding.
    Resource,
    /// Cases that should be unreachable.
    Internal,
}

impl DiagnosticKind {
    fn label(self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Range => "range",
            Self::Schema => "schema",
            Self::Reference => "reference",
            Self::Occurrence => "occurrence",
            Self::Resource => "resource",
            Self::Internal => "internal",
        }
    }
}

/// A diagnostic message with source location.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// Source file the line came from (base name, as the user wrote it).
    pub file: String,
    /// 1-based line number within `file`; 0 when no line applies.
    pub line: u32,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        if self.line > 0 {
            write!(
                f,
                "{prefix}[{}]: {}:{}: {}",
                self.kind.label(),
                self.file,
                self.line,
                self.message
            )
        } else {
            write!(f, "{prefix}[{}]: {}: {}", self.kind.label(), self.file, self.message)
        }
    }
}

/// Append-only list of diagnostics shared by every pipeline stage.
#[derive(Debug, Default)]
pub struct Collector {
    items: Vec<Diagnostic>,
    fatal: bool,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fatal diagnostic and raise the abort flag.
    pub fn error(
        &mut self,
        kind: DiagnosticKind,
        file: &str,
        line: u32,
        message: impl Into<String>,
    ) {
        self.fatal = true;
        self.items.push(Diagnostic {
            severity: Severity::Error,
            kind,
            file: file.to_string(),
            line,
            message: message.into(),
        });
    }

    /// Record a non-fatal diagnostic.
    pub fn warning(
        &mut self,
        kind: DiagnosticKind,
        file: &str,
        line: u32,
        message: impl Into<String>,
    ) {
        self.items.push(Diagnostic {
            severity: Severity::Warning,
            kind,
            file: file.to_string(),
            line,
            message: message.into(),
        });
    }

    /// Whether any fatal diagnostic has been recorded.
    pub fn has_fatal(&self) -> bool {
        self.fatal
    }

    /// All diagnostics in insertion order.
    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn error_count(&self) -> usize {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.items.len() - self.error_count()
    }

    /// Display ordering: errors first, then warnings, each group keeping
    /// insertion order.
    pub fn for_display(&self) -> Vec<&Diagnostic> {
        let mut out: Vec<&Diagnostic> = Vec::with_capacity(self.items.len());
        out.extend(self.items.iter().filter(|d| d.severity == Severity::Error));
        out.extend(self.items.iter().filter(|d| d.severity == Severity::Warning));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location() {
        let mut c = Collector::new();
        c.error(DiagnosticKind::Schema, "script.txt", 12, "unknown NG command: Foo=");
        assert_eq!(
            c.items()[0].to_string(),
            "error[schema]: script.txt:12: unknown NG command: Foo="
        );
    }

    #[test]
    fn warnings_do_not_raise_abort() {
        let mut c = Collector::new();
        c.warning(DiagnosticKind::Reference, "script.txt", 3, "string not found");
        assert!(!c.has_fatal());
        c.error(DiagnosticKind::Range, "script.txt", 4, "slot out of range");
        assert!(c.has_fatal());
    }

    #[test]
    fn display_order_is_errors_first_stable() {
        let mut c = Collector::new();
        c.warning(DiagnosticKind::Parse, "a", 1, "w1");
        c.error(DiagnosticKind::Parse, "a", 2, "e1");
        c.warning(DiagnosticKind::Parse, "a", 3, "w2");
        c.error(DiagnosticKind::Parse, "a", 4, "e2");
        let shown: Vec<&str> = c.for_display().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(shown, vec!["e1", "e2", "w1", "w2"]);
    }
}
