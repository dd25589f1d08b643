//! Shared core of the ngscribe compiler: the script model, the layered
//! symbol tables, the external-catalog parsers, the NG schema catalog and
//! the diagnostic collector.

pub mod catalogs;
pub mod diagnostics;
pub mod error;
pub mod language;
pub mod literal;
pub mod model;
pub mod schema;
pub mod symbols;

pub use diagnostics::{Collector, Diagnostic, DiagnosticKind, Severity};
pub use error::{NgsError, NgsResult};
pub use language::LanguageTable;
pub use model::{ScriptModel, Section, SectionKind};
pub use symbols::SymbolTable;
