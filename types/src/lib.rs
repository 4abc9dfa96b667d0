//! Core domain types for Lintel.
//!
//! Pure domain types with no IO and no async: documents, diagnostics and the
//! validated settings every other crate consumes.

mod diagnostic;
mod document;
mod settings;

pub use diagnostic::{Diagnostic, DiagnosticSeverity, DiagnosticsSnapshot, TextRange};
pub use document::{Document, DocumentId, DocumentLocation};
pub use settings::{
    CandidateFile, DEFAULT_MAX_ISSUE_EXIT_CODE, DEFAULT_NOT_FOUND_EXIT_CODE, DEFAULT_THROTTLE,
    LintSettings, LinterSettings, LookupSettings, ResolverSettings, SettingsError,
};
