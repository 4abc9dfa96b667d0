//! Diagnostic records and the read-only snapshot handed to hosts.

use std::fmt;
use std::path::Path;

use crate::DocumentId;

/// Severity level for a diagnostic.
///
/// The lint tool reports numeric levels (1 = warn, 2 = error) plus a `fatal`
/// flag for parse failures. Anything below the top level is a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

impl DiagnosticSeverity {
    /// Highest severity level the lint tool reports.
    pub const TOOL_ERROR_LEVEL: u64 = 2;

    /// Map a reported level and fatal flag onto a severity.
    #[must_use]
    pub fn from_tool(level: Option<u64>, fatal: bool) -> Self {
        if fatal || level.is_some_and(|l| l >= Self::TOOL_ERROR_LEVEL) {
            Self::Error
        } else {
            Self::Warning
        }
    }

    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

/// Start and end position of a diagnostic, as reported by the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextRange {
    pub line: u32,
    pub column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl TextRange {
    /// A zero-width range at `line:column`.
    #[must_use]
    pub fn point(line: u32, column: u32) -> Self {
        Self {
            line,
            column,
            end_line: line,
            end_column: column,
        }
    }

    /// Build a range, collapsing missing end fields onto the start position.
    #[must_use]
    pub fn from_parts(
        line: Option<u32>,
        column: Option<u32>,
        end_line: Option<u32>,
        end_column: Option<u32>,
    ) -> Self {
        let line = line.unwrap_or(0);
        let column = column.unwrap_or(0);
        Self {
            line,
            column,
            end_line: end_line.unwrap_or(line),
            end_column: end_column.unwrap_or(column),
        }
    }
}

/// A single normalized diagnostic.
///
/// Fields are private; diagnostics are immutable once constructed. Equality
/// is structural over everything except `source`: two runs of different tool
/// builds reporting the same problem compare equal.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    severity: DiagnosticSeverity,
    message: String,
    /// Rule identifier, absent for parse errors and tool notices.
    code: Option<String>,
    range: TextRange,
    source: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(
        severity: DiagnosticSeverity,
        message: String,
        code: Option<String>,
        range: TextRange,
        source: String,
    ) -> Self {
        Self {
            severity,
            message,
            code,
            range,
            source,
        }
    }

    #[must_use]
    pub fn severity(&self) -> DiagnosticSeverity {
        self.severity
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    #[must_use]
    pub fn range(&self) -> TextRange {
        self.range
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        self.range.line
    }

    #[must_use]
    pub fn column(&self) -> u32 {
        self.range.column
    }

    #[must_use]
    pub fn end_line(&self) -> u32 {
        self.range.end_line
    }

    #[must_use]
    pub fn end_column(&self) -> u32 {
        self.range.end_column
    }

    /// Tool that produced the diagnostic (e.g. "eslint").
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Format as `path:line:col: severity: [source] message (code)`.
    #[must_use]
    pub fn display_with_path(&self, path: &Path) -> String {
        let mut out = format!(
            "{}:{}:{}: {}: [{}] {}",
            path.display(),
            self.range.line,
            self.range.column,
            self.severity.label(),
            self.source,
            self.message,
        );
        if let Some(code) = &self.code {
            out.push_str(&format!(" ({code})"));
        }
        out
    }
}

impl PartialEq for Diagnostic {
    fn eq(&self, other: &Self) -> bool {
        self.severity == other.severity
            && self.range == other.range
            && self.code == other.code
            && self.message == other.message
    }
}

impl Eq for Diagnostic {}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.range.line,
            self.range.column,
            self.severity.label(),
            self.message
        )
    }
}

/// Immutable snapshot of all published diagnostics, suitable for display.
///
/// Counts are computed from `files`; there is no cached total to drift.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsSnapshot {
    /// Per-document diagnostics, error-containing documents first.
    files: Vec<(DocumentId, Vec<Diagnostic>)>,
}

impl DiagnosticsSnapshot {
    /// Build a snapshot, ordering documents with errors first, then by id.
    #[must_use]
    pub fn new(mut files: Vec<(DocumentId, Vec<Diagnostic>)>) -> Self {
        files.sort_by(|a, b| {
            let a_has_errors = a.1.iter().any(|d| d.severity().is_error());
            let b_has_errors = b.1.iter().any(|d| d.severity().is_error());
            b_has_errors.cmp(&a_has_errors).then_with(|| a.0.cmp(&b.0))
        });
        Self { files }
    }

    #[must_use]
    pub fn files(&self) -> &[(DocumentId, Vec<Diagnostic>)] {
        &self.files
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn count_by_severity(&self, severity: DiagnosticSeverity) -> usize {
        self.files
            .iter()
            .flat_map(|(_, items)| items)
            .filter(|d| d.severity() == severity)
            .count()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count_by_severity(DiagnosticSeverity::Error)
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.count_by_severity(DiagnosticSeverity::Warning)
    }

    #[must_use]
    pub fn total_count(&self) -> usize {
        self.files.iter().map(|(_, items)| items.len()).sum()
    }

    /// Compact status string like "E:3 W:5"; empty when nothing is published.
    #[must_use]
    pub fn status_string(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!("E:{} W:{}", self.error_count(), self.warning_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn make_diag(severity: DiagnosticSeverity, msg: &str, source: &str) -> Diagnostic {
        Diagnostic::new(
            severity,
            msg.to_string(),
            Some("no-undef".to_string()),
            TextRange::point(3, 5),
            source.to_string(),
        )
    }

    #[test]
    fn test_severity_from_tool_levels() {
        assert_eq!(
            DiagnosticSeverity::from_tool(Some(2), false),
            DiagnosticSeverity::Error
        );
        assert_eq!(
            DiagnosticSeverity::from_tool(Some(1), false),
            DiagnosticSeverity::Warning
        );
        assert_eq!(
            DiagnosticSeverity::from_tool(None, false),
            DiagnosticSeverity::Warning
        );
    }

    #[test]
    fn test_fatal_is_always_error() {
        assert_eq!(
            DiagnosticSeverity::from_tool(Some(1), true),
            DiagnosticSeverity::Error
        );
        assert_eq!(
            DiagnosticSeverity::from_tool(None, true),
            DiagnosticSeverity::Error
        );
    }

    #[test]
    fn test_range_defaults_end_to_start() {
        let range = TextRange::from_parts(Some(3), Some(5), None, None);
        assert_eq!(range, TextRange::point(3, 5));

        let range = TextRange::from_parts(None, None, None, Some(9));
        assert_eq!(range.line, 0);
        assert_eq!(range.column, 0);
        assert_eq!(range.end_line, 0);
        assert_eq!(range.end_column, 9);
    }

    #[test]
    fn test_equality_ignores_source() {
        let a = make_diag(DiagnosticSeverity::Error, "'x' is not defined", "eslint");
        let b = make_diag(DiagnosticSeverity::Error, "'x' is not defined", "eslint_d");
        assert_eq!(a, b);
    }

    #[test]
    fn test_equality_checks_other_fields() {
        let a = make_diag(DiagnosticSeverity::Error, "'x' is not defined", "eslint");
        let b = make_diag(DiagnosticSeverity::Warning, "'x' is not defined", "eslint");
        let c = make_diag(DiagnosticSeverity::Error, "'y' is not defined", "eslint");
        assert_ne!(a, b);
        assert_ne!(a, c);

        let d = Diagnostic::new(
            DiagnosticSeverity::Error,
            "'x' is not defined".to_string(),
            None,
            TextRange::point(3, 5),
            "eslint".to_string(),
        );
        assert_ne!(a, d);
    }

    #[test]
    fn test_display_with_path() {
        let diag = make_diag(DiagnosticSeverity::Error, "'x' is not defined", "eslint");
        assert_eq!(
            diag.display_with_path(&PathBuf::from("src/a.js")),
            "src/a.js:3:5: error: [eslint] 'x' is not defined (no-undef)"
        );
    }

    #[test]
    fn test_display_with_path_without_code() {
        let diag = Diagnostic::new(
            DiagnosticSeverity::Error,
            "Parsing error: Unexpected token".to_string(),
            None,
            TextRange::point(1, 1),
            "eslint".to_string(),
        );
        assert_eq!(
            diag.display_with_path(&PathBuf::from("a.js")),
            "a.js:1:1: error: [eslint] Parsing error: Unexpected token"
        );
    }

    #[test]
    fn test_snapshot_orders_errors_first() {
        let snap = DiagnosticsSnapshot::new(vec![
            (
                DocumentId::new("file:///a.js"),
                vec![make_diag(DiagnosticSeverity::Warning, "w", "eslint")],
            ),
            (
                DocumentId::new("file:///b.js"),
                vec![make_diag(DiagnosticSeverity::Error, "e", "eslint")],
            ),
        ]);
        assert_eq!(snap.files()[0].0, DocumentId::new("file:///b.js"));
        assert_eq!(snap.files()[1].0, DocumentId::new("file:///a.js"));
        assert_eq!(snap.status_string(), "E:1 W:1");
        assert_eq!(snap.total_count(), 2);
    }

    #[test]
    fn test_snapshot_default_is_empty() {
        let snap = DiagnosticsSnapshot::default();
        assert!(snap.is_empty());
        assert_eq!(snap.status_string(), "");
    }
}
