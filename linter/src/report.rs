//! JSON report decoding.
//!
//! The tool prints an array with one entry per linted file. Only the first
//! entry matters since exactly one file is fed through stdin.

use serde::Deserialize;

use lintel_types::{Diagnostic, DiagnosticSeverity, TextRange};

/// Prefix of the notice emitted for files matched by an ignore pattern.
const IGNORED_FILE_NOTICE: &str = "File ignored";

#[derive(Debug, Deserialize)]
struct ReportEntry {
    #[serde(default)]
    messages: Vec<ReportMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportMessage {
    #[serde(default)]
    message: String,
    rule_id: Option<String>,
    line: Option<u32>,
    column: Option<u32>,
    end_line: Option<u32>,
    end_column: Option<u32>,
    severity: Option<u64>,
    #[serde(default)]
    fatal: bool,
}

impl ReportMessage {
    fn is_ignored_notice(&self) -> bool {
        self.rule_id.is_none() && self.message.starts_with(IGNORED_FILE_NOTICE)
    }

    fn into_diagnostic(self, source: &str) -> Diagnostic {
        Diagnostic::new(
            DiagnosticSeverity::from_tool(self.severity, self.fatal),
            self.message,
            self.rule_id,
            TextRange::from_parts(self.line, self.column, self.end_line, self.end_column),
            source.to_string(),
        )
    }
}

/// Decode a report into diagnostics stamped with `source`.
///
/// Blank output is an empty report.
pub(crate) fn parse_report(
    stdout: &str,
    source: &str,
) -> Result<Vec<Diagnostic>, serde_json::Error> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<ReportEntry> = serde_json::from_str(stdout)?;
    let Some(first) = entries.into_iter().next() else {
        return Ok(Vec::new());
    };
    Ok(first
        .messages
        .into_iter()
        .filter(|m| !m.is_ignored_notice())
        .map(|m| m.into_diagnostic(source))
        .collect())
}
