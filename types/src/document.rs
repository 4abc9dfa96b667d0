//! Document identity and the per-cycle snapshot supplied by the host.

use std::fmt;
use std::path::PathBuf;

/// Stable identifier of an open document (its URI).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId(String);

impl DocumentId {
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Where a document lives.
///
/// Only on-disk documents have a directory hierarchy to resolve
/// configuration against; the other two are never linted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentLocation {
    File(PathBuf),
    Untitled,
    Remote,
}

/// A snapshot of one document, taken at the start of a lint cycle.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocumentId,
    pub location: DocumentLocation,
    pub text: String,
    /// Syntax / language tag (e.g. "javascript").
    pub syntax: String,
    pub closed: bool,
}

impl Document {
    /// An open on-disk document.
    #[must_use]
    pub fn file(
        id: DocumentId,
        path: impl Into<PathBuf>,
        syntax: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id,
            location: DocumentLocation::File(path.into()),
            text: text.into(),
            syntax: syntax.into(),
            closed: false,
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match &self.location {
            DocumentLocation::File(path) => Some(path),
            DocumentLocation::Untitled | DocumentLocation::Remote => None,
        }
    }
}
