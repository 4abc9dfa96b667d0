//! Files from disk presented as open documents.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};

use lintel_linter::{DocumentProvider, file_document_id};
use lintel_types::{Document, DocumentId};

/// Syntax tag for a file, from its extension.
pub fn syntax_for(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "js" | "mjs" | "cjs" => "javascript".to_string(),
        "jsx" => "javascriptreact".to_string(),
        "ts" | "mts" | "cts" => "typescript".to_string(),
        "tsx" => "typescriptreact".to_string(),
        _ => ext,
    }
}

#[derive(Default)]
pub struct DiskDocuments {
    documents: Mutex<HashMap<DocumentId, Document>>,
}

impl DiskDocuments {
    /// Read `path` and register it as an open document.
    pub fn open(&self, path: &Path) -> Result<(DocumentId, PathBuf)> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let id = file_document_id(path)
            .with_context(|| format!("cannot build a file URI for {}", path.display()))?;
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let document = Document::file(id.clone(), &absolute, syntax_for(path), text);
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), document);
        Ok((id, absolute))
    }
}

impl DocumentProvider for DiskDocuments {
    fn document(&self, id: &DocumentId) -> Option<Document> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}
