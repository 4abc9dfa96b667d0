//! Published diagnostics collection, the sink hosts read from.

use std::collections::HashMap;

use lintel_types::{Diagnostic, DiagnosticsSnapshot, DocumentId};

/// Keyed store of published diagnostics.
///
/// Only the reconciler mutates it; hosts read it or take snapshots.
pub trait DiagnosticsCollection: Send {
    fn set(&mut self, key: &DocumentId, diagnostics: Vec<Diagnostic>);
    fn remove(&mut self, key: &DocumentId);
    fn has(&self, key: &DocumentId) -> bool;
    fn get(&self, key: &DocumentId) -> Option<&[Diagnostic]>;
    fn clear(&mut self);
    fn keys(&self) -> Vec<DocumentId>;

    /// Read-only copy of everything published.
    fn snapshot(&self) -> DiagnosticsSnapshot {
        let files = self
            .keys()
            .into_iter()
            .filter_map(|key| {
                let items = self.get(&key)?.to_vec();
                Some((key, items))
            })
            .collect();
        DiagnosticsSnapshot::new(files)
    }
}

#[derive(Debug, Default)]
pub struct DiagnosticsStore {
    data: HashMap<DocumentId, Vec<Diagnostic>>,
}

impl DiagnosticsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticsCollection for DiagnosticsStore {
    fn set(&mut self, key: &DocumentId, diagnostics: Vec<Diagnostic>) {
        self.data.insert(key.clone(), diagnostics);
    }

    fn remove(&mut self, key: &DocumentId) {
        self.data.remove(key);
    }

    fn has(&self, key: &DocumentId) -> bool {
        self.data.contains_key(key)
    }

    fn get(&self, key: &DocumentId) -> Option<&[Diagnostic]> {
        self.data.get(key).map(Vec::as_slice)
    }

    fn clear(&mut self) {
        self.data.clear();
    }

    fn keys(&self) -> Vec<DocumentId> {
        self.data.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lintel_types::{DiagnosticSeverity, TextRange};

    fn make_diag(severity: DiagnosticSeverity, msg: &str, line: u32) -> Diagnostic {
        Diagnostic::new(
            severity,
            msg.to_string(),
            None,
            TextRange::point(line, 1),
            "eslint".to_string(),
        )
    }

    #[test]
    fn test_empty_snapshot() {
        let store = DiagnosticsStore::new();
        let snap = store.snapshot();
        assert!(snap.is_empty());
        assert_eq!(snap.error_count(), 0);
        assert_eq!(snap.warning_count(), 0);
    }

    #[test]
    fn test_set_get_remove() {
        let mut store = DiagnosticsStore::new();
        let id = DocumentId::new("file:///home/u/a.js");
        store.set(
            &id,
            vec![
                make_diag(DiagnosticSeverity::Error, "'x' is not defined", 3),
                make_diag(DiagnosticSeverity::Warning, "Unexpected console statement", 9),
            ],
        );
        assert!(store.has(&id));
        assert_eq!(store.get(&id).unwrap().len(), 2);

        let snap = store.snapshot();
        assert_eq!(snap.error_count(), 1);
        assert_eq!(snap.warning_count(), 1);

        store.remove(&id);
        assert!(!store.has(&id));
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn test_snapshot_orders_errors_first() {
        let mut store = DiagnosticsStore::new();
        store.set(
            &DocumentId::new("file:///a.js"),
            vec![make_diag(DiagnosticSeverity::Warning, "warn", 1)],
        );
        store.set(
            &DocumentId::new("file:///b.js"),
            vec![make_diag(DiagnosticSeverity::Error, "err", 2)],
        );

        let snap = store.snapshot();
        assert_eq!(snap.files()[0].0, DocumentId::new("file:///b.js"));
        assert_eq!(snap.status_string(), "E:1 W:1");
    }

    #[test]
    fn test_clear_and_keys() {
        let mut store = DiagnosticsStore::new();
        store.set(&DocumentId::new("file:///a.js"), vec![]);
        store.set(&DocumentId::new("file:///b.js"), vec![]);
        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys.len(), 2);

        store.clear();
        assert!(store.keys().is_empty());
    }
}
