//! Diagnostics reconciler: the only writer of the published collection.

use lintel_types::{Diagnostic, DocumentId};

use crate::diagnostics::DiagnosticsCollection;

/// What a reconcile call did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Published,
    Unchanged,
    Removed,
    NothingToRemove,
}

pub struct Reconciler<C> {
    collection: C,
}

impl<C: DiagnosticsCollection> Reconciler<C> {
    pub fn new(collection: C) -> Self {
        Self { collection }
    }

    #[must_use]
    pub fn collection(&self) -> &C {
        &self.collection
    }

    /// Publish `incoming` for `key` unless it matches what is already there.
    ///
    /// `None` or an empty set removes the entry.
    pub fn reconcile(
        &mut self,
        key: &DocumentId,
        incoming: Option<Vec<Diagnostic>>,
    ) -> ReconcileOutcome {
        let incoming = match incoming {
            Some(items) if !items.is_empty() => items,
            _ => return self.remove(key),
        };

        if let Some(current) = self.collection.get(key)
            && same_set(current, &incoming)
        {
            return ReconcileOutcome::Unchanged;
        }

        tracing::debug!(document = %key, count = incoming.len(), "Publishing diagnostics");
        self.collection.set(key, incoming);
        ReconcileOutcome::Published
    }

    /// Drop the entry for `key`, if any.
    pub fn remove(&mut self, key: &DocumentId) -> ReconcileOutcome {
        if self.collection.has(key) {
            self.collection.remove(key);
            ReconcileOutcome::Removed
        } else {
            ReconcileOutcome::NothingToRemove
        }
    }

    /// Move diagnostics from `old` to `new` after an identity change.
    ///
    /// When the old document is gone its entry is simply cleared. Otherwise
    /// the set moves across so the new key never shows an empty gap.
    pub fn transplant(&mut self, old: &DocumentId, new: &DocumentId, old_gone: bool) {
        if old == new {
            return;
        }
        if old_gone {
            self.remove(old);
            return;
        }
        let Some(items) = self.collection.get(old).map(<[Diagnostic]>::to_vec) else {
            return;
        };
        self.collection.remove(old);
        self.collection.set(new, items);
    }
}

/// Order-insensitive multiset comparison: each item must occur as often in
/// `incoming` as in `current`.
fn same_set(current: &[Diagnostic], incoming: &[Diagnostic]) -> bool {
    let occurrences =
        |items: &[Diagnostic], d: &Diagnostic| items.iter().filter(|x| *x == d).count();
    current.len() == incoming.len()
        && incoming
            .iter()
            .all(|d| occurrences(current, d) == occurrences(incoming, d))
}
