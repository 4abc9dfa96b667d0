//! LintManager: the orchestrator hosts talk to.
//!
//! One long-lived instance per editing session owns every piece of mutable
//! state (tool cache, sequence counters, published collection). A lint cycle
//! never returns an error; every failure ends as "applied", "cleared" or
//! "discarded" with a log line carrying the directory and path involved.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use lintel_types::{Diagnostic, DiagnosticsSnapshot, Document, DocumentId, LintSettings};

use crate::cache::{CacheEvent, LinterCache};
use crate::diagnostics::{DiagnosticsCollection, DiagnosticsStore};
use crate::fs::{Filesystem, OsFilesystem, mark_executable, normalize_path};
use crate::invoker::{InvokeError, LintInvoker};
use crate::locator::BinaryLocator;
use crate::process::ProcessRunner;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::resolver::{ConfigResolver, SearchMode};
use crate::sequencer::{Sequencer, Ticket};

/// Extra lint attempts after an invocation failure.
const MAX_LINT_RETRIES: usize = 1;

/// Supplies document snapshots on demand.
pub trait DocumentProvider: Send + Sync {
    /// Current snapshot of `id`, or `None` if the host no longer knows it.
    fn document(&self, id: &DocumentId) -> Option<Document>;

    fn is_closed(&self, id: &DocumentId) -> bool {
        self.document(id).is_none_or(|doc| doc.closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Untitled or remote: no directory hierarchy to resolve against.
    NotOnDisk,
    UnsupportedSyntax,
}

/// How a lint cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintOutcome {
    /// The cycle's result (possibly "no diagnostics") went to the reconciler.
    Applied(ReconcileOutcome),
    /// The document was closed or unknown; its entry was removed.
    Cleared,
    /// A later cycle for the same document already applied its result.
    Discarded,
    Skipped(SkipReason),
}

/// Why a lint attempt is being repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryReason {
    ToolUnavailable,
    ToolFailed,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to mark {} executable: {source}", helper.display())]
pub struct ActivationError {
    helper: PathBuf,
    #[source]
    source: io::Error,
}

impl ActivationError {
    #[must_use]
    pub fn helper(&self) -> &Path {
        &self.helper
    }
}

/// `file://` URI identifying the document at `path`.
#[must_use]
pub fn file_document_id(path: &Path) -> Option<DocumentId> {
    url::Url::from_file_path(normalize_path(path))
        .ok()
        .map(|uri| DocumentId::new(uri.as_str()))
}

pub struct LintManager<C = DiagnosticsStore, F = OsFilesystem> {
    settings: LintSettings,
    resolver: ConfigResolver<F>,
    locator: Arc<BinaryLocator>,
    cache: LinterCache,
    invoker: LintInvoker,
    documents: Arc<dyn DocumentProvider>,
    sequencer: Mutex<Sequencer>,
    reconciler: Mutex<Reconciler<C>>,
    events: Mutex<mpsc::Receiver<CacheEvent>>,
}

impl LintManager {
    /// Manager over the real filesystem with an in-memory collection.
    pub fn new(
        settings: LintSettings,
        runner: Arc<dyn ProcessRunner>,
        documents: Arc<dyn DocumentProvider>,
    ) -> Self {
        Self::with_parts(
            settings,
            runner,
            documents,
            OsFilesystem,
            DiagnosticsStore::new(),
        )
    }
}

impl<C: DiagnosticsCollection, F: Filesystem> LintManager<C, F> {
    pub fn with_parts(
        settings: LintSettings,
        runner: Arc<dyn ProcessRunner>,
        documents: Arc<dyn DocumentProvider>,
        fs: F,
        collection: C,
    ) -> Self {
        let home = settings.resolver.home.clone().or_else(dirs::home_dir);
        if home.is_none() {
            tracing::warn!("No home directory; config discovery is disabled");
        }
        let resolver = ConfigResolver::new(
            fs,
            home,
            settings.linter.config_candidates().to_vec(),
            settings.linter.ignore_candidates().to_vec(),
        );
        let locator = Arc::new(BinaryLocator::new(
            Arc::clone(&runner),
            settings.lookup.clone(),
            settings.linter.package().to_string(),
        ));
        let (cache, events) = LinterCache::new(Arc::clone(&locator), settings.lookup.throttle());
        let invoker = LintInvoker::new(runner, &settings.linter, settings.lookup.use_shell());

        Self {
            settings,
            resolver,
            locator,
            cache,
            invoker,
            documents,
            sequencer: Mutex::new(Sequencer::new()),
            reconciler: Mutex::new(Reconciler::new(collection)),
            events: Mutex::new(events),
        }
    }

    fn sequencer(&self) -> MutexGuard<'_, Sequencer> {
        self.sequencer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reconciler(&self) -> MutexGuard<'_, Reconciler<C>> {
        self.reconciler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn settings(&self) -> &LintSettings {
        &self.settings
    }

    /// Mark the lookup helper executable.
    ///
    /// Helpers named only by `PATH` lookup that cannot be found are left
    /// alone; the first lookup will report them.
    pub async fn activate(&self) -> Result<(), ActivationError> {
        let Some(helper) = self.locator.helper_path() else {
            tracing::debug!(
                helper = %self.locator.helper().display(),
                "Lookup helper not on PATH; skipping activation"
            );
            return Ok(());
        };
        if !tokio::fs::metadata(&helper).await.is_ok_and(|m| m.is_file()) {
            return Ok(());
        }
        mark_executable(&helper)
            .await
            .map_err(|source| ActivationError { helper, source })
    }

    /// Run one lint cycle for `id` and reconcile its result.
    pub async fn lint_document(&self, id: &DocumentId) -> LintOutcome {
        let Some(document) = self.documents.document(id).filter(|doc| !doc.closed) else {
            self.reconciler().remove(id);
            return LintOutcome::Cleared;
        };

        let reason = if document.path().is_none() {
            Some(SkipReason::NotOnDisk)
        } else if !self.settings.linter.handles_syntax(&document.syntax) {
            Some(SkipReason::UnsupportedSyntax)
        } else {
            None
        };
        if let Some(reason) = reason {
            tracing::debug!(document = %id, ?reason, "Skipping lint");
            let ticket = self.sequencer().admit(id);
            self.finish(&ticket, None);
            return LintOutcome::Skipped(reason);
        }

        let ticket = self.sequencer().admit(id);
        let diagnostics = match document.path() {
            Some(path) => self.run_cycle(&document, path).await,
            None => None,
        };
        self.finish(&ticket, diagnostics)
    }

    /// Resolve, locate and invoke. `None` means "nothing to show".
    async fn run_cycle(&self, document: &Document, path: &Path) -> Option<Vec<Diagnostic>> {
        let Some(config) = self.resolver.find_config(path) else {
            tracing::debug!(path = %path.display(), "No lint config found");
            return None;
        };
        let directory = path.parent()?;
        tracing::debug!(
            path = %path.display(),
            config = %config.display(),
            "Linting document"
        );

        let mut retry: Option<RetryReason> = None;
        for attempt in 0..=MAX_LINT_RETRIES {
            if let Some(reason) = retry {
                tracing::debug!(
                    directory = %directory.display(),
                    attempt,
                    ?reason,
                    "Retrying lint"
                );
            }

            let Some(instance) = self.cache.get(directory).await else {
                tracing::debug!(directory = %directory.display(), "No lint tool available");
                return None;
            };
            if !instance.is_valid() {
                tracing::debug!(
                    directory = %directory.display(),
                    binary = %instance.binary_path().display(),
                    "Lint tool is not executable"
                );
                return None;
            }

            match self
                .invoker
                .lint(&instance, &document.text, path, directory)
                .await
            {
                Ok(diagnostics) => return Some(diagnostics),
                Err(err @ InvokeError::Parse(_)) => {
                    tracing::warn!(path = %path.display(), "{err}");
                    return None;
                }
                Err(err) => {
                    tracing::warn!(
                        directory = %directory.display(),
                        path = %path.display(),
                        "{err}"
                    );
                    retry = Some(match &err {
                        InvokeError::Shell { binary, .. } => {
                            if let Err(e) = mark_executable(binary).await {
                                tracing::debug!(
                                    binary = %binary.display(),
                                    "Failed to mark lint tool executable: {e}"
                                );
                            }
                            RetryReason::ToolUnavailable
                        }
                        _ => RetryReason::ToolFailed,
                    });
                    self.cache.evict(directory);
                }
            }
        }
        None
    }

    /// Apply a cycle's result if the document is still open and the ticket
    /// is still current.
    fn finish(&self, ticket: &Ticket, diagnostics: Option<Vec<Diagnostic>>) -> LintOutcome {
        let id = ticket.document();
        if self.documents.is_closed(id) {
            self.reconciler().remove(id);
            return LintOutcome::Cleared;
        }

        // Hold the sequencer across the write so a newer ticket cannot slip
        // in between acceptance and publication.
        let mut sequencer = self.sequencer();
        if !sequencer.complete(ticket) {
            tracing::trace!(
                document = %id,
                ticket = ticket.index(),
                "Discarding stale lint result"
            );
            return LintOutcome::Discarded;
        }
        let outcome = self.reconciler().reconcile(id, diagnostics);
        drop(sequencer);
        LintOutcome::Applied(outcome)
    }

    /// Remove everything published for a closed document.
    pub fn on_document_closed(&self, id: &DocumentId) -> ReconcileOutcome {
        self.reconciler().remove(id)
    }

    /// Carry diagnostics across an identity change (e.g. save-as).
    pub fn on_document_renamed(&self, old: &DocumentId, new: &DocumentId) {
        let old_gone = self.documents.document(old).is_some_and(|doc| doc.closed);
        self.reconciler().transplant(old, new, old_gone);
    }

    /// Config files governing `path`: the nearest, or the whole cascade.
    pub fn config_files(&self, path: &Path, all: bool) -> Vec<PathBuf> {
        let mode = if all {
            SearchMode::Cascade
        } else {
            SearchMode::Nearest
        };
        self.resolver.find_configs(path, mode)
    }

    pub fn ignore_file(&self, path: &Path) -> Option<PathBuf> {
        self.resolver.find_ignore(path)
    }

    /// Drain pending background refresh events, up to `budget`.
    ///
    /// Non-blocking; returns the number of events handled.
    pub fn poll_events(&self, budget: usize) -> usize {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let mut count = 0;
        while count < budget {
            match events.try_recv() {
                Ok(event) => {
                    log_cache_event(&event);
                    count += 1;
                }
                Err(mpsc::error::TryRecvError::Empty | mpsc::error::TryRecvError::Disconnected) => {
                    break;
                }
            }
        }
        count
    }

    #[must_use]
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        self.reconciler().collection().snapshot()
    }

    #[must_use]
    pub fn diagnostics(&self, id: &DocumentId) -> Option<Vec<Diagnostic>> {
        self.reconciler().collection().get(id).map(<[Diagnostic]>::to_vec)
    }

    /// Run `f` against the published collection.
    pub fn with_collection<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(self.reconciler().collection())
    }
}

fn log_cache_event(event: &CacheEvent) {
    match event {
        CacheEvent::Refreshed {
            directory,
            instance: Some(instance),
        } => tracing::info!(
            directory = %directory.display(),
            binary = %instance.binary_path().display(),
            valid = instance.is_valid(),
            "Lint tool changed"
        ),
        CacheEvent::Refreshed {
            directory,
            instance: None,
        } => tracing::info!(directory = %directory.display(), "Lint tool no longer found"),
        CacheEvent::RefreshFailed { directory, error } => {
            tracing::warn!(
                directory = %directory.display(),
                "Background tool lookup failed: {error}"
            );
        }
    }
}
