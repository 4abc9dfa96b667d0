//! Editor lint integration core.
//!
//! Finds the nearest lint config for a document, locates the project's lint
//! tool, runs it over the in-memory text and publishes the normalized
//! diagnostics, discarding results from superseded runs.

pub mod fs;
pub mod process;

mod cache;
mod diagnostics;
mod invoker;
mod locator;
mod manager;
mod reconciler;
mod report;
mod resolver;
mod sequencer;

pub use cache::{CacheEvent, LinterCache, ToolInstance};
pub use diagnostics::{DiagnosticsCollection, DiagnosticsStore};
pub use invoker::{InvokeError, LintInvoker};
pub use locator::{BinaryLocator, LocateError};
pub use manager::{
    ActivationError, DocumentProvider, LintManager, LintOutcome, SkipReason, file_document_id,
};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use resolver::{ConfigResolver, SearchMode};
pub use sequencer::{Sequencer, Ticket};
