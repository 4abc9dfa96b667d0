//! Per-document admission tickets for lint cycles.
//!
//! Superseded runs are never cancelled. They finish and their completion is
//! refused here.

use std::collections::HashMap;

use lintel_types::DocumentId;

/// Start-order position of one lint cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    document: DocumentId,
    index: u64,
}

impl Ticket {
    #[must_use]
    pub fn document(&self) -> &DocumentId {
        &self.document
    }

    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    last_started: u64,
    last_ended: u64,
}

impl Default for Counter {
    fn default() -> Self {
        Self {
            last_started: 1,
            last_ended: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct Sequencer {
    counters: HashMap<DocumentId, Counter>,
}

impl Sequencer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next ticket for `document`.
    pub fn admit(&mut self, document: &DocumentId) -> Ticket {
        let counter = self.counters.entry(document.clone()).or_default();
        let index = counter.last_started;
        counter.last_started += 1;
        Ticket {
            document: document.clone(),
            index,
        }
    }

    /// Whether the run holding `ticket` may apply its result.
    ///
    /// Accepting a ticket refuses every ticket issued before it.
    pub fn complete(&mut self, ticket: &Ticket) -> bool {
        let counter = self.counters.entry(ticket.document.clone()).or_default();
        if counter.last_ended < ticket.index {
            counter.last_ended = ticket.index;
            true
        } else {
            false
        }
    }
}
