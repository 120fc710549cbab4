//! Diagnostic entry and log types.
//!
//! `DiagnosticEntry` wraps one `Diagnostic` with the run it belongs to, its
//! position in the log, and the time it was recorded. `DiagnosticLog` is the
//! snapshot produced by `InMemoryDiagnosticLog::export_log()`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use custodian_contracts::{
    outcome::{Diagnostic, DiagnosticKind},
    run::RunId,
};

/// One recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticEntry {
    /// Position in the log, starting at 0.
    pub sequence: u64,

    /// The run that produced the diagnostic.
    pub run_id: RunId,

    /// Wall-clock time (UTC) the entry was recorded.
    pub recorded_at: DateTime<Utc>,

    pub diagnostic: Diagnostic,
}

/// Every entry recorded so far, in append order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticLog {
    pub entries: Vec<DiagnosticEntry>,

    /// Wall-clock time (UTC) the log was exported.
    pub exported_at: DateTime<Utc>,
}

impl DiagnosticLog {
    /// Entries belonging to `run_id`.
    pub fn for_run<'a>(&'a self, run_id: &'a RunId) -> impl Iterator<Item = &'a DiagnosticEntry> + 'a {
        self.entries.iter().filter(move |e| &e.run_id == run_id)
    }

    /// Entries of the given kind.
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &DiagnosticEntry> + '_ {
        self.entries.iter().filter(move |e| e.diagnostic.kind == kind)
    }
}
