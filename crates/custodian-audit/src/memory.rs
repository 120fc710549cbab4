//! In-memory implementation of `DiagnosticSink`.
//!
//! `InMemoryDiagnosticLog` keeps entries in a `Vec` behind `Arc<Mutex<_>>`.
//! Clones share the same log, so a host can hand one clone to the runner and
//! keep another to export the entries after the run.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::info;

use custodian_contracts::{
    error::{CustodianError, CustodianResult},
    outcome::Diagnostic,
    run::RunId,
};
use custodian_core::traits::DiagnosticSink;

use crate::event::{DiagnosticEntry, DiagnosticLog};

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct InMemoryState {
    pub(crate) entries: Vec<DiagnosticEntry>,

    /// The next sequence number to assign (starts at 0).
    pub(crate) sequence: u64,
}

// ── Public sink ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct InMemoryDiagnosticLog {
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryDiagnosticLog {
    pub fn new() -> Self {
        let state = InMemoryState {
            entries: Vec::new(),
            sequence: 0,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Export every entry recorded so far.
    ///
    /// Export only reads, so a poisoned lock still yields the entries that
    /// were recorded before the panic.
    pub fn export_log(&self) -> DiagnosticLog {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        DiagnosticLog {
            entries: state.entries.clone(),
            exported_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryDiagnosticLog {
    fn default() -> Self {
        Self::new()
    }
}

// ── DiagnosticSink impl ───────────────────────────────────────────────────────

impl DiagnosticSink for InMemoryDiagnosticLog {
    fn record(&self, run_id: &RunId, diagnostic: &Diagnostic) -> CustodianResult<()> {
        let mut state = self.state.lock().map_err(|e| CustodianError::PostFailed {
            operation: "record diagnostic".to_string(),
            reason: format!("diagnostic log lock poisoned: {}", e),
        })?;

        let sequence = state.sequence;
        state.entries.push(DiagnosticEntry {
            sequence,
            run_id: run_id.clone(),
            recorded_at: Utc::now(),
            diagnostic: diagnostic.clone(),
        });
        state.sequence += 1;

        info!(
            run_id = %run_id.0,
            sequence,
            kind = ?diagnostic.kind,
            rule = %diagnostic.rule,
            "{}",
            diagnostic
        );
        Ok(())
    }
}
