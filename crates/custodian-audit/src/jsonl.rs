//! JSON Lines diagnostic sink.
//!
//! Each recorded diagnostic is written as one `DiagnosticEntry` serialized to
//! a single line, then flushed. Suitable for a file or for stderr.

use std::io::Write;
use std::sync::Mutex;

use chrono::Utc;

use custodian_contracts::{
    error::{CustodianError, CustodianResult},
    outcome::Diagnostic,
    run::RunId,
};
use custodian_core::traits::DiagnosticSink;

use crate::event::DiagnosticEntry;

struct JsonLinesState<W> {
    writer: W,
    sequence: u64,
}

/// A `DiagnosticSink` writing one JSON object per line to `W`.
pub struct JsonLinesSink<W: Write + Send> {
    state: Mutex<JsonLinesState<W>>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            state: Mutex::new(JsonLinesState { writer, sequence: 0 }),
        }
    }

    /// Consume the sink and return the underlying writer.
    pub fn into_inner(self) -> W {
        let state = match self.state.into_inner() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.writer
    }
}

impl<W: Write + Send> DiagnosticSink for JsonLinesSink<W> {
    fn record(&self, run_id: &RunId, diagnostic: &Diagnostic) -> CustodianResult<()> {
        let failed = |reason: String| CustodianError::PostFailed {
            operation: "write diagnostic".to_string(),
            reason,
        };

        let mut state = self
            .state
            .lock()
            .map_err(|e| failed(format!("diagnostic writer lock poisoned: {}", e)))?;

        let entry = DiagnosticEntry {
            sequence: state.sequence,
            run_id: run_id.clone(),
            recorded_at: Utc::now(),
            diagnostic: diagnostic.clone(),
        };
        let line = serde_json::to_string(&entry).map_err(|e| failed(e.to_string()))?;

        writeln!(state.writer, "{line}").map_err(|e| failed(e.to_string()))?;
        state.writer.flush().map_err(|e| failed(e.to_string()))?;
        state.sequence += 1;
        Ok(())
    }
}
