//! # custodian-audit
//!
//! Diagnostic sinks for the custodian approval engine.
//!
//! ## Overview
//!
//! The runner records one `Diagnostic` per configuration issue and per unmet
//! rule. Each sink here wraps it in a `DiagnosticEntry` that carries the run
//! id, a sequence number, and a timestamp.
//!
//! - [`InMemoryDiagnosticLog`] keeps entries for later export.
//! - [`JsonLinesSink`] streams entries as JSON Lines to any writer.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use custodian_audit::InMemoryDiagnosticLog;
//!
//! let log = InMemoryDiagnosticLog::new();
//! let runner = Runner::new(loader, platform, Box::new(log.clone()), settings);
//! runner.run(&pr)?;
//! let entries = log.export_log().entries;
//! ```

pub mod event;
pub mod jsonl;
pub mod memory;

pub use event::{DiagnosticEntry, DiagnosticLog};
pub use jsonl::JsonLinesSink;
pub use memory::InMemoryDiagnosticLog;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::thread;

    use custodian_contracts::{
        outcome::{Diagnostic, DiagnosticKind},
        run::RunId,
    };
    use custodian_core::traits::DiagnosticSink;

    use super::{DiagnosticEntry, InMemoryDiagnosticLog, JsonLinesSink};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn unmet(rule: &str) -> Diagnostic {
        Diagnostic {
            kind: DiagnosticKind::UnmetRule,
            rule: rule.to_string(),
            field: None,
            message: "needs 1 approval, has 0".to_string(),
            reviewers: vec!["alice".to_string()],
        }
    }

    fn invalid(rule: &str, field: &str) -> Diagnostic {
        Diagnostic {
            kind: DiagnosticKind::InvalidConfiguration,
            rule: rule.to_string(),
            field: Some(field.to_string()),
            message: "is required".to_string(),
            reviewers: Vec::new(),
        }
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    /// Sequence numbers must be 0, 1, 2, … with no gaps.
    #[test]
    fn test_sequence_monotonic() {
        let log = InMemoryDiagnosticLog::new();
        let run = RunId::new();
        log.record(&run, &unmet("a")).unwrap();
        log.record(&run, &unmet("b")).unwrap();
        log.record(&run, &invalid("c", "name")).unwrap();

        let exported = log.export_log();
        for (idx, entry) in exported.entries.iter().enumerate() {
            assert_eq!(entry.sequence, idx as u64);
        }
        assert_eq!(exported.entries[2].diagnostic.rule, "c");
    }

    /// Clones share one log.
    #[test]
    fn test_clones_share_entries() {
        let log = InMemoryDiagnosticLog::new();
        let handle = log.clone();
        log.record(&RunId::new(), &unmet("docs")).unwrap();

        assert_eq!(handle.len(), 1);
        assert!(!handle.is_empty());
    }

    #[test]
    fn test_filter_by_run_and_kind() {
        let log = InMemoryDiagnosticLog::new();
        let (first, second) = (RunId::new(), RunId::new());
        log.record(&first, &invalid("rules[0]", "name")).unwrap();
        log.record(&second, &unmet("docs")).unwrap();
        log.record(&second, &unmet("runtime")).unwrap();

        let exported = log.export_log();
        assert_eq!(exported.for_run(&second).count(), 2);
        assert_eq!(exported.of_kind(DiagnosticKind::InvalidConfiguration).count(), 1);
    }

    #[test]
    fn test_concurrent_records_are_all_kept() {
        let log = InMemoryDiagnosticLog::new();
        let run = RunId::new();

        thread::scope(|scope| {
            for i in 0..8 {
                let (log, run) = (&log, &run);
                scope.spawn(move || log.record(run, &unmet(&format!("rule-{i}"))).unwrap());
            }
        });

        let mut sequences: Vec<u64> = log.export_log().entries.iter().map(|e| e.sequence).collect();
        sequences.sort_unstable();
        assert_eq!(sequences, (0..8).collect::<Vec<_>>());
    }

    /// Each JSON line deserializes back to the recorded entry.
    #[test]
    fn test_json_lines_one_entry_per_line() {
        let sink = JsonLinesSink::new(Vec::new());
        let run = RunId::new();
        sink.record(&run, &invalid("Docs", "check_type")).unwrap();
        sink.record(&run, &unmet("Docs")).unwrap();

        let bytes = sink.into_inner();
        let text = String::from_utf8(bytes).unwrap();
        let entries: Vec<DiagnosticEntry> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].sequence, 0);
        assert_eq!(entries[0].diagnostic.field.as_deref(), Some("check_type"));
        assert_eq!(entries[1].diagnostic.reviewers, vec!["alice"]);
        assert_eq!(entries[1].run_id, run);
    }
}
