//! The custodian runner: one policy evaluation for one change request.
//!
//! The runner enforces the evaluation order:
//!
//!   Load policy → Fetch change + reviews → Match conditions → Evaluate rules
//!   → Verdict → Diagnostics, review requests, status
//!
//! A configuration error stops the run before anything is fetched or
//! evaluated; the only side effects are the configuration diagnostics and a
//! failure status. A failed fetch also stops the run and is returned as an
//! error after a best-effort failure status. Once a verdict exists, side
//! effect failures are logged and collected but never change it.

use tracing::{debug, error, info, warn};

use custodian_contracts::{
    error::{CustodianError, CustodianResult},
    outcome::{CommitState, Diagnostic, DiagnosticKind, EvaluationOutcome, ReviewRequest, StatusUpdate},
    review::{ChangeInputs, PullRequest},
    rule::{CheckType, NormalizedRule, RuleRef},
    run::{RunId, RunReport, RunSettings},
};

use crate::approvals::collect_approvals;
use crate::team_cache::TeamCache;
use crate::traits::{
    ChangeSource, ConfigSource, DiagnosticSink, PolicyLoader, ReviewContext, ReviewRequester, ReviewSource,
    StatusPublisher, TeamDirectory,
};

/// GitHub rejects longer status descriptions.
pub const MAX_DESCRIPTION_LEN: usize = 140;

/// The hosting-platform collaborators a run talks to.
pub struct Collaborators {
    pub config: Box<dyn ConfigSource>,
    pub changes: Box<dyn ChangeSource>,
    pub reviews: Box<dyn ReviewSource>,
    pub teams: Box<dyn TeamDirectory>,
    pub statuses: Box<dyn StatusPublisher>,
    pub review_requests: Box<dyn ReviewRequester>,
}

/// Rule outcomes before any side effect has run.
struct Evaluation {
    outcomes: Vec<EvaluationOutcome>,
    skipped: Vec<RuleRef>,
}

/// Drives a complete run for one change request.
///
/// A `Runner` holds no per-run state and can be reused; every call to
/// `run()` gets a fresh team cache and run id.
pub struct Runner {
    loader: Box<dyn PolicyLoader>,
    platform: Collaborators,
    sink: Box<dyn DiagnosticSink>,
    settings: RunSettings,
}

impl Runner {
    pub fn new(
        loader: Box<dyn PolicyLoader>,
        platform: Collaborators,
        sink: Box<dyn DiagnosticSink>,
        settings: RunSettings,
    ) -> Self {
        Self {
            loader,
            platform,
            sink,
            settings,
        }
    }

    /// Evaluate the policy against `pr` and publish the verdict.
    ///
    /// # Errors
    ///
    /// Returns `Err` only when a required input (policy document, diff,
    /// changed files, reviews, team membership) cannot be fetched. An invalid
    /// policy document is NOT an error: it yields a `Failure` report with one
    /// diagnostic per issue.
    pub fn run(&self, pr: &PullRequest) -> CustodianResult<RunReport> {
        let run_id = RunId::new();
        info!(run_id = %run_id.0, pr = %pr, "custodian run starting");

        match self.evaluate(pr) {
            Ok(evaluation) => Ok(self.conclude(run_id, pr, evaluation)),
            Err(e) if e.is_configuration() => Ok(self.reject_configuration(run_id, pr, &e)),
            Err(e) => {
                self.abort(pr, &e);
                Err(e)
            }
        }
    }

    // ── Evaluation ───────────────────────────────────────────────────────────

    fn evaluate(&self, pr: &PullRequest) -> CustodianResult<Evaluation> {
        // ── Step 1: Load and validate the policy ─────────────────────────────
        let document = self
            .platform
            .config
            .config_document(pr, &self.settings.config_path)?;
        let policy = self.loader.load(&document, &self.settings)?;
        debug!(pr = %pr, rules = policy.rules().len(), "policy loaded");

        // ── Step 2: Fetch what the rules need ────────────────────────────────
        let change = self.fetch_change(pr, policy.rules())?;
        let reviews = self.platform.reviews.reviews(pr)?;
        let approvals = collect_approvals(&reviews, &pr.author);
        debug!(pr = %pr, approvals = approvals.len(), "approvals collected");

        // ── Step 3: Match and evaluate, in declaration order ─────────────────
        let teams = TeamCache::new(self.platform.teams.as_ref());
        let ctx = ReviewContext {
            pr,
            approvals: &approvals,
            teams: &teams,
        };

        let mut outcomes = Vec::new();
        let mut skipped = Vec::new();
        for rule in policy.rules() {
            if !policy.is_applicable(rule, &change) {
                debug!(rule_id = %rule.id, rule = %rule.name, "rule not applicable, skipping");
                skipped.push(rule.reference());
                continue;
            }

            let outcome = policy.evaluate(rule, &ctx)?;
            debug!(
                rule_id = %rule.id,
                rule = %rule.name,
                satisfied = outcome.is_success(),
                "rule evaluated"
            );
            outcomes.push(outcome);
        }

        Ok(Evaluation { outcomes, skipped })
    }

    /// Fetch only the inputs some rule's check type needs.
    fn fetch_change(&self, pr: &PullRequest, rules: &[NormalizedRule]) -> CustodianResult<ChangeInputs> {
        let needs = |check_type: CheckType| rules.iter().any(|r| r.check_type == check_type);

        let diff = if needs(CheckType::Diff) {
            Some(self.platform.changes.diff(pr)?)
        } else {
            None
        };
        let changed_files = if needs(CheckType::ChangedFiles) {
            Some(self.platform.changes.changed_files(pr)?)
        } else {
            None
        };

        Ok(ChangeInputs { diff, changed_files })
    }

    // ── Conclusion ───────────────────────────────────────────────────────────

    fn conclude(&self, run_id: RunId, pr: &PullRequest, evaluation: Evaluation) -> RunReport {
        let Evaluation { outcomes, skipped } = evaluation;
        let mut side_effect_errors = Vec::new();
        let mut diagnostics = Vec::new();

        let unmet: Vec<&RuleRef> = outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(EvaluationOutcome::rule)
            .collect();

        let (verdict, description) = if outcomes.is_empty() {
            (CommitState::Success, "No approval rules apply to this change".to_string())
        } else if unmet.is_empty() {
            (
                CommitState::Success,
                format!("All {} applicable approval rules are satisfied", outcomes.len()),
            )
        } else {
            let names = unmet.iter().map(|r| r.name.as_str()).collect::<Vec<_>>().join(", ");
            (
                CommitState::Failure,
                format!("{} of {} approval rules unmet: {}", unmet.len(), outcomes.len(), names),
            )
        };

        for outcome in &outcomes {
            let EvaluationOutcome::Failure {
                rule,
                problem,
                users_to_ask_for_review,
            } = outcome
            else {
                continue;
            };

            let diagnostic = Diagnostic {
                kind: DiagnosticKind::UnmetRule,
                rule: rule.name.clone(),
                field: None,
                message: problem.clone(),
                reviewers: users_to_ask_for_review.keys().cloned().collect(),
            };
            warn!(
                run_id = %run_id.0,
                rule_id = %rule.id,
                rule = %rule.name,
                problem = %problem,
                "approval rule not satisfied"
            );
            self.record(&run_id, &diagnostic, &mut side_effect_errors);
            diagnostics.push(diagnostic);

            let request = ReviewRequest::from_reviewers(users_to_ask_for_review);
            if request.is_empty() {
                continue;
            }
            if let Err(e) = self.platform.review_requests.request_reviews(pr, &request) {
                warn!(pr = %pr, rule = %rule.name, error = %e, "review request failed");
                side_effect_errors.push(e.to_string());
            } else {
                info!(
                    pr = %pr,
                    rule = %rule.name,
                    users = request.users.len(),
                    teams = request.teams.len(),
                    "review requested"
                );
            }
        }

        let description = truncate_description(&description);
        self.post_status(pr, verdict, &description, &mut side_effect_errors);

        info!(run_id = %run_id.0, pr = %pr, verdict = %verdict, "custodian run finished");
        RunReport {
            run_id,
            verdict,
            description,
            outcomes,
            skipped,
            diagnostics,
            side_effect_errors,
        }
    }

    fn reject_configuration(&self, run_id: RunId, pr: &PullRequest, e: &CustodianError) -> RunReport {
        let mut side_effect_errors = Vec::new();
        let issues = e.config_issues();

        let diagnostics: Vec<Diagnostic> = issues
            .iter()
            .map(|issue| Diagnostic {
                kind: DiagnosticKind::InvalidConfiguration,
                rule: issue.rule.clone(),
                field: Some(issue.field.clone()),
                message: issue.reason.clone(),
                reviewers: Vec::new(),
            })
            .collect();

        for diagnostic in &diagnostics {
            warn!(
                run_id = %run_id.0,
                rule = %diagnostic.rule,
                field = ?diagnostic.field,
                reason = %diagnostic.message,
                "invalid configuration"
            );
            self.record(&run_id, diagnostic, &mut side_effect_errors);
        }

        let description = match issues.as_slice() {
            [only] => format!("Invalid configuration: {only}"),
            [first, rest @ ..] => format!("Invalid configuration ({} more): {first}", rest.len()),
            [] => format!("Invalid configuration: {e}"),
        };
        let description = truncate_description(&description);
        self.post_status(pr, CommitState::Failure, &description, &mut side_effect_errors);

        RunReport {
            run_id,
            verdict: CommitState::Failure,
            description,
            outcomes: Vec::new(),
            skipped: Vec::new(),
            diagnostics,
            side_effect_errors,
        }
    }

    /// Best-effort failure status for a run that could not be evaluated.
    fn abort(&self, pr: &PullRequest, e: &CustodianError) {
        error!(pr = %pr, error = %e, "custodian run aborted");
        let description = truncate_description(&format!("Could not evaluate approvals: {e}"));
        let mut ignored = Vec::new();
        self.post_status(pr, CommitState::Failure, &description, &mut ignored);
    }

    // ── Side effects ─────────────────────────────────────────────────────────

    fn record(&self, run_id: &RunId, diagnostic: &Diagnostic, errors: &mut Vec<String>) {
        if let Err(e) = self.sink.record(run_id, diagnostic) {
            warn!(run_id = %run_id.0, error = %e, "diagnostic could not be recorded");
            errors.push(e.to_string());
        }
    }

    fn post_status(&self, pr: &PullRequest, state: CommitState, description: &str, errors: &mut Vec<String>) {
        let status = StatusUpdate {
            context: self.settings.status_context.clone(),
            state,
            description: description.to_string(),
        };
        if let Err(e) = self.platform.statuses.set_status(pr, &status) {
            warn!(pr = %pr, state = %state, error = %e, "commit status could not be posted");
            errors.push(e.to_string());
        }
    }
}

/// Clamp a status description to `MAX_DESCRIPTION_LEN` characters.
pub fn truncate_description(description: &str) -> String {
    if description.chars().count() <= MAX_DESCRIPTION_LEN {
        return description.to_string();
    }
    let mut clipped: String = description.chars().take(MAX_DESCRIPTION_LEN - 3).collect();
    clipped.push_str("...");
    clipped
}

// ── Tests ────────────────────────────────────────────────────────────────────
