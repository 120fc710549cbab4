//! Run identity, settings, and the final report.

use serde::{Deserialize, Serialize};

use crate::outcome::{CommitState, Diagnostic, EvaluationOutcome};
use crate::rule::RuleRef;

/// Unique identifier for a single evaluation run.
///
/// Appears in every diagnostic log written during the run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub uuid::Uuid);

impl RunId {
    /// Create a new, unique run ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

/// Default repository path of the policy document.
pub const DEFAULT_CONFIG_PATH: &str = ".github/custodian.toml";

/// Default commit status context.
pub const DEFAULT_STATUS_CONTEXT: &str = "custodian";

/// Settings supplied by the host for one run, outside the policy document.
///
/// The three team settings drive the built-in rules and must all be
/// non-empty; the loader rejects the run otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSettings {
    /// Team that must approve changes touching lock-marked lines.
    pub locks_review_team: String,
    /// Team leads who must co-approve lock-marked changes.
    pub team_leads_team: String,
    /// Team that must approve changes to the policy document itself.
    pub action_review_team: String,
    /// Repository path of the policy document.
    #[serde(default = "default_config_path")]
    pub config_path: String,
    /// Context name the commit status is posted under.
    #[serde(default = "default_status_context")]
    pub status_context: String,
}

fn default_config_path() -> String {
    DEFAULT_CONFIG_PATH.to_string()
}

fn default_status_context() -> String {
    DEFAULT_STATUS_CONTEXT.to_string()
}

impl RunSettings {
    /// Settings with the given teams and default path/context.
    pub fn new(
        locks_review_team: impl Into<String>,
        team_leads_team: impl Into<String>,
        action_review_team: impl Into<String>,
    ) -> Self {
        Self {
            locks_review_team: locks_review_team.into(),
            team_leads_team: team_leads_team.into(),
            action_review_team: action_review_team.into(),
            config_path: default_config_path(),
            status_context: default_status_context(),
        }
    }
}

/// Everything a run produced.
///
/// `verdict` is `Success` only when the configuration loaded and every
/// applicable rule succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub verdict: CommitState,
    /// Status description that was (or would have been) posted.
    pub description: String,
    /// One outcome per applicable rule, in declaration order.
    pub outcomes: Vec<EvaluationOutcome>,
    /// Rules whose condition did not match the change.
    pub skipped: Vec<RuleRef>,
    pub diagnostics: Vec<Diagnostic>,
    /// Side effects that failed; they never influence `verdict`.
    pub side_effect_errors: Vec<String>,
}

impl RunReport {
    /// Outcomes that did not succeed.
    pub fn failures(&self) -> impl Iterator<Item = &EvaluationOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}
