//! Evaluation outcomes, diagnostics, and the run report.
//!
//! `EvaluationOutcome` is produced once per applicable rule. The runner folds
//! the outcomes into a `RunReport`, and every unmet rule or configuration
//! issue becomes one `Diagnostic`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rule::RuleRef;

/// What is known about a reviewer surfaced by a criterion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewUserInfo {
    /// Teams through which the user is eligible. `None` when the user is
    /// eligible only through an explicit `users` entry.
    pub teams: Option<BTreeSet<String>>,
}

impl ReviewUserInfo {
    pub fn via_team(team: impl Into<String>) -> Self {
        Self {
            teams: Some(BTreeSet::from([team.into()])),
        }
    }

    /// Union of two infos for the same login. A known team set always wins
    /// over an unknown one.
    pub fn union(&self, other: &ReviewUserInfo) -> ReviewUserInfo {
        let teams = match (&self.teams, &other.teams) {
            (None, None) => None,
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (Some(a), Some(b)) => Some(a.union(b).cloned().collect()),
        };
        ReviewUserInfo { teams }
    }
}

/// Login → reviewer info, sorted by login for reproducible output.
pub type ReviewerMap = BTreeMap<String, ReviewUserInfo>;

/// The result of evaluating one applicable rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Success {
        rule: RuleRef,
    },
    Failure {
        rule: RuleRef,
        /// Names every unmet requirement of the rule.
        problem: String,
        /// Eligible reviewers who have not approved and whose criterion asks
        /// for review requests.
        users_to_ask_for_review: ReviewerMap,
    },
}

impl EvaluationOutcome {
    pub fn rule(&self) -> &RuleRef {
        match self {
            EvaluationOutcome::Success { rule } | EvaluationOutcome::Failure { rule, .. } => rule,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EvaluationOutcome::Success { .. })
    }
}

/// Commit status states the runner posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitState {
    Success,
    Failure,
}

impl CommitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitState::Success => "success",
            CommitState::Failure => "failure",
        }
    }
}

impl fmt::Display for CommitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A commit status to publish for the head commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub context: String,
    pub state: CommitState,
    pub description: String,
}

/// Reviewers to request on the change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub users: BTreeSet<String>,
    pub teams: BTreeSet<String>,
}

impl ReviewRequest {
    /// Build a request from surfaced reviewers: every login, plus every team
    /// a login was surfaced through.
    pub fn from_reviewers(reviewers: &ReviewerMap) -> Self {
        let users = reviewers.keys().cloned().collect();
        let teams = reviewers
            .values()
            .filter_map(|info| info.teams.as_ref())
            .flatten()
            .cloned()
            .collect();
        Self { users, teams }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.teams.is_empty()
    }
}

/// Category of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The policy document or run settings are invalid.
    InvalidConfiguration,
    /// An applicable rule is not satisfied.
    UnmetRule,
}

/// One structured diagnostic line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Rule name (or positional label) the entry is about.
    pub rule: String,
    /// The offending field, for configuration issues.
    pub field: Option<String>,
    pub message: String,
    /// Logins asked to review, for unmet rules.
    #[serde(default)]
    pub reviewers: Vec<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.field) {
            (DiagnosticKind::InvalidConfiguration, Some(field)) => {
                write!(f, "[invalid configuration] {} / {}: {}", self.rule, field, self.message)
            }
            (DiagnosticKind::InvalidConfiguration, None) => {
                write!(f, "[invalid configuration] {}: {}", self.rule, self.message)
            }
            (DiagnosticKind::UnmetRule, _) => {
                write!(f, "[unmet rule] {}: {}", self.rule, self.message)?;
                if !self.reviewers.is_empty() {
                    write!(f, " (asked: {})", self.reviewers.join(", "))?;
                }
                Ok(())
            }
        }
    }
}
