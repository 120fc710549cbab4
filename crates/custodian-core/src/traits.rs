//! Trait definitions for the custodian evaluation pipeline.
//!
//! Two groups of traits define the boundary of the core:
//!
//! - Platform collaborators: `ConfigSource`, `ChangeSource`, `ReviewSource`,
//!   `TeamDirectory` (inputs) and `StatusPublisher`, `ReviewRequester`,
//!   `DiagnosticSink` (outputs). Every call may block for an arbitrary time.
//! - The policy seam: `PolicyLoader` turns the policy document into an
//!   `ApprovalPolicy`, which the runner drives rule by rule.
//!
//! The runner never talks to the hosting platform except through these traits.

use std::collections::BTreeSet;

use custodian_contracts::{
    error::CustodianResult,
    outcome::{Diagnostic, EvaluationOutcome, ReviewRequest, StatusUpdate},
    review::{ApprovalSet, ChangeInputs, PullRequest, Review},
    rule::NormalizedRule,
    run::{RunId, RunSettings},
};

use crate::team_cache::TeamCache;

/// Supplies the raw policy document.
pub trait ConfigSource: Send + Sync {
    /// Return the text of the policy document at `path` for this change.
    fn config_document(&self, pr: &PullRequest, path: &str) -> CustodianResult<String>;
}

/// Supplies the content of the change.
pub trait ChangeSource: Send + Sync {
    /// The full unified diff of the change, as one string.
    fn diff(&self, pr: &PullRequest) -> CustodianResult<String>;

    /// Paths of every file the change touches, in platform order.
    fn changed_files(&self, pr: &PullRequest) -> CustodianResult<Vec<String>>;
}

/// Supplies the reviews submitted on the change.
pub trait ReviewSource: Send + Sync {
    fn reviews(&self, pr: &PullRequest) -> CustodianResult<Vec<Review>>;
}

/// Resolves team membership.
///
/// The runner wraps this in a `TeamCache`, so implementations are asked at
/// most once per team per run.
pub trait TeamDirectory: Send + Sync {
    fn team_members(&self, team: &str) -> CustodianResult<BTreeSet<String>>;
}

/// Publishes the aggregate verdict as a commit status.
pub trait StatusPublisher: Send + Sync {
    fn set_status(&self, pr: &PullRequest, status: &StatusUpdate) -> CustodianResult<()>;
}

/// Asks reviewers to review the change.
pub trait ReviewRequester: Send + Sync {
    fn request_reviews(&self, pr: &PullRequest, request: &ReviewRequest) -> CustodianResult<()>;
}

/// Receives one structured entry per configuration issue or unmet rule.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, run_id: &RunId, diagnostic: &Diagnostic) -> CustodianResult<()>;
}

/// Everything a rule evaluation may look at besides the rule itself.
pub struct ReviewContext<'a> {
    pub pr: &'a PullRequest,
    pub approvals: &'a ApprovalSet,
    pub teams: &'a TeamCache<'a>,
}

/// A loaded, validated policy.
///
/// Implementations are deterministic: the same rule, change, and approval
/// state always produce the same answer.
pub trait ApprovalPolicy: Send + Sync {
    /// All rules in declaration order.
    fn rules(&self) -> &[NormalizedRule];

    /// Decide whether `rule` applies to the change.
    ///
    /// Returns false when the input the rule's check type needs is absent.
    fn is_applicable(&self, rule: &NormalizedRule, change: &ChangeInputs) -> bool;

    /// Evaluate an applicable rule against the current approvals.
    ///
    /// An unmet rule is a `Failure` outcome, not an error. `Err` is reserved
    /// for collaborator failures such as an unresolvable team.
    fn evaluate(&self, rule: &NormalizedRule, ctx: &ReviewContext<'_>) -> CustodianResult<EvaluationOutcome>;
}

/// Builds an `ApprovalPolicy` from the policy document.
pub trait PolicyLoader: Send + Sync {
    /// Parse and validate `document`.
    ///
    /// Any invalid rule or setting fails the whole load with a configuration
    /// error; there is no partial acceptance.
    fn load(&self, document: &str, settings: &RunSettings) -> CustodianResult<Box<dyn ApprovalPolicy>>;
}
