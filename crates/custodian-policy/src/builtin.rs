//! Rules that are always in force, derived from the run settings.
//!
//! Two rules are prepended to every policy, ahead of the document's own
//! rules:
//!
//! - `Locks touched` (id 0): any added or removed diff line carrying the lock
//!   marker needs one approval from the locks review team and one from the
//!   team leads.
//! - `Action files changed` (id 1): a change to the policy document itself
//!   needs one approval from the action review team.

use std::collections::BTreeSet;

use custodian_contracts::{
    error::ConfigIssue,
    rule::{CheckType, Condition, Criterion, NormalizedRule, RuleId, RuleKind},
    run::RunSettings,
};

/// Marks a line whose change needs the locks review team.
pub const LOCK_MARKER: &str = "🔒";
pub const LOCKS_RULE_NAME: &str = "Locks touched";
pub const ACTION_FILES_RULE_NAME: &str = "Action files changed";

/// Number of built-in rules; document rules are numbered from here.
pub const BUILTIN_RULE_COUNT: u32 = 2;

/// Check that every settings value the built-in rules rely on is present.
pub fn validate_settings(settings: &RunSettings) -> Vec<ConfigIssue> {
    [
        ("locks_review_team", &settings.locks_review_team),
        ("team_leads_team", &settings.team_leads_team),
        ("action_review_team", &settings.action_review_team),
        ("config_path", &settings.config_path),
        ("status_context", &settings.status_context),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(field, _)| ConfigIssue::new("settings", field, "must not be empty"))
    .collect()
}

/// The built-in rules for `settings`. Call `validate_settings` first.
pub fn builtin_rules(settings: &RunSettings) -> Vec<NormalizedRule> {
    let team_approval = |team: &str| Criterion {
        min_approvals: 1,
        request_review: true,
        users: None,
        teams: Some(BTreeSet::from([team.trim().to_string()])),
    };

    vec![
        NormalizedRule {
            id: RuleId(0),
            name: LOCKS_RULE_NAME.to_string(),
            condition: Condition::Include(format!("^[+-].*{LOCK_MARKER}")),
            check_type: CheckType::Diff,
            kind: RuleKind::And(vec![
                team_approval(&settings.locks_review_team),
                team_approval(&settings.team_leads_team),
            ]),
        },
        NormalizedRule {
            id: RuleId(1),
            name: ACTION_FILES_RULE_NAME.to_string(),
            condition: Condition::Include(format!("^{}$", regex::escape(settings.config_path.trim()))),
            check_type: CheckType::ChangedFiles,
            kind: RuleKind::Basic(team_approval(&settings.action_review_team)),
        },
    ]
}
