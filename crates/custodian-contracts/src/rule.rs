//! Normalized rule types.
//!
//! These are the validated shapes produced by the rule normalizer in
//! custodian-policy. Once built, a `NormalizedRule` is immutable for the
//! rest of the run; downstream code matches on `RuleKind` and never inspects
//! raw field presence again.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier assigned to each rule in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleId(pub u32);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a rule's condition is matched against.
///
/// Expressed in TOML as `check_type = "diff"` or `check_type = "changed_files"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    /// The full unified diff, matched as one blob.
    Diff,
    /// Each changed file path, matched individually.
    ChangedFiles,
}

impl CheckType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Diff => "diff",
            CheckType::ChangedFiles => "changed_files",
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule's applicability condition. Patterns are regular expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Applicable when the pattern matches. Covers both the bare-string form
    /// and `{ include = "..." }`.
    Include(String),
    /// Applicable when the pattern does not match.
    Exclude(String),
    /// Applicable when `include` matches and `exclude` does not.
    IncludeExclude { include: String, exclude: String },
}

/// One approval requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    /// Always at least 1 after normalization.
    pub min_approvals: u32,
    /// Whether eligible reviewers should be asked to review when unmet.
    pub request_review: bool,
    /// Explicit allowlist of logins. `None` together with `teams: None`
    /// means anyone may approve.
    pub users: Option<BTreeSet<String>>,
    /// Teams whose members may approve.
    pub teams: Option<BTreeSet<String>>,
}

impl Criterion {
    /// True when neither `users` nor `teams` restricts who may approve.
    pub fn is_unrestricted(&self) -> bool {
        self.users.is_none() && self.teams.is_none()
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.min_approvals == 1 { "approval" } else { "approvals" };
        write!(f, "{} {}", self.min_approvals, noun)?;

        let mut sources = Vec::new();
        if let Some(users) = &self.users {
            sources.push(format!(
                "users [{}]",
                users.iter().cloned().collect::<Vec<_>>().join(", ")
            ));
        }
        if let Some(teams) = &self.teams {
            sources.push(format!(
                "teams [{}]",
                teams.iter().cloned().collect::<Vec<_>>().join(", ")
            ));
        }
        if !sources.is_empty() {
            write!(f, " from {}", sources.join(" or "))?;
        }
        Ok(())
    }
}

/// The closed set of rule shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "criteria", rename_all = "snake_case")]
pub enum RuleKind {
    /// A single criterion.
    Basic(Criterion),
    /// Satisfied when any child criterion is satisfied.
    Or(Vec<Criterion>),
    /// Satisfied when every child criterion is satisfied.
    And(Vec<Criterion>),
}

impl RuleKind {
    /// Short name of the rule shape, as used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            RuleKind::Basic(_) => "BasicRule",
            RuleKind::Or(_) => "OrRule",
            RuleKind::And(_) => "AndRule",
        }
    }

    /// All criteria of the rule, in declaration order.
    pub fn criteria(&self) -> &[Criterion] {
        match self {
            RuleKind::Basic(c) => std::slice::from_ref(c),
            RuleKind::Or(cs) | RuleKind::And(cs) => cs,
        }
    }
}

/// A validated rule ready for matching and evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRule {
    pub id: RuleId,
    pub name: String,
    pub condition: Condition,
    pub check_type: CheckType,
    pub kind: RuleKind,
}

impl NormalizedRule {
    /// A lightweight reference used in outcomes and diagnostics.
    pub fn reference(&self) -> RuleRef {
        RuleRef {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind.label().to_string(),
        }
    }
}

/// Identifies a rule in reports without carrying its full definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleRef {
    pub id: RuleId,
    pub name: String,
    pub kind: String,
}

impl fmt::Display for RuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' (#{})", self.kind, self.name, self.id)
    }
}
