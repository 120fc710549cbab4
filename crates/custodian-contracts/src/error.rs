//! Error types for the custodian evaluation pipeline.
//!
//! All fallible operations return `CustodianResult<T>`. Configuration errors
//! carry every issue found so the runner can emit one diagnostic per issue.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One problem found while loading the policy document or run settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIssue {
    /// The rule name, or a positional label such as `rules[2]` when the rule
    /// has no usable name. `settings` for run-settings problems.
    pub rule: String,
    /// The offending field (`name`, `any[1].min_approvals`, ...).
    pub field: String,
    /// Human-readable explanation.
    pub reason: String,
}

impl ConfigIssue {
    pub fn new(rule: impl Into<String>, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule '{}': field '{}' {}", self.rule, self.field, self.reason)
    }
}

/// The unified error type for the custodian crates.
#[derive(Debug, Error)]
pub enum CustodianError {
    /// The policy document could not be parsed at all.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The policy document parsed, but one or more rules or settings are invalid.
    #[error("invalid configuration: {}", summarize(.issues))]
    InvalidConfiguration { issues: Vec<ConfigIssue> },

    /// A required input could not be fetched from the hosting platform.
    #[error("{operation} failed: {reason}")]
    FetchFailed { operation: String, reason: String },

    /// A side effect (status, review request, diagnostic) could not be delivered.
    #[error("{operation} failed: {reason}")]
    PostFailed { operation: String, reason: String },
}

impl CustodianError {
    /// True for errors that stem from the policy document or run settings.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CustodianError::ConfigError { .. } | CustodianError::InvalidConfiguration { .. }
        )
    }

    /// The individual issues behind a configuration error.
    ///
    /// A document-level parse failure is reported as a single issue against
    /// the pseudo-rule `document`.
    pub fn config_issues(&self) -> Vec<ConfigIssue> {
        match self {
            CustodianError::InvalidConfiguration { issues } => issues.clone(),
            CustodianError::ConfigError { reason } => {
                vec![ConfigIssue::new("document", "rules", reason.clone())]
            }
            _ => Vec::new(),
        }
    }
}

fn summarize(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience alias used throughout the custodian crates.
pub type CustodianResult<T> = Result<T, CustodianError>;
