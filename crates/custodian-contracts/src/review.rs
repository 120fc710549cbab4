//! Change-request and review types.
//!
//! These describe the PR under evaluation and the reviews collected on it.
//! They are plain data; deriving approvals from reviews happens in
//! custodian-core.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies the change request being evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Repository owner (user or organization login).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Change request number.
    pub number: u64,
    /// Base branch ref the change targets.
    pub base_ref: String,
    /// Head commit SHA; statuses are posted against it.
    pub head_sha: String,
    /// Login of the change author.
    pub author: String,
    /// Link used in log lines.
    #[serde(default)]
    pub html_url: String,
}

impl fmt::Display for PullRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// State of a single submitted review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
}

/// A review as reported by the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub login: String,
    pub state: ReviewState,
    pub submitted_at: DateTime<Utc>,
}

/// Logins whose latest review is an approval, mapped to the approval time.
///
/// Built by `custodian_core::approvals::collect_approvals`; never contains
/// the change author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalSet {
    approvals: BTreeMap<String, DateTime<Utc>>,
}

impl ApprovalSet {
    /// Record that `login` approved at `at`.
    pub fn insert(&mut self, login: impl Into<String>, at: DateTime<Utc>) {
        self.approvals.insert(login.into(), at);
    }

    /// Return true if `login` currently approves the change.
    pub fn has(&self, login: &str) -> bool {
        self.approvals.contains_key(login)
    }

    /// Return an iterator over approving logins in sorted order.
    pub fn logins(&self) -> impl Iterator<Item = &String> {
        self.approvals.keys()
    }

    pub fn len(&self) -> usize {
        self.approvals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.approvals.is_empty()
    }
}

impl FromIterator<(String, DateTime<Utc>)> for ApprovalSet {
    fn from_iter<I: IntoIterator<Item = (String, DateTime<Utc>)>>(iter: I) -> Self {
        Self {
            approvals: iter.into_iter().collect(),
        }
    }
}

/// The change data rules are matched against.
///
/// The runner only fetches what the loaded rules need; an input that was not
/// fetched is `None` and no rule of that check type can apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeInputs {
    /// Full unified diff, as one string.
    pub diff: Option<String>,
    /// Changed file paths, in platform order.
    pub changed_files: Option<Vec<String>>,
}
