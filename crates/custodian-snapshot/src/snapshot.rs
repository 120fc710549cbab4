//! The JSON snapshot of one change request.
//!
//! A snapshot captures everything a run reads from the hosting platform:
//!
//! ```json
//! {
//!   "pull_request": { "owner": "acme", "repo": "widgets", "number": 7,
//!                     "base_ref": "main", "head_sha": "abc123", "author": "dana" },
//!   "diff": "--- a/README.md\n+++ b/README.md\n...",
//!   "changed_files": ["README.md"],
//!   "reviews": [{ "login": "alice", "state": "APPROVED",
//!                 "submitted_at": "2024-05-01T12:00:00Z" }],
//!   "teams": { "core": ["alice", "bob"] },
//!   "policy": "[[rules]]\n..."
//! }
//! ```
//!
//! Teams absent from `teams` cannot be resolved, the same as an unknown team
//! on the platform. `policy` is optional; a host may read the policy document
//! from a file instead.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use custodian_contracts::{
    error::{CustodianError, CustodianResult},
    review::{PullRequest, Review},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PullRequestSnapshot {
    pub pull_request: PullRequest,

    #[serde(default)]
    pub diff: String,

    #[serde(default)]
    pub changed_files: Vec<String>,

    #[serde(default)]
    pub reviews: Vec<Review>,

    /// Team name → member logins.
    #[serde(default)]
    pub teams: BTreeMap<String, BTreeSet<String>>,

    /// The policy document in force for this change, if captured.
    #[serde(default)]
    pub policy: Option<String>,
}

impl PullRequestSnapshot {
    /// A snapshot with no changes, reviews, teams, or policy.
    pub fn new(pull_request: PullRequest) -> Self {
        Self {
            pull_request,
            diff: String::new(),
            changed_files: Vec::new(),
            reviews: Vec::new(),
            teams: BTreeMap::new(),
            policy: None,
        }
    }

    /// Parse a snapshot. A malformed snapshot is a `FetchFailed` error.
    pub fn from_json_str(s: &str) -> CustodianResult<Self> {
        serde_json::from_str(s).map_err(|e| CustodianError::FetchFailed {
            operation: "parse snapshot".to_string(),
            reason: e.to_string(),
        })
    }

    /// Read and parse the snapshot at `path`.
    pub fn from_file(path: &Path) -> CustodianResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| CustodianError::FetchFailed {
            operation: format!("read snapshot '{}'", path.display()),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&contents)
    }
}
