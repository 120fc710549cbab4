//! An offline platform served from a `PullRequestSnapshot`.
//!
//! `SnapshotPlatform` answers every read from the snapshot and records every
//! write (statuses, review requests) instead of sending it anywhere. Clones
//! share the snapshot and the recorder, so a host can hand boxed clones to the
//! runner and inspect what was published afterwards.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use custodian_contracts::{
    error::{CustodianError, CustodianResult},
    outcome::{ReviewRequest, StatusUpdate},
    review::{PullRequest, Review},
};
use custodian_core::{
    traits::{ChangeSource, ConfigSource, ReviewRequester, ReviewSource, StatusPublisher, TeamDirectory},
    Collaborators,
};

use crate::snapshot::PullRequestSnapshot;

/// Everything a run published, plus what it asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Published {
    pub statuses: Vec<StatusUpdate>,
    pub review_requests: Vec<ReviewRequest>,
    /// Inputs the run fetched, in order (`diff`, `changed_files`,
    /// `reviews`, `team:<name>`).
    pub fetches: Vec<String>,
}

/// Serves one change request from a snapshot and records what a run
/// publishes.
#[derive(Clone)]
pub struct SnapshotPlatform {
    snapshot: Arc<PullRequestSnapshot>,
    published: Arc<Mutex<Published>>,
}

impl SnapshotPlatform {
    pub fn new(snapshot: PullRequestSnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            published: Arc::new(Mutex::new(Published::default())),
        }
    }

    /// A copy of everything recorded so far.
    pub fn published(&self) -> Published {
        self.published.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Box clones of this platform as the runner's collaborators. The policy
    /// document comes from `config`.
    pub fn collaborators(&self, config: Box<dyn ConfigSource>) -> Collaborators {
        Collaborators {
            config,
            changes: Box::new(self.clone()),
            reviews: Box::new(self.clone()),
            teams: Box::new(self.clone()),
            statuses: Box::new(self.clone()),
            review_requests: Box::new(self.clone()),
        }
    }

    fn with_published<T>(&self, operation: &str, f: impl FnOnce(&mut Published) -> T) -> CustodianResult<T> {
        let mut published = self.published.lock().map_err(|e| CustodianError::PostFailed {
            operation: operation.to_string(),
            reason: format!("snapshot recorder lock poisoned: {}", e),
        })?;
        Ok(f(&mut published))
    }

    fn note_fetch(&self, what: String) -> CustodianResult<()> {
        debug!(pr = %self.snapshot.pull_request, input = %what, "serving from snapshot");
        self.with_published("record fetch", |p| p.fetches.push(what))
    }

    fn check_pr(&self, pr: &PullRequest) -> CustodianResult<()> {
        if pr == &self.snapshot.pull_request {
            Ok(())
        } else {
            Err(CustodianError::FetchFailed {
                operation: format!("look up {pr}"),
                reason: format!("snapshot holds {}", self.snapshot.pull_request),
            })
        }
    }
}

impl ConfigSource for SnapshotPlatform {
    fn config_document(&self, pr: &PullRequest, path: &str) -> CustodianResult<String> {
        self.check_pr(pr)?;
        self.snapshot.policy.clone().ok_or_else(|| CustodianError::FetchFailed {
            operation: format!("fetch policy document '{path}'"),
            reason: "snapshot carries no policy document".to_string(),
        })
    }
}

impl ChangeSource for SnapshotPlatform {
    fn diff(&self, pr: &PullRequest) -> CustodianResult<String> {
        self.check_pr(pr)?;
        self.note_fetch("diff".to_string())?;
        Ok(self.snapshot.diff.clone())
    }

    fn changed_files(&self, pr: &PullRequest) -> CustodianResult<Vec<String>> {
        self.check_pr(pr)?;
        self.note_fetch("changed_files".to_string())?;
        Ok(self.snapshot.changed_files.clone())
    }
}

impl ReviewSource for SnapshotPlatform {
    fn reviews(&self, pr: &PullRequest) -> CustodianResult<Vec<Review>> {
        self.check_pr(pr)?;
        self.note_fetch("reviews".to_string())?;
        Ok(self.snapshot.reviews.clone())
    }
}

impl TeamDirectory for SnapshotPlatform {
    fn team_members(&self, team: &str) -> CustodianResult<BTreeSet<String>> {
        self.note_fetch(format!("team:{team}"))?;
        self.snapshot.teams.get(team).cloned().ok_or_else(|| CustodianError::FetchFailed {
            operation: format!("fetch team '{team}'"),
            reason: "team not found in snapshot".to_string(),
        })
    }
}

impl StatusPublisher for SnapshotPlatform {
    fn set_status(&self, pr: &PullRequest, status: &StatusUpdate) -> CustodianResult<()> {
        self.check_pr(pr)?;
        self.with_published("post status", |p| p.statuses.push(status.clone()))
    }
}

impl ReviewRequester for SnapshotPlatform {
    fn request_reviews(&self, pr: &PullRequest, request: &ReviewRequest) -> CustodianResult<()> {
        self.check_pr(pr)?;
        self.with_published("request reviews", |p| p.review_requests.push(request.clone()))
    }
}

/// Reads the policy document from a local file, whatever repository path the
/// runner asks for.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileConfigSource {
    fn config_document(&self, pr: &PullRequest, path: &str) -> CustodianResult<String> {
        debug!(pr = %pr, repo_path = %path, file = %self.path.display(), "reading policy document");
        std::fs::read_to_string(&self.path).map_err(|e| CustodianError::FetchFailed {
            operation: format!("read policy file '{}'", self.path.display()),
            reason: e.to_string(),
        })
    }
}

/// A policy document held in memory.
#[derive(Debug, Clone)]
pub struct InlineConfigSource(pub String);

impl ConfigSource for InlineConfigSource {
    fn config_document(&self, _pr: &PullRequest, _path: &str) -> CustodianResult<String> {
        Ok(self.0.clone())
    }
}
