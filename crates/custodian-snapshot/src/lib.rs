//! # custodian-snapshot
//!
//! Offline evaluation of custodian policies.
//!
//! A [`PullRequestSnapshot`] is a JSON capture of one change request: its
//! metadata, diff, changed files, reviews, and the membership of the teams
//! the policy mentions. [`SnapshotPlatform`] serves that capture through every
//! collaborator trait and records what the run publishes, and
//! [`check_snapshot`] wires it to the TOML policy loader in one call.
//!
//! All data is local. No hosting platform is contacted.

pub mod check;
pub mod platform;
pub mod snapshot;

pub use check::{check_snapshot, CheckOutcome};
pub use platform::{FileConfigSource, InlineConfigSource, Published, SnapshotPlatform};
pub use snapshot::PullRequestSnapshot;

// ── Tests ─────────────────────────────────────────────────────────────────────
