//! One-call wiring: evaluate a snapshot with the TOML policy loader.

use custodian_contracts::{error::CustodianResult, run::RunReport, run::RunSettings};
use custodian_core::{
    traits::{ConfigSource, DiagnosticSink},
    Runner,
};
use custodian_policy::TomlPolicyLoader;

use crate::platform::{Published, SnapshotPlatform};
use crate::snapshot::PullRequestSnapshot;

/// The report of a snapshot run together with what it published.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub report: RunReport,
    pub published: Published,
}

/// Run the policy against `snapshot`.
///
/// The policy document comes from `config`, or from the snapshot itself when
/// `config` is `None`. Errors are the runner's: only fetch failures are
/// returned as `Err`.
pub fn check_snapshot(
    snapshot: PullRequestSnapshot,
    config: Option<Box<dyn ConfigSource>>,
    settings: RunSettings,
    sink: Box<dyn DiagnosticSink>,
) -> CustodianResult<CheckOutcome> {
    let pr = snapshot.pull_request.clone();
    let platform = SnapshotPlatform::new(snapshot);
    let config: Box<dyn ConfigSource> = match config {
        Some(config) => config,
        None => Box::new(platform.clone()),
    };

    let runner = Runner::new(
        Box::new(TomlPolicyLoader::new()),
        platform.collaborators(config),
        sink,
        settings,
    );
    let report = runner.run(&pr)?;

    Ok(CheckOutcome {
        report,
        published: platform.published(),
    })
}
