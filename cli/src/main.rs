//! Custodian command-line front end.
//!
//! Evaluates an approval policy against a captured change request, or checks
//! that a policy document is valid.
//!
//! Usage:
//!   custodian check --snapshot pr-42.json --config .github/custodian.toml
//!   custodian check --snapshot pr-42.json --json
//!   custodian validate --config .github/custodian.toml
//!
//! Team settings may come from flags or from `CUSTODIAN_LOCKS_REVIEW_TEAM`,
//! `CUSTODIAN_TEAM_LEADS_TEAM`, and `CUSTODIAN_ACTION_REVIEW_TEAM`.
//!
//! Exit codes: 0 when the verdict is success (or the policy is valid), 1 when
//! it is failure (or the policy is invalid), 2 when the run could not finish.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use custodian_audit::{InMemoryDiagnosticLog, JsonLinesSink};
use custodian_contracts::{
    error::{CustodianError, CustodianResult},
    outcome::{CommitState, EvaluationOutcome},
    run::{RunReport, RunSettings, DEFAULT_CONFIG_PATH, DEFAULT_STATUS_CONTEXT},
};
use custodian_core::traits::{ApprovalPolicy, ConfigSource, DiagnosticSink};
use custodian_policy::CompiledPolicy;
use custodian_snapshot::{check_snapshot, FileConfigSource, PullRequestSnapshot};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Custodian: approval policies for change requests.
#[derive(Parser)]
#[command(
    name = "custodian",
    about = "Evaluate change-request approval policies",
    long_about = "Evaluates a TOML approval policy against a JSON snapshot of a change\n\
                  request and reports which rules are satisfied."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a policy against a change-request snapshot.
    Check(CheckArgs),
    /// Load and validate a policy document without evaluating it.
    Validate(ValidateArgs),
}

#[derive(Args)]
struct SettingsArgs {
    /// Team that must approve changes to lock-marked lines.
    #[arg(long, env = "CUSTODIAN_LOCKS_REVIEW_TEAM")]
    locks_review_team: String,

    /// Team leads who must co-approve lock-marked changes.
    #[arg(long, env = "CUSTODIAN_TEAM_LEADS_TEAM")]
    team_leads_team: String,

    /// Team that must approve changes to the policy document.
    #[arg(long, env = "CUSTODIAN_ACTION_REVIEW_TEAM")]
    action_review_team: String,

    /// Repository path of the policy document.
    #[arg(long, env = "CUSTODIAN_CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config_path: String,

    /// Context the commit status is posted under.
    #[arg(long, env = "CUSTODIAN_STATUS_CONTEXT", default_value = DEFAULT_STATUS_CONTEXT)]
    status_context: String,
}

impl SettingsArgs {
    fn to_settings(&self) -> RunSettings {
        RunSettings {
            locks_review_team: self.locks_review_team.clone(),
            team_leads_team: self.team_leads_team.clone(),
            action_review_team: self.action_review_team.clone(),
            config_path: self.config_path.clone(),
            status_context: self.status_context.clone(),
        }
    }
}

#[derive(Args)]
struct CheckArgs {
    /// JSON snapshot of the change request.
    #[arg(long)]
    snapshot: PathBuf,

    /// Policy document. Defaults to the policy embedded in the snapshot.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the full run report as JSON.
    #[arg(long)]
    json: bool,

    /// Append diagnostics to this file as JSON Lines.
    #[arg(long)]
    diagnostics: Option<PathBuf>,

    #[command(flatten)]
    settings: SettingsArgs,
}

#[derive(Args)]
struct ValidateArgs {
    /// Policy document to validate.
    #[arg(long)]
    config: PathBuf,

    #[command(flatten)]
    settings: SettingsArgs,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Check(args) => run_check(&args),
        Command::Validate(args) => run_validate(&args),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("custodian error: {}", e);
            ExitCode::from(2)
        }
    }
}

// ── check ─────────────────────────────────────────────────────────────────────

fn run_check(args: &CheckArgs) -> CustodianResult<bool> {
    let snapshot = PullRequestSnapshot::from_file(&args.snapshot)?;
    let config: Option<Box<dyn ConfigSource>> = args
        .config
        .as_ref()
        .map(|path| Box::new(FileConfigSource::new(path)) as Box<dyn ConfigSource>);

    let sink: Box<dyn DiagnosticSink> = match &args.diagnostics {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| CustodianError::ConfigError {
                    reason: format!("failed to open diagnostics file '{}': {}", path.display(), e),
                })?;
            Box::new(JsonLinesSink::new(file))
        }
        None => Box::new(InMemoryDiagnosticLog::new()),
    };

    info!(snapshot = %args.snapshot.display(), "checking snapshot");
    let outcome = check_snapshot(snapshot, config, args.settings.to_settings(), sink)?;

    if args.json {
        let json = serde_json::to_string_pretty(&outcome.report).map_err(|e| CustodianError::PostFailed {
            operation: "render report".to_string(),
            reason: e.to_string(),
        })?;
        println!("{json}");
    } else {
        print_report(&outcome.report);
    }

    Ok(outcome.report.verdict == CommitState::Success)
}

fn print_report(report: &RunReport) {
    println!("run {}", report.run_id.0);
    println!("verdict: {}  {}", report.verdict, report.description);

    for outcome in &report.outcomes {
        match outcome {
            EvaluationOutcome::Success { rule } => println!("  [ok]    {rule}"),
            EvaluationOutcome::Failure { rule, problem, .. } => println!("  [unmet] {rule}: {problem}"),
        }
    }
    if !report.skipped.is_empty() {
        println!("  {} rule(s) not applicable", report.skipped.len());
    }

    if !report.diagnostics.is_empty() {
        println!();
        for diagnostic in &report.diagnostics {
            println!("{diagnostic}");
        }
    }
    for error in &report.side_effect_errors {
        eprintln!("warning: {error}");
    }
}

// ── validate ──────────────────────────────────────────────────────────────────

fn run_validate(args: &ValidateArgs) -> CustodianResult<bool> {
    match CompiledPolicy::from_file(&args.config, &args.settings.to_settings()) {
        Ok(policy) => {
            println!("{}: {} rule(s)", args.config.display(), policy.rules().len());
            for rule in policy.rules() {
                println!(
                    "  #{} {} '{}' on {}",
                    rule.id,
                    rule.kind.label(),
                    rule.name,
                    rule.check_type
                );
            }
            Ok(true)
        }
        Err(e) if e.is_configuration() => {
            println!("{}: invalid", args.config.display());
            for issue in e.config_issues() {
                println!("  {issue}");
            }
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
