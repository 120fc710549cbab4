//! # custodian-core
//!
//! The evaluation runtime for custodian approval policies.
//!
//! This crate provides:
//! - The collaborator traits the runner talks to (`ConfigSource`,
//!   `ChangeSource`, `ReviewSource`, `TeamDirectory`, `StatusPublisher`,
//!   `ReviewRequester`, `DiagnosticSink`)
//! - The policy seam (`PolicyLoader`, `ApprovalPolicy`)
//! - The per-run `TeamCache` and approval derivation
//! - The `Runner` that wires them together in the correct order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use custodian_core::{Runner, runner::Collaborators};
//!
//! let runner = Runner::new(loader, collaborators, sink, settings);
//! let report = runner.run(&pr)?;
//! ```

pub mod approvals;
pub mod runner;
pub mod team_cache;
pub mod traits;

pub use runner::{Collaborators, Runner};
pub use team_cache::TeamCache;
