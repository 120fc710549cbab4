//! # custodian-policy
//!
//! A TOML-driven approval policy for change requests.
//!
//! ## Overview
//!
//! This crate provides [`TomlPolicyLoader`], which implements the
//! [`PolicyLoader`](custodian_core::traits::PolicyLoader) trait, and the
//! [`CompiledPolicy`] it produces. Rules are declared in a TOML document,
//! validated up front, and evaluated in declaration order by the runner.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use custodian_policy::TomlPolicyLoader;
//!
//! let runner = Runner::new(Box::new(TomlPolicyLoader::new()), platform, sink, settings);
//! ```
//!
//! ## Rule shapes
//!
//! A rule with `min_approvals` is a Basic rule. A rule with `any = [...]` is
//! satisfied by any one of its criteria, and a rule with `all = [...]` needs
//! every criterion. Conditions are regular expressions matched against the
//! diff (`check_type = "diff"`) or the changed paths
//! (`check_type = "changed_files"`).

pub mod builtin;
pub mod condition;
pub mod config;
pub mod engine;
pub mod evaluate;

pub use condition::CompiledCondition;
pub use config::{RawCondition, RawCriterion, RawRule};
pub use engine::{CompiledPolicy, TomlPolicyLoader};

// ── Tests ─────────────────────────────────────────────────────────────────────
