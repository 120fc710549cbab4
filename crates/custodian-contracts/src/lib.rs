//! # custodian-contracts
//!
//! Shared types, rule schema, and error contracts for the custodian approval
//! engine.
//!
//! All crates in the workspace import from here. No evaluation logic lives in
//! this crate, only data definitions and error types.

pub mod error;
pub mod outcome;
pub mod review;
pub mod rule;
pub mod run;
