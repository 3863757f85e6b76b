//! Trust harness - end-to-end tests for a trust-management CLI
//!
//! This library drives an external trust client through multi-step
//! workflows and checks that independent clients agree on the signed state.

pub mod cli;
pub mod client;
pub mod commands;
pub mod common;
pub mod readiness;
pub mod testing;

// Re-export commonly used types for tests
pub use client::{CommandInvocation, CommandRunner, ServerMode};
pub use common::{Error, Result};
pub use testing::{RepoIdentity, Scenario, ScenarioRunner};
