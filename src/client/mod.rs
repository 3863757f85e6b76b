//! Trust client invocation
//!
//! Everything the harness knows about running the external trust client:
//! how a command line is composed, what goes to its stdin and how its
//! output and exit status come back.

mod invocation;
mod runner;

pub use invocation::{CommandInvocation, CredentialMode, Credentials, PromptSegment, StdinPlan};
pub use runner::{CommandRunner, ProcessResult, ServerMode};
