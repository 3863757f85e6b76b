//! Error types for the trust harness
//!
//! Every failure is fatal for the run. Messages carry enough context
//! (command line, captured output, compared values) to diagnose a failed
//! scenario from the log alone.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Subprocess Errors ===
    #[error("Command `{command}` exited with {}\n{stdout}", describe_exit(*code))]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stdout: String,
    },

    #[error("Trust client binary '{name}' not found in PATH")]
    BinaryNotFound { name: String },

    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    // === Readiness Errors ===
    #[error("Could not connect to {server} after {timeout_secs} seconds")]
    ServerUnreachable { server: String, timeout_secs: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === Scenario Errors ===
    #[error("Test assertion failed: {0}")]
    TestAssertion(String),

    #[error("Failed to read trust metadata '{path}': {error}")]
    MetadataRead { path: String, error: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl Error {
    /// Create a non-zero exit error from a finished invocation
    pub fn non_zero_exit(command: &str, code: Option<i32>, stdout: &str) -> Self {
        Self::NonZeroExit {
            command: command.to_string(),
            code,
            stdout: stdout.to_string(),
        }
    }

    /// Create a server unreachable error
    pub fn server_unreachable(server: &str, timeout_secs: u64) -> Self {
        Self::ServerUnreachable {
            server: server.to_string(),
            timeout_secs,
        }
    }

    /// Create an assertion failure
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::TestAssertion(message.into())
    }

    /// Exit code of a failed subprocess, if this error came from one
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::NonZeroExit { code, .. } => *code,
            _ => None,
        }
    }

    /// Output captured from a failed subprocess, if this error came from one
    pub fn captured_stdout(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { stdout, .. } => Some(stdout),
            _ => None,
        }
    }
}
