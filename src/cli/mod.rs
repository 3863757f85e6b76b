//! Top-level wiring
//!
//! Turns the parsed arguments and config file into a command runner, waits
//! for the server and hands over to the scenario runner.

mod password;

use std::time::Duration;

use colored::Colorize;

use crate::client::{CommandRunner, Credentials, ServerMode};
use crate::commands::HarnessArgs;
use crate::common::config::Config;
use crate::common::Result;
use crate::readiness::{HttpHealthCheck, ReadinessProbe};
use crate::testing::{RepoIdentity, RunSummary, Scenario, ScenarioRunner};

/// Per-request limit for a single health probe
const PROBE_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Resolve the effective configuration: file first, then flag overrides
pub fn resolve_config(args: &HarnessArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(binary) = &args.binary {
        config.client.binary = binary.clone();
    }
    if let Some(timeout) = args.timeout {
        config.readiness.timeout_secs = timeout;
    }
    Ok(config)
}

/// Repository name from the arguments, or a random one
pub fn resolve_repo(reponame: Option<&str>) -> RepoIdentity {
    reponame
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(RepoIdentity::new)
        .unwrap_or_else(RepoIdentity::random)
}

/// Run the harness end to end
pub async fn run(args: HarnessArgs) -> Result<RunSummary> {
    let config = resolve_config(&args)?;
    let scenarios = Scenario::select(&args.scenarios)?;
    let repo = resolve_repo(args.reponame.as_deref());
    let mode = ServerMode::from_arg(args.server.as_deref(), &config.readiness.default_server);

    tracing::info!(
        repo = %repo,
        server = %mode,
        binary = %config.client.binary.display(),
        "configured"
    );

    if mode.is_local() {
        tracing::info!(
            config = %config.client.local_config.display(),
            "using the client's local configuration"
        );
    }

    let mut runner = CommandRunner::new(&config.client, mode, config.passphrases.clone())?;

    let username = args
        .username
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    if let Some(username) = username {
        let password = password::prompt(&format!("password to server for user {}: ", username))?;
        runner = runner.with_credentials(Credentials {
            username: username.to_string(),
            password,
        });
    }

    if args.skip_wait {
        tracing::warn!("skipping server readiness wait");
    } else {
        let check = HttpHealthCheck::new(Duration::from_secs(PROBE_REQUEST_TIMEOUT_SECS))?;
        ReadinessProbe::new(check, config.readiness.clone())
            .wait(runner.mode())
            .await?;
    }

    let summary = ScenarioRunner::new(runner, repo)?
        .run_all(&scenarios)
        .await?;

    println!(
        "{} {} scenario(s) passed: {}",
        "✓".green().bold(),
        summary.passed.len(),
        summary.passed.join(", ")
    );
    Ok(summary)
}
