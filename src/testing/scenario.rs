//! Scenario runner
//!
//! Runs the scenarios in their declared order against one repository. Later
//! scenarios depend on the state earlier ones leave behind, so the first
//! failure stops the run.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use colored::Colorize;
use tempfile::NamedTempFile;

use crate::client::{CommandInvocation, CommandRunner};
use crate::common::{Error, Result};

use super::metadata::{KeyListing, TargetListing};
use super::trust_dir::TrustClient;

/// Target added by the basic scenario
pub const BASIC_TARGET: &str = "basic_repo_test";
/// Target added after root rotation
pub const ROTATION_TARGET: &str = "root_rotation_test_targets_add";

/// Name of the repository under test, fixed for the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoIdentity(String);

impl RepoIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// A random name, for runs against a server without fixed repositories
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepoIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The scenarios, in the order they must run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Publish a target and read it back from a second client
    BasicRepo,
    /// Rotate the snapshot key, then the root key, and keep publishing
    RootRotation,
    /// Rotate the root key again; keys must keep growing with no reuse
    RootRerotation,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [
        Scenario::BasicRepo,
        Scenario::RootRotation,
        Scenario::RootRerotation,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::BasicRepo => "basic_repo_test",
            Self::RootRotation => "root_rotation_test",
            Self::RootRerotation => "root_rerotation_test",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::BasicRepo => "Initialize a repo, add a target, ensure the target is readable",
            Self::RootRotation => "Rotate snapshot and root keys, then publish from both clients",
            Self::RootRerotation => "Rotate root again and check the key set keeps growing",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }

    /// Resolve scenario names, keeping the declared order
    ///
    /// An empty selection means every scenario.
    pub fn select(names: &[String]) -> Result<Vec<Scenario>> {
        if names.is_empty() {
            return Ok(Self::ALL.to_vec());
        }
        let mut wanted = BTreeSet::new();
        for name in names {
            let scenario = Self::from_name(name).ok_or_else(|| {
                Error::Config(format!(
                    "Unknown scenario '{}'. Available: {}",
                    name,
                    Self::ALL.map(|s| s.name()).join(", ")
                ))
            })?;
            wanted.insert(scenario.name());
        }
        Ok(Self::ALL
            .into_iter()
            .filter(|s| wanted.contains(s.name()))
            .collect())
    }
}

/// Per-scenario resources
pub struct ScenarioContext<'a> {
    /// File whose content is the scenario's name
    pub payload: &'a Path,
    /// Client provisioned fresh for this scenario
    pub secondary: &'a TrustClient,
}

/// Root keys observed across rotations, shared between scenarios
#[derive(Debug, Default)]
pub(super) struct RotationHistory {
    /// Every root key id that has been trusted so far
    pub trusted_root_keys: BTreeSet<String>,
    /// Every root row seen in the primary client's key list
    pub root_key_rows: BTreeSet<String>,
}

/// Outcome of a completed run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub passed: Vec<&'static str>,
}

/// Sequences the scenarios against one repository
pub struct ScenarioRunner {
    pub(super) runner: CommandRunner,
    pub(super) repo: RepoIdentity,
    pub(super) primary: TrustClient,
    pub(super) history: RotationHistory,
}

impl ScenarioRunner {
    /// Create the runner and its long-lived primary client
    pub fn new(runner: CommandRunner, repo: RepoIdentity) -> Result<Self> {
        Ok(Self {
            runner,
            repo,
            primary: TrustClient::primary()?,
            history: RotationHistory::default(),
        })
    }

    pub fn primary(&self) -> &TrustClient {
        &self.primary
    }

    /// Run the scenarios in order, stopping at the first failure
    ///
    /// The primary trust directory is removed whatever the outcome.
    pub async fn run_all(mut self, scenarios: &[Scenario]) -> Result<RunSummary> {
        tracing::info!(
            repo = %self.repo,
            primary = %self.primary.path().display(),
            count = scenarios.len(),
            "starting scenarios"
        );

        let mut summary = RunSummary::default();
        let mut outcome = Ok(());
        for scenario in scenarios {
            if let Err(e) = self.run_scenario(*scenario).await {
                println!("  {} {}: {}", "✗".red(), scenario.name(), e);
                outcome = Err(e);
                break;
            }
            summary.passed.push(scenario.name());
        }

        let cleanup = self.primary.remove();
        outcome?;
        cleanup?;
        Ok(summary)
    }

    async fn run_scenario(&mut self, scenario: Scenario) -> Result<()> {
        println!(
            "\n{} {}",
            "Running Test:".blue().bold(),
            scenario.name().white().bold()
        );
        println!("  {}", scenario.description().dimmed());

        let payload = write_payload(scenario.name())?;
        let secondary = TrustClient::secondary()?;
        tracing::info!(
            scenario = scenario.name(),
            secondary = %secondary.path().display(),
            "scenario started"
        );

        let ctx = ScenarioContext {
            payload: payload.path(),
            secondary: &secondary,
        };
        let result = match scenario {
            Scenario::BasicRepo => self.basic_repo_test(&ctx).await,
            Scenario::RootRotation => self.root_rotation_test(&ctx).await,
            Scenario::RootRerotation => self.root_rerotation_test(&ctx).await,
        };

        let cleanup = remove_payload(payload).and(secondary.remove());
        result?;
        cleanup?;

        tracing::info!(scenario = scenario.name(), "scenario passed");
        println!("\n{} {}\n", "✓".green().bold(), "Test Passed".green().bold());
        Ok(())
    }

    /// Initialize a repo, add a target, ensure the target is readable
    async fn basic_repo_test(&self, ctx: &ScenarioContext<'_>) -> Result<()> {
        let repo = self.repo.as_str();
        let payload = ctx.payload.display().to_string();

        section("Initializing a repo, adding a target, and pushing");
        self.invoke(self.primary.command(["init", repo])).await?;
        self.invoke(self.primary.command(["add", repo, BASIC_TARGET, payload.as_str()]))
            .await?;
        self.publish(&self.primary).await?;

        section("Listing and validating basic repo test targets");
        let listing = self.list_consistent(ctx.secondary).await?;
        if !listing.contains(BASIC_TARGET) {
            return Err(Error::assertion(format!(
                "missing expected {}: {:?}",
                BASIC_TARGET,
                listing.as_set()
            )));
        }

        // offline operation: no credentials
        self.invoke(
            self.primary
                .command(["verify", repo, BASIC_TARGET, "-i", payload.as_str(), "-q"])
                .offline(),
        )
        .await?;
        Ok(())
    }

    pub(super) async fn invoke(&self, invocation: CommandInvocation) -> Result<String> {
        self.runner.invoke(invocation).await
    }

    pub(super) async fn publish(&self, client: &TrustClient) -> Result<()> {
        self.invoke(client.command(["publish", self.repo.as_str()]))
            .await
            .map(|_| ())
    }

    /// List targets from `client`, which also refreshes its metadata cache
    pub(super) async fn list_targets(&self, client: &TrustClient) -> Result<String> {
        self.invoke(client.command(["list", self.repo.as_str()]))
            .await
    }

    pub(super) async fn key_list(&self, client: &TrustClient) -> Result<KeyListing> {
        let output = self.invoke(client.command(["key", "list"])).await?;
        Ok(KeyListing::parse(&output))
    }

    /// List targets from the primary and `other`; both must print the same listing
    pub(super) async fn list_consistent(&self, other: &TrustClient) -> Result<TargetListing> {
        let primary = self.list_targets(&self.primary).await?;
        let secondary = self.list_targets(other).await?;
        consistent_listing(&primary, &secondary)
    }
}

/// Parse the primary's listing once it matches the secondary's byte for byte
fn consistent_listing(primary: &str, secondary: &str) -> Result<TargetListing> {
    if primary != secondary {
        return Err(Error::assertion(format!(
            "targets lists not equal: \n{}\n{}",
            primary, secondary
        )));
    }
    Ok(TargetListing::parse(primary))
}

pub(super) fn section(title: &str) {
    println!("\n{}", format!("---- {} ----", title).cyan());
}

fn write_payload(content: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn remove_payload(file: NamedTempFile) -> Result<()> {
    match file.close() {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}
