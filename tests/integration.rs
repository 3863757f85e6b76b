//! End-to-end integration tests for the trust harness
//!
//! These tests run the real command runner and scenario runner against the
//! `mock_trust_client` binary, which keeps its "server" in a temporary
//! directory. They verify:
//! 1. Process plumbing: stdin sequencing, environment, output capture, exit codes
//! 2. The scenarios pass against a consistent server
//! 3. Failures propagate and temporary state is cleaned up

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use trust_harness::client::{CommandInvocation, CommandRunner, Credentials, ServerMode};
use trust_harness::common::config::{ClientConfig, SigningPassphrases};
use trust_harness::testing::{
    KeyListing, RepoIdentity, RootMetadataSnapshot, Scenario, ScenarioRunner, TargetListing,
    TrustClient, BASIC_TARGET, ROTATION_TARGET, TARGETS_ROLE,
};
use trust_harness::Error;

/// Test context: a server directory for the mock client
struct TestContext {
    server_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            server_dir: tempfile::tempdir().expect("Failed to create server dir"),
        }
    }

    fn mode(&self) -> ServerMode {
        ServerMode::Remote(format!("file://{}", self.server_dir.path().display()))
    }

    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            binary: mock_binary(),
            local_config: PathBuf::from("config.json"),
        }
    }

    fn runner(&self) -> CommandRunner {
        CommandRunner::new(&self.client_config(), self.mode(), SigningPassphrases::default())
            .expect("Failed to create runner")
            .quiet()
    }

    /// Serve an empty target listing to clients whose trust directory
    /// name ends with `suffix`
    fn serve_stale_listing_to(&self, suffix: &str) {
        std::fs::write(self.server_dir.path().join("stale_suffix"), suffix)
            .expect("Failed to write stale suffix");
    }

    /// Require a login for server operations
    fn require_login(&self, username: &str, password: &str) {
        std::fs::write(
            self.server_dir.path().join("login.json"),
            format!(r#"{{"username": "{username}", "password": "{password}"}}"#),
        )
        .expect("Failed to write login");
    }
}

fn mock_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mock_trust_client"))
}

fn debug_invocation(args: &[&str]) -> CommandInvocation {
    let mut full = vec!["debug"];
    full.extend_from_slice(args);
    CommandInvocation::new(Path::new("/nonexistent-trust-dir"), full)
}

fn credentials(password: &str) -> Credentials {
    Credentials {
        username: "alice".to_string(),
        password: password.to_string(),
    }
}

// ============================================================================
// Command runner plumbing
// ============================================================================

#[tokio::test]
async fn test_stdin_payload_alone_has_no_newline() {
    let ctx = TestContext::new();
    let output = ctx
        .runner()
        .invoke(debug_invocation(&["stdin"]).with_payload("yes"))
        .await
        .unwrap();
    assert_eq!(output, "yes");
}

#[tokio::test]
async fn test_stdin_payload_then_credentials() {
    let ctx = TestContext::new();
    let runner = ctx.runner().with_credentials(credentials("pw"));

    let output = runner
        .invoke(debug_invocation(&["stdin"]).with_payload("yes"))
        .await
        .unwrap();
    assert_eq!(output, "yes\nalice\npw\n");

    let output = runner.invoke(debug_invocation(&["stdin"])).await.unwrap();
    assert_eq!(output, "alice\npw\n");
}

#[tokio::test]
async fn test_offline_invocation_sends_no_credentials() {
    let ctx = TestContext::new();
    let runner = ctx.runner().with_credentials(credentials("pw"));

    let output = runner
        .invoke(debug_invocation(&["stdin"]).with_payload("data").offline())
        .await
        .unwrap();
    assert_eq!(output, "data");

    let output = runner
        .invoke(debug_invocation(&["stdin"]).offline())
        .await
        .unwrap();
    assert_eq!(output, "");
}

#[tokio::test]
async fn test_passphrases_reach_the_client() {
    let ctx = TestContext::new();
    let runner = ctx.runner();

    let root = runner
        .invoke(debug_invocation(&["env", "NOTARY_ROOT_PASSPHRASE"]))
        .await
        .unwrap();
    assert_eq!(root, "root_ponies");

    let delegation = runner
        .invoke(debug_invocation(&["env", "NOTARY_DELEGATION_PASSPHRASE"]))
        .await
        .unwrap();
    assert_eq!(delegation, "user_ponies");

    let overridden = runner
        .invoke(
            debug_invocation(&["env", "NOTARY_ROOT_PASSPHRASE"])
                .with_env("NOTARY_ROOT_PASSPHRASE", "other"),
        )
        .await
        .unwrap();
    assert_eq!(overridden, "other");
}

#[tokio::test]
async fn test_custom_passphrases_replace_defaults() {
    let ctx = TestContext::new();
    let passphrases = SigningPassphrases {
        snapshot: "custom_snapshot".to_string(),
        ..SigningPassphrases::default()
    };
    let runner = CommandRunner::new(&ctx.client_config(), ctx.mode(), passphrases)
        .unwrap()
        .quiet();

    let output = runner
        .invoke(debug_invocation(&["env", "NOTARY_SNAPSHOT_PASSPHRASE"]))
        .await
        .unwrap();
    assert_eq!(output, "custom_snapshot");
}

#[tokio::test]
async fn test_non_zero_exit_carries_code_and_output() {
    let ctx = TestContext::new();
    let err = ctx
        .runner()
        .invoke(debug_invocation(&["exit", "3", "partial", "output"]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NonZeroExit { .. }));
    assert_eq!(err.exit_code(), Some(3));
    assert_eq!(err.captured_stdout(), Some("partial output"));
}

#[tokio::test]
async fn test_non_zero_exit_without_output() {
    let ctx = TestContext::new();
    let err = ctx
        .runner()
        .invoke(debug_invocation(&["exit", "2"]))
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), Some(2));
    assert_eq!(err.captured_stdout(), Some(""));
}

#[tokio::test]
async fn test_silent_success_returns_empty_output() {
    let ctx = TestContext::new();
    let result = ctx
        .runner()
        .execute(debug_invocation(&["exit", "0"]))
        .await
        .unwrap();
    assert!(result.success());
    assert_eq!(result.stdout, "");
}

#[tokio::test]
async fn test_large_output_is_captured_completely() {
    let ctx = TestContext::new();
    let size = 1024 * 1024;
    let output = ctx
        .runner()
        .invoke(debug_invocation(&["flood", &size.to_string()]).with_payload("abc"))
        .await
        .unwrap();

    assert_eq!(output.len(), size + "\nstdin=3".len());
    assert!(output.ends_with("\nstdin=3"));
}

#[tokio::test]
async fn test_global_flags_for_each_mode() {
    let ctx = TestContext::new();
    let trust_dir = TrustClient::secondary().unwrap();

    let remote = ctx
        .runner()
        .invoke(trust_dir.command(["debug", "globals"]))
        .await
        .unwrap();
    assert_eq!(
        remote.trim(),
        format!(
            "server=file://{} local=false config=- dir={}",
            ctx.server_dir.path().display(),
            trust_dir.path().display()
        )
    );

    let local = CommandRunner::new(
        &ctx.client_config(),
        ServerMode::Local,
        SigningPassphrases::default(),
    )
    .unwrap()
    .quiet()
    .invoke(trust_dir.command(["debug", "globals"]))
    .await
    .unwrap();
    assert_eq!(
        local.trim(),
        format!(
            "server=- local=true config=config.json dir={}",
            trust_dir.path().display()
        )
    );
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_all_scenarios_pass_and_clean_up() {
    let ctx = TestContext::new();
    let runner = ScenarioRunner::new(ctx.runner(), RepoIdentity::new("demo")).unwrap();
    let primary = runner.primary().path().to_path_buf();

    let summary = runner.run_all(&Scenario::ALL).await.unwrap();

    assert_eq!(
        summary.passed,
        vec!["basic_repo_test", "root_rotation_test", "root_rerotation_test"]
    );
    assert!(!primary.exists(), "primary trust directory left behind");
}

#[tokio::test]
async fn test_basic_scenario_is_visible_to_fresh_clients() {
    let ctx = TestContext::new();
    let repo = "demo";
    ScenarioRunner::new(ctx.runner(), RepoIdentity::new(repo))
        .unwrap()
        .run_all(&[Scenario::BasicRepo])
        .await
        .unwrap();

    // Two clients that never saw the publish
    let runner = ctx.runner();
    let first = TrustClient::create("first").unwrap();
    let second = TrustClient::create("second").unwrap();
    let a = runner.invoke(first.command(["list", repo])).await.unwrap();
    let b = runner.invoke(second.command(["list", repo])).await.unwrap();
    assert_eq!(a, b);

    let listing = TargetListing::parse(&a);
    let targets: Vec<_> = listing
        .entries()
        .iter()
        .filter(|entry| entry.role == TARGETS_ROLE)
        .collect();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].name, BASIC_TARGET);

    // Content matches a file holding exactly the scenario name
    let payload = first.path().join("payload");
    std::fs::write(&payload, BASIC_TARGET).unwrap();
    let payload = payload.display().to_string();
    runner
        .invoke(
            first
                .command(["verify", repo, BASIC_TARGET, "-i", payload.as_str(), "-q"])
                .offline(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rotation_grows_keys_and_keeps_single_root() {
    let ctx = TestContext::new();
    let observer = TrustClient::create("observer").unwrap();
    let runner = ctx.runner();

    ScenarioRunner::new(ctx.runner(), RepoIdentity::new("basic-only"))
        .unwrap()
        .run_all(&[Scenario::BasicRepo])
        .await
        .unwrap();
    ScenarioRunner::new(ctx.runner(), RepoIdentity::new("rotated"))
        .unwrap()
        .run_all(&Scenario::ALL)
        .await
        .unwrap();

    runner.invoke(observer.command(["list", "basic-only"])).await.unwrap();
    let listing = TargetListing::parse(
        &runner.invoke(observer.command(["list", "rotated"])).await.unwrap(),
    );
    let before = RootMetadataSnapshot::load(observer.path(), "basic-only").unwrap();
    let after = RootMetadataSnapshot::load(observer.path(), "rotated").unwrap();

    assert_eq!(before.trusted_keys("root").len(), 1);
    assert_eq!(after.trusted_keys("root").len(), 1);
    // init creates four keys; each root rotation adds one
    assert_eq!(before.key_count(), 4);
    assert_eq!(after.key_count(), 6);

    assert_eq!(listing.count(ROTATION_TARGET, TARGETS_ROLE), 1);
    assert_eq!(listing.count(BASIC_TARGET, TARGETS_ROLE), 1);
}

#[tokio::test]
async fn test_rotation_without_repository_fails() {
    let ctx = TestContext::new();
    let runner = ScenarioRunner::new(ctx.runner(), RepoIdentity::new("missing")).unwrap();
    let primary = runner.primary().path().to_path_buf();

    let err = runner
        .run_all(&[Scenario::RootRotation])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::NonZeroExit { .. }), "got {err:?}");
    assert_eq!(err.exit_code(), Some(1));
    assert!(!primary.exists(), "primary trust directory left behind");
}

#[tokio::test]
async fn test_diverging_listings_fail_the_basic_scenario() {
    let ctx = TestContext::new();
    ctx.serve_stale_listing_to("_temp");
    let runner = ScenarioRunner::new(ctx.runner(), RepoIdentity::new("diverged")).unwrap();
    let primary = runner.primary().path().to_path_buf();

    let err = runner
        .run_all(&[Scenario::BasicRepo, Scenario::RootRotation])
        .await
        .unwrap_err();

    match &err {
        Error::TestAssertion(message) => {
            assert!(message.contains("targets lists not equal"), "got {message}");
            assert!(message.contains(BASIC_TARGET), "got {message}");
        }
        other => panic!("Expected TestAssertion, got {other:?}"),
    }
    assert!(!primary.exists(), "primary trust directory left behind");
}

#[tokio::test]
async fn test_scenarios_with_login() {
    let ctx = TestContext::new();
    ctx.require_login("alice", "secret");

    let runner = ctx.runner().with_credentials(credentials("secret"));
    let summary = ScenarioRunner::new(runner, RepoIdentity::new("quay.io/alice/repo"))
        .unwrap()
        .run_all(&Scenario::ALL)
        .await
        .unwrap();
    assert_eq!(summary.passed.len(), 3);
}

#[tokio::test]
async fn test_wrong_password_fails_first_step() {
    let ctx = TestContext::new();
    ctx.require_login("alice", "secret");

    let runner = ctx.runner().with_credentials(credentials("wrong"));
    let summary = ScenarioRunner::new(runner, RepoIdentity::new("demo"))
        .unwrap()
        .run_all(&Scenario::ALL)
        .await;
    assert_eq!(summary.unwrap_err().exit_code(), Some(1));
}

#[tokio::test]
async fn test_local_mode_uses_embedded_config() {
    let ctx = TestContext::new();
    let config_dir = tempfile::tempdir().unwrap();
    let config_path = config_dir.path().join("config.json");
    std::fs::write(
        &config_path,
        serde_json::json!({ "storage": ctx.server_dir.path() }).to_string(),
    )
    .unwrap();

    let client = ClientConfig {
        binary: mock_binary(),
        local_config: config_path,
    };
    let runner = CommandRunner::new(&client, ServerMode::Local, SigningPassphrases::default())
        .unwrap()
        .quiet();

    let summary = ScenarioRunner::new(runner, RepoIdentity::new("local-demo"))
        .unwrap()
        .run_all(&[Scenario::BasicRepo, Scenario::RootRotation])
        .await
        .unwrap();
    assert_eq!(summary.passed, vec!["basic_repo_test", "root_rotation_test"]);

    // The run's data landed in the configured storage
    assert!(ctx.server_dir.path().join("local-demo.json").exists());
}

#[tokio::test]
async fn test_key_listing_from_client_output() {
    let ctx = TestContext::new();
    let runner = ctx.runner();
    let client = TrustClient::primary().unwrap();

    runner.invoke(client.command(["init", "keys"])).await.unwrap();
    let keys = KeyListing::parse(&runner.invoke(client.command(["key", "list"])).await.unwrap());

    assert_eq!(keys.root_entries().len(), 1);
    assert_eq!(keys.for_role("targets").count(), 1);
    assert_eq!(keys.for_role("snapshot").count(), 1);

    runner
        .invoke(client.command(["key", "rotate", "keys", "snapshot", "-r"]))
        .await
        .unwrap();
    let keys = KeyListing::parse(&runner.invoke(client.command(["key", "list"])).await.unwrap());
    assert_eq!(keys.for_role("snapshot").count(), 0);
}

#[tokio::test]
async fn test_root_rotation_needs_confirmation() {
    let ctx = TestContext::new();
    let runner = ctx.runner();
    let client = TrustClient::primary().unwrap();
    runner.invoke(client.command(["init", "confirm"])).await.unwrap();

    let err = runner
        .invoke(client.command(["key", "rotate", "confirm", "root"]).with_payload("no"))
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), Some(1));

    runner
        .invoke(client.command(["key", "rotate", "confirm", "root"]).with_payload("yes"))
        .await
        .unwrap();
}
