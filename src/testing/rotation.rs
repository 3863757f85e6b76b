//! Root key rotation scenarios
//!
//! Every rotation is checked from the secondary client's cached root
//! metadata: the key set grows by exactly one, one root key stays trusted,
//! and that key changes. Any failed check aborts the scenario at the stage
//! it happened.

use std::collections::BTreeSet;
use std::fmt;

use crate::common::{Error, Result};

use super::metadata::{RootMetadataSnapshot, TARGETS_ROLE};
use super::scenario::{section, ScenarioContext, ScenarioRunner, BASIC_TARGET, ROTATION_TARGET};
use super::trust_dir::TrustClient;

/// Confirmation the client asks for before rotating root
const ROOT_ROTATION_CONFIRMATION: &str = "yes";

/// Progress through a rotation scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationStage {
    Start,
    KeysEnumerated,
    RootRotationRequested,
    RootRotationConfirmed,
    MetadataReloaded,
    Verified,
    Continuation,
}

impl fmt::Display for RotationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::KeysEnumerated => "keys-enumerated",
            Self::RootRotationRequested => "root-rotation-requested",
            Self::RootRotationConfirmed => "root-rotation-confirmed",
            Self::MetadataReloaded => "metadata-reloaded",
            Self::Verified => "verified",
            Self::Continuation => "continuation",
        };
        f.write_str(name)
    }
}

impl RotationStage {
    /// Prefix assertion failures with the stage they happened in
    fn annotate<T>(self, result: Result<T>) -> Result<T> {
        result.map_err(|e| match e {
            Error::TestAssertion(message) => Error::TestAssertion(format!("[{self}] {message}")),
            other => other,
        })
    }
}

/// What a root snapshot says about the root of trust
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootState {
    pub key_count: usize,
    pub root_key: String,
}

impl RootState {
    /// Capture the state, requiring exactly one trusted root key
    pub fn capture(snapshot: &RootMetadataSnapshot) -> Result<Self> {
        Ok(Self {
            key_count: snapshot.key_count(),
            root_key: snapshot.single_root_key()?.to_string(),
        })
    }
}

/// Check a snapshot taken after one root rotation against the state before it
///
/// `previously_trusted` holds every root key trusted earlier in the run; the
/// new root key must not be one of them.
pub fn verify_rotation(
    before: &RootState,
    after: &RootMetadataSnapshot,
    previously_trusted: &BTreeSet<String>,
) -> Result<RootState> {
    let expected = before.key_count + 1;
    if after.key_count() != expected {
        return Err(Error::assertion(format!(
            "expected {} base keys, but got {}",
            expected,
            after.key_count()
        )));
    }

    let state = RootState::capture(after)?;
    if state.root_key == before.root_key {
        return Err(Error::assertion(format!(
            "root key has not been rotated: still {}",
            state.root_key
        )));
    }
    if previously_trusted.contains(&state.root_key) {
        return Err(Error::assertion(format!(
            "root key {} was trusted before and has been reused",
            state.root_key
        )));
    }
    Ok(state)
}

impl ScenarioRunner {
    /// Test root rotation
    pub(super) async fn root_rotation_test(&mut self, ctx: &ScenarioContext<'_>) -> Result<()> {
        let repo = self.repo.as_str().to_string();

        let mut stage = RotationStage::Start;
        enter(stage);
        self.invoke(self.primary.command(["key", "rotate", repo.as_str(), "snapshot", "-r"]))
            .await?;

        stage = RotationStage::KeysEnumerated;
        enter(stage);
        section("Figuring out what the old keys are");
        self.list_targets(ctx.secondary).await?;
        let keys = self.key_list(&self.primary).await?;
        let original_root = stage.annotate(keys.single_root_entry())?.line.clone();
        let before = self.root_state(ctx.secondary, stage)?;
        self.history.root_key_rows.insert(original_root);
        self.history.trusted_root_keys.insert(before.root_key.clone());

        self.rotate_root(ctx, &before).await?;

        stage = RotationStage::Continuation;
        enter(stage);
        section("Ensuring we can still publish");
        self.publish(ctx.secondary).await?;
        let payload = ctx.payload.display().to_string();
        self.invoke(self.primary.command([
            "add",
            repo.as_str(),
            ROTATION_TARGET,
            payload.as_str(),
        ]))
        .await?;
        self.publish(&self.primary).await?;

        let listing = stage.annotate(self.list_consistent(ctx.secondary).await)?;
        let found = listing.count(ROTATION_TARGET, TARGETS_ROLE);
        if found != 1 {
            return stage.annotate(Err(Error::assertion(format!(
                "expected {} once in the {} role, found {}: {:?}",
                ROTATION_TARGET,
                TARGETS_ROLE,
                found,
                listing.as_set()
            ))));
        }
        Ok(())
    }

    /// Rotate root a further time on top of earlier rotations
    pub(super) async fn root_rerotation_test(&mut self, ctx: &ScenarioContext<'_>) -> Result<()> {
        let mut stage = RotationStage::KeysEnumerated;
        enter(stage);
        section("Recording the current root keys");
        self.list_targets(ctx.secondary).await?;
        let keys = self.key_list(&self.primary).await?;
        let roots = keys.root_entries();
        if roots.is_empty() {
            return stage.annotate(Err(Error::assertion("no root key in key list")));
        }
        let rows: Vec<String> = roots.iter().map(|entry| entry.line.clone()).collect();
        self.history.root_key_rows.extend(rows);
        let before = self.root_state(ctx.secondary, stage)?;
        self.history.trusted_root_keys.insert(before.root_key.clone());

        self.rotate_root(ctx, &before).await?;

        stage = RotationStage::Continuation;
        enter(stage);
        section("Ensuring both clients still publish and agree");
        self.publish(ctx.secondary).await?;
        self.publish(&self.primary).await?;
        let listing = stage.annotate(self.list_consistent(ctx.secondary).await)?;
        if !listing.contains(BASIC_TARGET) {
            return stage.annotate(Err(Error::assertion(format!(
                "missing expected {} after rotation: {:?}",
                BASIC_TARGET,
                listing.as_set()
            ))));
        }
        Ok(())
    }

    /// Rotate the root key and verify the result from the secondary client
    ///
    /// Expects the history to already hold the current root rows and key.
    async fn rotate_root(
        &mut self,
        ctx: &ScenarioContext<'_>,
        before: &RootState,
    ) -> Result<RootState> {
        let repo = self.repo.as_str().to_string();

        let mut stage = RotationStage::RootRotationRequested;
        enter(stage);
        section("Rotating root key");
        let request = self
            .primary
            .command(["key", "rotate", repo.as_str(), "root"])
            .with_payload(ROOT_ROTATION_CONFIRMATION);
        self.invoke(request).await?;
        stage = RotationStage::RootRotationConfirmed;
        enter(stage);

        stage = RotationStage::MetadataReloaded;
        enter(stage);
        let keys = self.key_list(&self.primary).await?;
        let fresh: Vec<String> = keys
            .new_root_entries(&self.history.root_key_rows)
            .iter()
            .map(|entry| entry.line.clone())
            .collect();
        if fresh.len() != 1 {
            return stage.annotate(Err(Error::assertion(format!(
                "expected exactly 1 new root key in key list, got {}: {:?}",
                fresh.len(),
                fresh
            ))));
        }

        stage = RotationStage::Verified;
        enter(stage);
        self.list_targets(ctx.secondary).await?;
        let after = self.snapshot(ctx.secondary)?;
        let state = stage.annotate(verify_rotation(
            before,
            &after,
            &self.history.trusted_root_keys,
        ))?;

        tracing::info!(
            old_root = %before.root_key,
            new_root = %state.root_key,
            keys = state.key_count,
            "root key rotated"
        );
        self.history.root_key_rows.extend(fresh);
        self.history
            .trusted_root_keys
            .insert(state.root_key.clone());
        Ok(state)
    }

    fn snapshot(&self, client: &TrustClient) -> Result<RootMetadataSnapshot> {
        RootMetadataSnapshot::load(client.path(), self.repo.as_str())
    }

    fn root_state(&self, client: &TrustClient, stage: RotationStage) -> Result<RootState> {
        let snapshot = self.snapshot(client)?;
        stage.annotate(RootState::capture(&snapshot))
    }
}

fn enter(stage: RotationStage) {
    tracing::info!(stage = %stage, "rotation stage");
}
