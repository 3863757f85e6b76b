//! End-to-end scenarios
//!
//! Drives the trust client through multi-step workflows from two
//! independent trust directories and asserts on the signed state they end
//! up with. Assertions are made against parsed listings and the cached root
//! metadata rather than raw output wherever the output has structure.

mod metadata;
mod rotation;
mod scenario;
mod trust_dir;

pub use metadata::{
    KeyEntry, KeyListing, RootMetadataSnapshot, TargetEntry, TargetListing, ROOT_ROLE,
    TARGETS_ROLE,
};
pub use rotation::{verify_rotation, RootState, RotationStage};
pub use scenario::{
    RepoIdentity, RunSummary, Scenario, ScenarioContext, ScenarioRunner, BASIC_TARGET,
    ROTATION_TARGET,
};
pub use trust_dir::TrustClient;
