//! Configuration and metadata paths

use std::path::{Path, PathBuf};

/// Name used for the platform config directory
const APP_NAME: &str = "trust-harness";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/trust-harness/`
/// - macOS: `~/Library/Application Support/trust-harness/`
/// - Windows: `%APPDATA%\trust-harness\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Location of the cached root metadata for a repository inside a trust directory
///
/// Repository names with `/` separators map onto nested directories, the same
/// way the trust client lays out its cache.
pub fn root_metadata_path(trust_dir: &Path, repo: &str) -> PathBuf {
    trust_dir
        .join("tuf")
        .join(repo)
        .join("metadata")
        .join("root.json")
}
