//! Parsed views of trust client state
//!
//! Root metadata is read straight from a trust directory's cache. Key and
//! target listings are parsed from the client's tabular output, one row per
//! line.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;

use crate::common::paths::root_metadata_path;
use crate::common::{Error, Result};

/// Role name of the root of trust
pub const ROOT_ROLE: &str = "root";
/// Role that signs ordinary targets
pub const TARGETS_ROLE: &str = "targets";

#[derive(Debug, Deserialize)]
struct RootDocument {
    signed: SignedRoot,
}

#[derive(Debug, Deserialize)]
struct SignedRoot {
    keys: BTreeMap<String, serde_json::Value>,
    roles: BTreeMap<String, RoleKeys>,
}

#[derive(Debug, Deserialize)]
struct RoleKeys {
    keyids: Vec<String>,
}

/// Keys and trusted key ids from a cached `root.json`
#[derive(Debug, Clone)]
pub struct RootMetadataSnapshot {
    keys: BTreeMap<String, serde_json::Value>,
    roles: BTreeMap<String, Vec<String>>,
}

impl RootMetadataSnapshot {
    /// Parse the signed portion of a root document
    pub fn parse(json: &str) -> Result<Self> {
        let doc: RootDocument = serde_json::from_str(json)?;
        Ok(Self {
            keys: doc.signed.keys,
            roles: doc
                .signed
                .roles
                .into_iter()
                .map(|(role, keys)| (role, keys.keyids))
                .collect(),
        })
    }

    /// Read the root metadata cached for `repo` in `trust_dir`
    pub fn load(trust_dir: &Path, repo: &str) -> Result<Self> {
        let path = root_metadata_path(trust_dir, repo);
        let content = std::fs::read_to_string(&path).map_err(|e| Error::MetadataRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content).map_err(|e| Error::MetadataRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })
    }

    /// Number of keys known to the root document, across all roles
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn has_key(&self, key_id: &str) -> bool {
        self.keys.contains_key(key_id)
    }

    /// Key ids trusted for `role`; empty if the role is absent
    pub fn trusted_keys(&self, role: &str) -> &[String] {
        self.roles.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The one trusted root key id, failing unless there is exactly one
    pub fn single_root_key(&self) -> Result<&str> {
        match self.trusted_keys(ROOT_ROLE) {
            [key] => Ok(key.as_str()),
            keys => Err(Error::assertion(format!(
                "expected 1 valid root key, got {}: {:?}",
                keys.len(),
                keys
            ))),
        }
    }
}

/// One row of `key list` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub role: String,
    /// The whole trimmed row, used to tell keys apart
    pub line: String,
}

/// Parsed `key list` output
#[derive(Debug, Clone, Default)]
pub struct KeyListing {
    entries: Vec<KeyEntry>,
}

impl KeyListing {
    pub fn parse(output: &str) -> Self {
        let entries = output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let role = line.split_whitespace().next()?;
                Some(KeyEntry {
                    role: role.to_string(),
                    line: line.to_string(),
                })
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    /// Rows whose role label is `role`
    pub fn for_role<'a>(&'a self, role: &'a str) -> impl Iterator<Item = &'a KeyEntry> + 'a {
        self.entries.iter().filter(move |entry| entry.role == role)
    }

    pub fn root_entries(&self) -> Vec<&KeyEntry> {
        self.for_role(ROOT_ROLE).collect()
    }

    /// The single root row, failing unless there is exactly one
    pub fn single_root_entry(&self) -> Result<&KeyEntry> {
        let roots = self.root_entries();
        if roots.len() == 1 {
            return Ok(roots[0]);
        }
        Err(Error::assertion(format!(
            "expected exactly 1 root key in key list, got {}: {:?}",
            roots.len(),
            roots.iter().map(|e| e.line.as_str()).collect::<Vec<_>>()
        )))
    }

    /// Root rows not present in `known`
    pub fn new_root_entries(&self, known: &BTreeSet<String>) -> Vec<&KeyEntry> {
        self.for_role(ROOT_ROLE)
            .filter(|entry| !known.contains(&entry.line))
            .collect()
    }
}

/// One row of `list` output
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TargetEntry {
    pub name: String,
    /// Last column: the role that signed the target
    pub role: String,
    pub line: String,
}

/// Parsed `list` output
#[derive(Debug, Clone, Default)]
pub struct TargetListing {
    entries: Vec<TargetEntry>,
}

impl TargetListing {
    pub fn parse(output: &str) -> Self {
        let entries = output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let mut columns = line.split_whitespace();
                let name = columns.next()?;
                let role = columns.last().unwrap_or(name);
                Some(TargetEntry {
                    name: name.to_string(),
                    role: role.to_string(),
                    line: line.to_string(),
                })
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[TargetEntry] {
        &self.entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    /// Rows named `name` and attributed to `role`
    pub fn count(&self, name: &str, role: &str) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.name == name && entry.role == role)
            .count()
    }

    /// Rows as a set, ignoring order and duplicates
    pub fn as_set(&self) -> BTreeSet<&str> {
        self.entries.iter().map(|entry| entry.line.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT_JSON: &str = r#"{
        "signed": {
            "_type": "Root",
            "keys": {
                "aaa111": {"keytype": "ecdsa-x509", "keyval": {"public": "AAA"}},
                "bbb222": {"keytype": "ecdsa", "keyval": {"public": "BBB"}},
                "ccc333": {"keytype": "ecdsa", "keyval": {"public": "CCC"}}
            },
            "roles": {
                "root": {"keyids": ["aaa111"], "threshold": 1},
                "targets": {"keyids": ["bbb222"], "threshold": 1},
                "snapshot": {"keyids": ["ccc333"], "threshold": 1}
            },
            "version": 1
        },
        "signatures": []
    }"#;

    const KEY_LIST: &str = "
ROLE        GUN          KEY ID                                                              LOCATION
----        ---          ------                                                              --------
root                     aaa111                                                              file (/tmp/x_main/private)
targets     demo         bbb222                                                              file (/tmp/x_main/private)
";

    const TARGET_LIST: &str = "
NAME               DIGEST          SIZE (BYTES)    ROLE
----               ------          ------------    ----
basic_repo_test    0f3a9c12        15              targets
";

    #[test]
    fn test_root_snapshot_counts_and_trusted_keys() {
        let snapshot = RootMetadataSnapshot::parse(ROOT_JSON).unwrap();
        assert_eq!(snapshot.key_count(), 3);
        assert_eq!(snapshot.trusted_keys("root"), &["aaa111".to_string()]);
        assert_eq!(snapshot.single_root_key().unwrap(), "aaa111");
        assert!(snapshot.trusted_keys("timestamp").is_empty());
        assert!(snapshot.has_key("ccc333"));
    }

    #[test]
    fn test_root_snapshot_rejects_two_root_keys() {
        let json = ROOT_JSON.replace(r#"["aaa111"]"#, r#"["aaa111", "bbb222"]"#);
        let snapshot = RootMetadataSnapshot::parse(&json).unwrap();
        let err = snapshot.single_root_key().unwrap_err();
        assert!(err.to_string().contains("expected 1 valid root key, got 2"));
    }

    #[test]
    fn test_root_snapshot_rejects_malformed_document() {
        assert!(RootMetadataSnapshot::parse(r#"{"signed": {"keys": {}}}"#).is_err());
    }

    #[test]
    fn test_root_snapshot_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = RootMetadataSnapshot::load(dir.path(), "demo").unwrap_err();
        match err {
            Error::MetadataRead { path, .. } => {
                assert!(path.ends_with("tuf/demo/metadata/root.json"));
            }
            other => panic!("Expected MetadataRead, got {other:?}"),
        }
    }

    #[test]
    fn test_root_snapshot_load_from_trust_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = root_metadata_path(dir.path(), "demo");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, ROOT_JSON).unwrap();

        let snapshot = RootMetadataSnapshot::load(dir.path(), "demo").unwrap();
        assert_eq!(snapshot.key_count(), 3);
    }

    #[test]
    fn test_key_listing_single_root() {
        let listing = KeyListing::parse(KEY_LIST);
        let root = listing.single_root_entry().unwrap();
        assert!(root.line.starts_with("root"));
        assert!(root.line.contains("aaa111"));
        assert_eq!(listing.for_role("targets").count(), 1);
    }

    #[test]
    fn test_key_listing_finds_new_root_entry() {
        let rotated = format!(
            "{KEY_LIST}root                     ddd444                                                              file (/tmp/x_main/private)\n"
        );
        let listing = KeyListing::parse(&rotated);
        assert!(listing.single_root_entry().is_err());

        let original = KeyListing::parse(KEY_LIST);
        let known: BTreeSet<String> = original
            .root_entries()
            .iter()
            .map(|e| e.line.clone())
            .collect();
        let fresh = listing.new_root_entries(&known);
        assert_eq!(fresh.len(), 1);
        assert!(fresh[0].line.contains("ddd444"));
    }

    #[test]
    fn test_target_listing_attributes_roles() {
        let listing = TargetListing::parse(TARGET_LIST);
        assert!(listing.contains("basic_repo_test"));
        assert_eq!(listing.count("basic_repo_test", TARGETS_ROLE), 1);
        assert_eq!(listing.count("basic_repo_test", "targets/releases"), 0);
        assert!(!listing.contains("root_rotation_test_targets_add"));
    }
}
