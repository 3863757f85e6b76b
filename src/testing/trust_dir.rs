//! Trust directories as client identities
//!
//! Each directory stands in for one client machine holding its own keys and
//! metadata cache for the repository under test.

use std::path::Path;

use tempfile::TempDir;

use crate::client::CommandInvocation;
use crate::common::Result;

/// A simulated client: a label plus the trust directory it owns
#[derive(Debug)]
pub struct TrustClient {
    label: String,
    dir: TempDir,
}

impl TrustClient {
    /// Create a client with a fresh temporary trust directory
    ///
    /// The directory name ends with `_<label>` to make leftovers easy to
    /// attribute.
    pub fn create(label: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .suffix(&format!("_{label}"))
            .tempdir()?;
        tracing::debug!(client = label, dir = %dir.path().display(), "created trust directory");
        Ok(Self {
            label: label.to_string(),
            dir,
        })
    }

    /// The client whose keys own the repository for the whole run
    pub fn primary() -> Result<Self> {
        Self::create("main")
    }

    /// A freshly provisioned second client
    pub fn secondary() -> Result<Self> {
        Self::create("temp")
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Start an invocation against this client's trust directory
    pub fn command<I, S>(&self, args: I) -> CommandInvocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandInvocation::new(self.path(), args)
    }

    /// Remove the trust directory, ignoring it having vanished already
    pub fn remove(self) -> Result<()> {
        let label = self.label;
        match self.dir.close() {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => {
                tracing::debug!(client = %label, "removed trust directory");
                Ok(())
            }
        }
    }
}
