//! Invocation descriptions and stdin sequencing
//!
//! The trust client reads interactive input in a fixed order: an optional
//! payload (such as a confirmation), then username and password when the
//! server requires them. The order and the newline rules live here so they
//! can be checked without spawning anything.

use std::path::{Path, PathBuf};

/// Credentials for an authenticating server
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Whether an invocation may send the configured credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialMode {
    /// Send configured credentials, if any
    #[default]
    Configured,
    /// Offline operation; never send credentials
    Offline,
}

/// One piece of interactive input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSegment {
    /// Free-form input such as a confirmation answer
    Payload(String),
    Username(String),
    Password(String),
}

impl PromptSegment {
    fn text(&self) -> &str {
        match self {
            Self::Payload(text) | Self::Username(text) | Self::Password(text) => text,
        }
    }
}

/// Ordered stdin content for one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StdinPlan {
    segments: Vec<PromptSegment>,
}

impl StdinPlan {
    /// Build the plan: payload first, then credentials
    pub fn new(payload: Option<&str>, credentials: Option<&Credentials>) -> Self {
        let mut segments = Vec::new();
        if let Some(payload) = payload {
            segments.push(PromptSegment::Payload(payload.to_string()));
        }
        if let Some(creds) = credentials {
            segments.push(PromptSegment::Username(creds.username.clone()));
            segments.push(PromptSegment::Password(creds.password.clone()));
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[PromptSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Bytes written to the child's stdin before it is closed
    ///
    /// Credentials are always newline-terminated since end-of-stream does not
    /// finish those prompts. A payload gets a newline only when more input
    /// follows; a trailing payload is ended by closing the stream.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        let last = self.segments.len().saturating_sub(1);
        for (i, segment) in self.segments.iter().enumerate() {
            bytes.extend_from_slice(segment.text().as_bytes());
            let trailing_payload = i == last && matches!(segment, PromptSegment::Payload(_));
            if !trailing_payload {
                bytes.push(b'\n');
            }
        }
        bytes
    }
}

/// A single run of the trust client
///
/// Built with the chained setters and consumed by
/// [`CommandRunner::invoke`](super::CommandRunner::invoke).
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    args: Vec<String>,
    trust_dir: PathBuf,
    payload: Option<String>,
    credentials: CredentialMode,
    env: Vec<(String, String)>,
}

impl CommandInvocation {
    pub fn new<I, S>(trust_dir: &Path, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            trust_dir: trust_dir.to_path_buf(),
            payload: None,
            credentials: CredentialMode::Configured,
            env: Vec::new(),
        }
    }

    /// Input written before any credentials
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Mark the invocation as offline so no credentials are sent
    pub fn offline(mut self) -> Self {
        self.credentials = CredentialMode::Offline;
        self
    }

    /// Extra environment applied after the passphrases
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn trust_dir(&self) -> &Path {
        &self.trust_dir
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    pub fn credential_mode(&self) -> CredentialMode {
        self.credentials
    }

    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    /// Stdin plan given the runner's configured credentials
    pub fn stdin_plan(&self, configured: Option<&Credentials>) -> StdinPlan {
        let credentials = match self.credentials {
            CredentialMode::Configured => configured,
            CredentialMode::Offline => None,
        };
        StdinPlan::new(self.payload(), credentials)
    }
}
