//! Trust client process runner
//!
//! Spawns the trust client with the run's fixed passphrase environment,
//! feeds it its stdin plan and captures stdout through an anonymous temp
//! file. A pipe would deadlock once the child fills the pipe buffer while we
//! are still writing its input.

use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use colored::Colorize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::common::config::{ClientConfig, SigningPassphrases};
use crate::common::{Error, Result};

use super::invocation::{CommandInvocation, Credentials};

/// Where the trust client keeps its signed state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMode {
    /// Talk to a remote server at this address
    Remote(String),
    /// Use the client's embedded local configuration
    Local,
}

impl ServerMode {
    /// Interpret the `--server` argument
    ///
    /// The value is lowercased and trimmed. Absent, empty, or equal to
    /// `sentinel` selects local mode.
    pub fn from_arg(server: Option<&str>, sentinel: &str) -> Self {
        let Some(server) = server else {
            return Self::Local;
        };
        let normalized = server.trim().to_lowercase();
        if normalized.is_empty() || normalized == sentinel.trim().to_lowercase() {
            Self::Local
        } else {
            Self::Remote(normalized)
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }
}

impl std::fmt::Display for ServerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{}", url),
            Self::Local => write!(f, "local"),
        }
    }
}

/// Output of one finished invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub stdout: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout of a successful run, or a [`Error::NonZeroExit`] carrying it
    pub fn into_stdout(self, command: &str) -> Result<String> {
        if self.success() {
            Ok(self.stdout)
        } else {
            Err(Error::non_zero_exit(command, self.exit_code, &self.stdout))
        }
    }
}

/// Runs the trust client binary
#[derive(Debug, Clone)]
pub struct CommandRunner {
    binary: PathBuf,
    mode: ServerMode,
    local_config: PathBuf,
    passphrases: SigningPassphrases,
    credentials: Option<Credentials>,
    echo: bool,
}

impl CommandRunner {
    /// Create a runner, resolving a bare binary name through `PATH`
    pub fn new(
        client: &ClientConfig,
        mode: ServerMode,
        passphrases: SigningPassphrases,
    ) -> Result<Self> {
        Ok(Self {
            binary: resolve_binary(&client.binary)?,
            mode,
            local_config: client.local_config.clone(),
            passphrases,
            credentials: None,
            echo: true,
        })
    }

    /// Send these credentials to every non-offline invocation
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Stop echoing command lines and output to stdout
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    pub fn mode(&self) -> &ServerMode {
        &self.mode
    }

    /// Arguments passed to the binary: mode prefix, trust dir, then the
    /// invocation's own arguments
    pub fn arguments(&self, invocation: &CommandInvocation) -> Vec<String> {
        let mut args = match &self.mode {
            ServerMode::Remote(url) => vec!["-s".to_string(), url.clone()],
            ServerMode::Local => vec![
                "-D".to_string(),
                "-c".to_string(),
                self.local_config.display().to_string(),
            ],
        };
        args.push("-d".to_string());
        args.push(invocation.trust_dir().display().to_string());
        args.extend(invocation.args().iter().cloned());
        args
    }

    /// Full command line as shown to the operator
    pub fn command_line(&self, invocation: &CommandInvocation) -> String {
        std::iter::once(self.binary.display().to_string())
            .chain(self.arguments(invocation))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the invocation and return its stdout, failing on a non-zero exit
    pub async fn invoke(&self, invocation: CommandInvocation) -> Result<String> {
        let command = self.command_line(&invocation);
        self.execute(invocation).await?.into_stdout(&command)
    }

    /// Run the invocation and return its result whatever the exit status
    pub async fn execute(&self, invocation: CommandInvocation) -> Result<ProcessResult> {
        let command = self.command_line(&invocation);
        if self.echo {
            println!("{} {}", "$".dimmed(), command);
        }

        let mut capture = tempfile::tempfile()?;

        let mut cmd = Command::new(&self.binary);
        cmd.args(self.arguments(&invocation))
            .envs(self.passphrases.env_vars())
            .envs(invocation.env().iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::from(capture.try_clone()?))
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(|source| Error::Spawn {
            command: command.clone(),
            source,
        })?;

        let input = invocation.stdin_plan(self.credentials.as_ref()).encode();
        if let Some(mut stdin) = child.stdin.take() {
            if !input.is_empty() {
                // The child may exit without reading its input
                match stdin.write_all(&input).await {
                    Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                        return Err(e.into());
                    }
                    _ => {}
                }
            }
            drop(stdin);
        }

        let status = child.wait().await?;

        capture.seek(SeekFrom::Start(0))?;
        let mut raw = Vec::new();
        capture.read_to_end(&mut raw)?;
        let stdout = String::from_utf8_lossy(&raw).into_owned();

        tracing::debug!(
            command = %command,
            exit_code = ?status.code(),
            stdin_bytes = input.len(),
            stdout_bytes = stdout.len(),
            "trust client finished"
        );

        if self.echo {
            println!("{}", stdout);
        }

        Ok(ProcessResult {
            stdout,
            exit_code: status.code(),
        })
    }
}

fn resolve_binary(binary: &Path) -> Result<PathBuf> {
    if binary.components().count() > 1 || binary.is_absolute() {
        return Ok(binary.to_path_buf());
    }
    which::which(binary).map_err(|_| Error::BinaryNotFound {
        name: binary.display().to_string(),
    })
}
