//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

/// Tests the trust client against a server
///
/// To test against a testing server without auth, run without arguments
/// (or with just the server); a random repository name is generated.
///
/// Against a registry that needs a login, use something like
/// `trust-harness -s https://quay.io -r quay.io/username/reponame -u username`
#[derive(Parser, Debug)]
#[command(name = "trust-harness", version)]
pub struct HarnessArgs {
    /// Name of the repository; randomly generated if not provided
    #[arg(short = 'r', long)]
    pub reponame: Option<String>,

    /// Server to connect to; the default testing server (or an empty value)
    /// selects the client's local configuration instead
    #[arg(short = 's', long)]
    pub server: Option<String>,

    /// Username to log into the server with (the password is prompted for)
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// Configuration file (default: platform config dir)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Trust client binary to run
    #[arg(long)]
    pub binary: Option<PathBuf>,

    /// Seconds to wait for the server to become ready
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Run only these scenarios (repeatable); order is always the declared order
    #[arg(long = "scenario", value_name = "NAME")]
    pub scenarios: Vec<String>,

    /// Do not wait for the server before running scenarios
    #[arg(long)]
    pub skip_wait: bool,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Also append logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
