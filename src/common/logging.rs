//! Logging and tracing configuration
//!
//! Operator-facing output (command lines, captured output, pass marks) is
//! printed directly; tracing carries the structured diagnostics on stderr
//! and, optionally, into a log file.

use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("trust_harness=debug,info")
        } else {
            EnvFilter::new("trust_harness=info,warn")
        }
    })
}

/// Initialize tracing for the harness
///
/// Logs are controlled by the `RUST_LOG` environment variable. Default level
/// is INFO for this crate (DEBUG with `verbose`), WARN for dependencies.
/// When `log_file` is given, a second non-ANSI layer with file and line
/// details appends to it.
pub fn init_cli(verbose: bool, log_file: Option<&Path>) {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let file_layer = log_file.and_then(|path| {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
        {
            Ok(file) => Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            ),
            Err(e) => {
                eprintln!("Warning: Could not open log file {}: {}", path.display(), e);
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(stderr_layer)
        .with(file_layer)
        .init();
}
