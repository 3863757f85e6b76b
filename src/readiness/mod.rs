//! Server readiness probe
//!
//! Gates the scenarios on the server answering health probes. A single
//! success is not enough: the server may answer once while still
//! initialising, so readiness needs an unbroken streak of successes. After
//! that the probe waits a fixed grace period for the server's signer
//! connection; it does not check the signer itself.

mod health;

pub use health::{HealthCheck, HttpHealthCheck};

use tokio::time::{sleep, Instant};

use crate::client::ServerMode;
use crate::common::config::ReadinessConfig;
use crate::common::{Error, Result};

/// Counts consecutive successful probes
#[derive(Debug, Clone)]
pub struct ConsecutiveSuccesses {
    required: u32,
    count: u32,
}

impl ConsecutiveSuccesses {
    pub fn new(required: u32) -> Self {
        Self { required, count: 0 }
    }

    /// Record one probe outcome and report whether the streak is long enough
    ///
    /// A failure resets the streak to zero.
    pub fn record(&mut self, success: bool) -> bool {
        if success {
            self.count += 1;
        } else {
            self.count = 0;
        }
        self.is_ready()
    }

    pub fn is_ready(&self) -> bool {
        self.count >= self.required
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Polls a server until it answers health probes consistently
pub struct ReadinessProbe<H: HealthCheck = HttpHealthCheck> {
    check: H,
    settings: ReadinessConfig,
}

impl<H: HealthCheck> ReadinessProbe<H> {
    pub fn new(check: H, settings: ReadinessConfig) -> Self {
        Self { check, settings }
    }

    /// Server named in logs and errors
    pub fn server_name(&self, mode: &ServerMode) -> String {
        match mode {
            ServerMode::Remote(url) => url.clone(),
            ServerMode::Local => self.settings.default_server.clone(),
        }
    }

    /// Address actually probed
    ///
    /// Local mode probes the default server's health endpoint; a remote
    /// server is probed at its base address.
    pub fn target(&self, mode: &ServerMode) -> String {
        match mode {
            ServerMode::Remote(url) => url.clone(),
            ServerMode::Local => format!(
                "{}{}",
                self.settings.default_server.trim_end_matches('/'),
                self.settings.health_path
            ),
        }
    }

    /// Block until the server is ready or the timeout budget is spent
    pub async fn wait(&self, mode: &ServerMode) -> Result<()> {
        let url = self.target(mode);
        let timeout = self.settings.timeout();
        let start = Instant::now();
        let mut streak = ConsecutiveSuccesses::new(self.settings.required_successes);
        let mut attempts = 0u32;

        tracing::info!(url = %url, timeout_secs = self.settings.timeout_secs, "waiting for server");

        while start.elapsed() <= timeout {
            attempts += 1;
            let healthy = self.check.check(&url).await;
            let ready = streak.record(healthy);
            tracing::debug!(attempt = attempts, healthy, streak = streak.count(), "probe");

            if ready {
                break;
            }
            if !healthy {
                sleep(self.settings.retry_interval()).await;
            }
        }

        if !streak.is_ready() {
            return Err(Error::server_unreachable(
                &self.server_name(mode),
                self.settings.timeout_secs,
            ));
        }

        tracing::info!(
            attempts,
            grace_secs = self.settings.grace_period_secs,
            "server ready, waiting for grace period"
        );
        sleep(self.settings.grace_period()).await;
        Ok(())
    }
}
