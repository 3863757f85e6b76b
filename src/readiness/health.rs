//! Health checks used by the readiness probe

use std::time::Duration;

use async_trait::async_trait;

use crate::common::Result;

/// A single yes/no probe of a server address
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self, url: &str) -> bool;
}

/// Plain HTTP request; any response counts as healthy
///
/// Only transport failures (refused connection, DNS, TLS, timeout) fail
/// the probe. The status code is not inspected.
#[derive(Debug, Clone)]
pub struct HttpHealthCheck {
    client: reqwest::Client,
}

impl HttpHealthCheck {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HealthCheck for HttpHealthCheck {
    async fn check(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => {
                tracing::debug!(url, status = %response.status(), "health probe answered");
                true
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "health probe failed");
                false
            }
        }
    }
}
