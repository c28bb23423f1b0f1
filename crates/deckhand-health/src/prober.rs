//! HTTP health probes against an app's assigned port

use deckhand_core::{constants, HealthRecord, HealthStatus};
use std::time::{Duration, Instant};
use tracing::debug;

/// Probes apps on loopback with a bounded per-request timeout.
pub struct HealthProber {
    client: reqwest::Client,
}

impl HealthProber {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(constants::HEALTH_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// GET `/` on the app's port. 2xx/3xx is healthy with a response time;
    /// anything else (including connect errors and timeouts) is unhealthy.
    pub async fn probe(&self, port: u16) -> HealthRecord {
        let url = format!("http://127.0.0.1:{}/", port);
        let start = Instant::now();

        match self.client.get(&url).send().await {
            Ok(response) => {
                let elapsed = start.elapsed().as_millis() as u64;
                let status = response.status();
                if status.is_success() || status.is_redirection() {
                    debug!(port, status = status.as_u16(), elapsed, "probe healthy");
                    HealthRecord::healthy(elapsed)
                } else {
                    debug!(port, status = status.as_u16(), "probe got error status");
                    HealthRecord::now(HealthStatus::Unhealthy)
                }
            }
            Err(e) => {
                debug!(port, error = %e, "probe failed");
                HealthRecord::now(HealthStatus::Unhealthy)
            }
        }
    }
}

impl Default for HealthProber {
    fn default() -> Self {
        Self::new()
    }
}
