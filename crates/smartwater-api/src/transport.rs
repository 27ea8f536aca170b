// Shared transport configuration for building reqwest::Client instances.
//
// The auth client and the device client talk to the same backend and
// share one connection pool, so both are built from this config.

use std::time::Duration;

use crate::error::ApiError;

const USER_AGENT: &str = concat!("smartwater/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout. A timed-out request is a transient failure.
    pub timeout: Duration,
    /// Maximum number of requests one batch operation keeps in flight.
    pub max_concurrent_requests: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_concurrent_requests: 4,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, ApiError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::Transient {
                message: format!("failed to build HTTP client: {e}"),
            })
    }

    /// Concurrency cap, never below one.
    pub(crate) fn concurrency(&self) -> usize {
        self.max_concurrent_requests.max(1)
    }
}
