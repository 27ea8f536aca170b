// ── Runtime configuration ──
//
// Built by the host (CLI or config crate) and handed to the Coordinator.
// Core never reads config files.

use std::time::Duration;

use smartwater_api::{Credentials, TransportConfig};
use url::Url;

/// Everything the Coordinator needs to poll one Smart Water account.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Base URL of the Smart Water cloud API.
    pub url: Url,
    pub credentials: Credentials,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Re-authenticate when the token expires within this margin.
    pub token_refresh_margin: Duration,
    /// Time between scheduled refresh cycles.
    pub poll_interval: Duration,
    /// Consecutive NotFound cycles before a device is dropped.
    pub removal_debounce: u32,
    /// Consecutive failed cycles before the status turns Unavailable.
    pub failure_threshold: u32,
    /// Maximum requests in flight within one cycle.
    pub max_concurrent_requests: usize,
    /// How long shutdown waits for an in-flight cycle before abandoning it.
    pub shutdown_timeout: Duration,
    /// Minimum time between account profile refreshes.
    pub profile_refresh_interval: Duration,
}

impl CoordinatorConfig {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(120);
    pub const DEFAULT_REMOVAL_DEBOUNCE: u32 = 3;
    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
    pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

    /// Config with default polling policy for the given account.
    pub fn new(url: Url, credentials: Credentials) -> Self {
        Self {
            url,
            credentials,
            timeout: Duration::from_secs(30),
            token_refresh_margin: Duration::from_secs(60),
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            removal_debounce: Self::DEFAULT_REMOVAL_DEBOUNCE,
            failure_threshold: Self::DEFAULT_FAILURE_THRESHOLD,
            max_concurrent_requests: Self::DEFAULT_MAX_CONCURRENT_REQUESTS,
            shutdown_timeout: Duration::from_secs(10),
            profile_refresh_interval: Duration::from_secs(24 * 3600),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: self.timeout,
            max_concurrent_requests: self.max_concurrent_requests,
        }
    }
}
