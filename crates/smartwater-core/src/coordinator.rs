// ── Polling coordinator ──
//
// Owns the refresh schedule for one Smart Water account. Runs at most one
// cycle at a time, keeps the last good snapshot through outages, and
// classifies each cycle as Success, PartialFailure or Failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use smartwater_api::{
    ApiError, AuthClient, DeviceRef, DiscoveredDevice, ReadingResults, Session, SmartWaterClient,
};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{Authenticator, DeviceSource};
use crate::config::CoordinatorConfig;
use crate::diagnostics::{ConfigSummary, CycleStatistics, DiagnosticsReport};
use crate::error::{CoreError, CycleError, DeviceFailure};
use crate::mapper;
use crate::model::{
    Availability, CoordinatorStatus, CycleOutcome, CycleState, Device, DeviceChanges, DeviceId,
    Profile, Published, Snapshot,
};
use crate::store::SnapshotStore;
use crate::store::refresh::{CycleInput, DeviceResults, NotFoundTracker, build_snapshot};
use crate::stream::SnapshotStream;

/// Shortest schedule period accepted; zero would spin.
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

// ── Coordinator ──────────────────────────────────────────────────

/// The main entry point for hosts.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Call
/// [`setup()`](Self::setup) to verify the account, [`start()`](Self::start)
/// to begin polling, and [`shutdown()`](Self::shutdown) on teardown.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    auth: Arc<dyn Authenticator>,
    source: Arc<dyn DeviceSource>,
    store: SnapshotStore,
    /// Held for the whole of a cycle. `try_lock` failing means a cycle is
    /// already running.
    cycle: Mutex<CycleContext>,
    state: watch::Sender<CycleState>,
    stats: Mutex<CycleStatistics>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

/// State carried from one cycle to the next.
#[derive(Default)]
struct CycleContext {
    session: Option<Session>,
    tracker: NotFoundTracker,
    profile: Option<Profile>,
    profile_fetched_at: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    last_success: Option<DateTime<Utc>>,
    /// No request goes out before this instant. Set from the longest
    /// `Retry-After` the backend sent in a cycle.
    backoff_until: Option<Instant>,
}

impl CycleContext {
    fn profile_due(&self, now: DateTime<Utc>, every: Duration) -> bool {
        match self.profile_fetched_at {
            None => true,
            Some(at) => (now - at).to_std().is_ok_and(|age| age >= every),
        }
    }

    /// Time left in the current backoff window, if any.
    fn backoff_remaining(&self, now: Instant) -> Option<Duration> {
        self.backoff_until
            .map(|until| until.saturating_duration_since(now))
            .filter(|left| !left.is_zero())
    }

    /// Extend the backoff window to cover `error`'s `Retry-After`.
    fn note_rate_limit(&mut self, error: &ApiError, now: Instant) {
        let Some(wait) = error.retry_after() else {
            return;
        };
        let until = now + wait;
        if self.backoff_until.is_none_or(|current| current < until) {
            self.backoff_until = Some(until);
        }
    }

    fn note_rate_limits(&mut self, results: &ReadingResults) {
        let now = Instant::now();
        for error in results.values().filter_map(|r| r.as_ref().err()) {
            self.note_rate_limit(error, now);
        }
    }
}

impl Coordinator {
    /// Build a coordinator talking to the configured cloud endpoint.
    ///
    /// Does not touch the network.
    pub fn new(config: CoordinatorConfig) -> Result<Self, CoreError> {
        let transport = config.transport();
        let http = transport.build_client()?;

        let auth = AuthClient::with_client(http.clone(), config.url.clone(), config.credentials.clone())
            .with_refresh_margin(config.token_refresh_margin);
        let source = SmartWaterClient::with_client(http, config.url.clone())
            .with_max_concurrent(config.max_concurrent_requests);

        Ok(Self::with_backend(config, Arc::new(auth), Arc::new(source)))
    }

    /// Build a coordinator over arbitrary backends.
    pub fn with_backend(
        config: CoordinatorConfig,
        auth: Arc<dyn Authenticator>,
        source: Arc<dyn DeviceSource>,
    ) -> Self {
        let (state, _) = watch::channel(CycleState::Idle);
        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                auth,
                source,
                store: SnapshotStore::new(),
                cycle: Mutex::new(CycleContext::default()),
                state,
                stats: Mutex::new(CycleStatistics::default()),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Verify the credentials with a fresh login and fetch the account profile.
    ///
    /// Bad credentials come back as [`CoreError::InvalidCredentials`] with
    /// no retry.
    pub async fn setup(&self) -> Result<Profile, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ShutDown);
        }

        let session = self.inner.auth.authenticate().await?;
        let profile = Profile::from(self.inner.source.fetch_profile(&session).await?);

        let mut ctx = self.inner.cycle.lock().await;
        ctx.session = Some(session);
        ctx.profile = Some(profile.clone());
        ctx.profile_fetched_at = Some(Utc::now());
        info!(account = %profile.id, "account verified");
        Ok(profile)
    }

    /// Spawn the background refresh task. The first cycle runs immediately.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::ShutDown);
        }

        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            debug!("refresh task already running");
            return Ok(());
        }

        let period = self.inner.config.poll_interval.max(MIN_POLL_INTERVAL);
        handles.push(tokio::spawn(refresh_task(
            self.clone(),
            period,
            self.inner.cancel.clone(),
        )));
        info!(interval_secs = period.as_secs(), "polling started");
        Ok(())
    }

    /// Stop polling and release the session.
    ///
    /// An in-flight cycle is abandoned without publishing. Waits at most
    /// `shutdown_timeout` for the background task before aborting it.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let handles: Vec<_> = self.inner.task_handles.lock().await.drain(..).collect();
        for mut handle in handles {
            if tokio::time::timeout(self.inner.config.shutdown_timeout, &mut handle)
                .await
                .is_err()
            {
                warn!("refresh task did not stop in time, aborting");
                handle.abort();
            }
        }

        if let Ok(mut ctx) = self.inner.cycle.try_lock() {
            ctx.session = None;
        }
        debug!("coordinator shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Run one refresh cycle now.
    ///
    /// Returns [`CycleOutcome::Coalesced`] without touching the network
    /// when another cycle is already running, and
    /// [`CycleOutcome::Deferred`] while the backend's `Retry-After` window
    /// is still open.
    pub async fn refresh(&self) -> CycleOutcome {
        if self.inner.cancel.is_cancelled() {
            return CycleOutcome::Failure {
                error: CycleError::ShutDown,
            };
        }

        let Ok(mut ctx) = self.inner.cycle.try_lock() else {
            debug!("refresh already in progress, coalescing");
            let outcome = CycleOutcome::Coalesced;
            self.inner.stats.lock().await.record(&outcome, Duration::ZERO);
            return outcome;
        };

        let started = Instant::now();
        if let Some(remaining) = ctx.backoff_remaining(started) {
            debug!(remaining_secs = remaining.as_secs(), "rate limited, skipping refresh");
            let outcome = CycleOutcome::Deferred { remaining };
            self.inner.stats.lock().await.record(&outcome, Duration::ZERO);
            return outcome;
        }
        ctx.backoff_until = None;

        let _state = StateGuard::enter(&self.inner.state);

        let outcome = tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => {
                debug!("cycle abandoned on shutdown");
                return CycleOutcome::Failure { error: CycleError::ShutDown };
            }
            outcome = self.run_cycle(&mut ctx) => outcome,
        };

        let elapsed = started.elapsed();
        debug!(elapsed_ms = elapsed.as_millis(), "cycle finished");
        self.inner.stats.lock().await.record(&outcome, elapsed);
        outcome
    }

    async fn run_cycle(&self, ctx: &mut CycleContext) -> CycleOutcome {
        let now = Utc::now();
        match self.collect(ctx, now).await {
            Ok(input) => self.apply(ctx, input),
            Err(error) => self.fail(ctx, error, now),
        }
    }

    /// Session, discovery, profile and readings for one cycle. Any error
    /// returned here fails the whole cycle.
    async fn collect(&self, ctx: &mut CycleContext, now: DateTime<Utc>) -> Result<CycleInput, CycleError> {
        let source = &self.inner.source;
        let mut session = self.session(ctx).await?;
        let mut reauthenticated = false;

        let discovered = match source.discover(&session).await {
            Err(e) if e.is_unauthorized() => {
                session = self.reauthenticate(ctx).await?;
                reauthenticated = true;
                source.discover(&session).await
            }
            other => other,
        };
        let discovery = match discovered {
            Ok(discovery) => discovery,
            Err(e) if e.is_unauthorized() => return Err(Self::rejected(ctx)),
            Err(e) => {
                ctx.note_rate_limit(&e, Instant::now());
                return Err(CycleError::Discovery(e));
            }
        };

        if ctx.profile_due(now, self.inner.config.profile_refresh_interval) {
            match source.fetch_profile(&session).await {
                Ok(raw) => {
                    ctx.profile = Some(Profile::from(raw));
                    ctx.profile_fetched_at = Some(now);
                }
                Err(e) => debug!(error = %e, "profile refresh failed, keeping previous"),
            }
        }

        let refs: Vec<DeviceRef> = discovery
            .devices
            .iter()
            .map(DiscoveredDevice::device_ref)
            .collect();
        let mut payloads = source.fetch_readings(&session, &refs).await;
        ctx.note_rate_limits(&payloads);

        let rejected: Vec<DeviceRef> = refs
            .iter()
            .filter(|r| is_unauthorized(&payloads, &r.id))
            .cloned()
            .collect();
        if !rejected.is_empty() {
            if reauthenticated {
                return Err(Self::rejected(ctx));
            }
            session = self.reauthenticate(ctx).await?;
            let retried = source.fetch_readings(&session, &rejected).await;
            ctx.note_rate_limits(&retried);
            if rejected.iter().any(|r| is_unauthorized(&retried, &r.id)) {
                return Err(Self::rejected(ctx));
            }
            payloads.extend(retried);
        }

        let mut devices: Vec<Device> = discovery.devices.iter().map(Device::from).collect();
        let mut results = map_devices(&devices, payloads);
        if !discovery.unlisted_gateways.is_empty() {
            let previous = self.inner.store.snapshot();
            carry_unlisted(&previous, &discovery.unlisted_gateways, &mut devices, &mut results);
        }

        Ok(CycleInput {
            discovered: devices,
            results,
            profile: ctx.profile.clone(),
            now,
        })
    }

    /// A session valid past the refresh margin. Cleared on failure so the
    /// next cycle starts with a fresh login.
    async fn session(&self, ctx: &mut CycleContext) -> Result<Session, CycleError> {
        let session = match ctx.session.take() {
            Some(session) => self.inner.auth.ensure_valid(session).await?,
            None => self.inner.auth.authenticate().await?,
        };
        ctx.session = Some(session.clone());
        Ok(session)
    }

    /// The one re-authentication a cycle is allowed after the backend
    /// rejected its session.
    async fn reauthenticate(&self, ctx: &mut CycleContext) -> Result<Session, CycleError> {
        ctx.session = None;
        self.inner.stats.lock().await.record_reauthentication();
        info!("session rejected, re-authenticating");
        let session = self.inner.auth.authenticate().await?;
        ctx.session = Some(session.clone());
        Ok(session)
    }

    fn rejected(ctx: &mut CycleContext) -> CycleError {
        ctx.session = None;
        CycleError::SessionRejected
    }

    fn apply(&self, ctx: &mut CycleContext, input: CycleInput) -> CycleOutcome {
        let now = input.now;
        let previous = self.inner.store.snapshot();
        let report = build_snapshot(
            &previous,
            input,
            &mut ctx.tracker,
            self.inner.config.removal_debounce,
        );

        if report.succeeded.is_empty() && report.retired.is_empty() && !report.failed.is_empty() {
            let count = report.failed.len();
            let mut failed = report.failed;
            let (_, first) = failed.swap_remove(0);
            return self.fail(ctx, CycleError::AllDevicesFailed { count, first }, now);
        }

        ctx.consecutive_failures = 0;
        ctx.last_success = Some(now);

        let failed: Vec<DeviceId> = report.failed.iter().map(|(id, _)| id.clone()).collect();
        for (id, failure) in &report.failed {
            warn!(device = %id, error = %failure, "device refresh failed");
        }
        if !report.changes.is_empty() {
            info!(
                added = report.changes.added.len(),
                removed = report.changes.removed.len(),
                "device set changed"
            );
        }

        let snapshot = report.snapshot;
        debug!(
            revision = snapshot.revision,
            devices = snapshot.devices.len(),
            readings = snapshot.reading_count(),
            "publishing snapshot"
        );
        self.inner.store.publish(Published {
            snapshot: Arc::new(snapshot),
            status: CoordinatorStatus {
                availability: Availability::Fresh,
                consecutive_failures: 0,
                last_error: None,
                last_success: Some(now),
                last_attempt: Some(now),
            },
            changes: report.changes,
        });

        if failed.is_empty() {
            CycleOutcome::Success
        } else {
            CycleOutcome::PartialFailure { failed }
        }
    }

    /// Keep the current snapshot, publish a degraded status.
    fn fail(&self, ctx: &mut CycleContext, error: CycleError, now: DateTime<Utc>) -> CycleOutcome {
        ctx.consecutive_failures = ctx.consecutive_failures.saturating_add(1);
        let consecutive_failures = ctx.consecutive_failures;

        let availability = if consecutive_failures >= self.inner.config.failure_threshold.max(1) {
            Availability::Unavailable {
                consecutive_failures,
            }
        } else {
            Availability::Stale {
                consecutive_failures,
            }
        };
        warn!(error = %error, consecutive_failures, %availability, "refresh cycle failed");

        let current = self.inner.store.current();
        self.inner.store.publish(Published {
            snapshot: Arc::clone(&current.snapshot),
            status: CoordinatorStatus {
                availability,
                consecutive_failures,
                last_error: Some(error.to_string()),
                last_success: ctx.last_success,
                last_attempt: Some(now),
            },
            changes: DeviceChanges::default(),
        });

        CycleOutcome::Failure { error }
    }

    // ── Observation ──────────────────────────────────────────────

    /// The last published snapshot and status.
    pub fn current(&self) -> Arc<Published> {
        self.inner.store.current()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.store.snapshot()
    }

    pub fn status(&self) -> CoordinatorStatus {
        self.inner.store.current().status.clone()
    }

    /// Subscribe to every publish, including status-only ones.
    pub fn subscribe(&self) -> SnapshotStream {
        self.inner.store.subscribe()
    }

    /// Watch the Idle/Refreshing state machine.
    pub fn state(&self) -> watch::Receiver<CycleState> {
        self.inner.state.subscribe()
    }

    pub fn cycle_state(&self) -> CycleState {
        *self.inner.state.borrow()
    }

    pub async fn statistics(&self) -> CycleStatistics {
        self.inner.stats.lock().await.clone()
    }

    /// Redacted dump of configuration, status, statistics and snapshot.
    pub async fn diagnostics(&self) -> serde_json::Value {
        let published = self.inner.store.current();
        let statistics = self.statistics().await;
        let config = &self.inner.config;

        DiagnosticsReport {
            generated_at: Utc::now(),
            config: ConfigSummary {
                url: config.url.to_string(),
                username: config.credentials.username.clone(),
                poll_interval_secs: config.poll_interval.as_secs(),
                removal_debounce: config.removal_debounce,
                failure_threshold: config.failure_threshold,
                max_concurrent_requests: config.max_concurrent_requests,
            },
            state: self.cycle_state(),
            status: &published.status,
            statistics: &statistics,
            duration_percentages: statistics.duration_percentages(),
            snapshot: &published.snapshot,
        }
        .to_redacted_json()
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn is_unauthorized(results: &ReadingResults, id: &str) -> bool {
    matches!(results.get(id), Some(Err(e)) if e.is_unauthorized())
}

/// Keep the known children of gateways whose device listing returned
/// NotFound, each failing with NotFound so removal goes through the
/// debounce instead of happening at once.
fn carry_unlisted(
    previous: &Snapshot,
    unlisted: &[String],
    devices: &mut Vec<Device>,
    results: &mut DeviceResults,
) {
    for gateway in unlisted {
        let children = previous.devices.values().filter(|entry| {
            entry
                .device
                .via_gateway
                .as_ref()
                .is_some_and(|via| via.as_str() == gateway.as_str())
        });
        for entry in children {
            let id = &entry.device.id;
            if results.contains_key(id) {
                continue;
            }
            debug!(device = %id, gateway = %gateway, "gateway listing missing, counting device as not found");
            results.insert(
                id.clone(),
                Err(DeviceFailure::Api(ApiError::NotFound {
                    resource: format!("gateways/{gateway}/devices"),
                })),
            );
            devices.push(entry.device.clone());
        }
    }
}

/// Pair each discovered device with its payload and map it.
fn map_devices(devices: &[Device], mut payloads: ReadingResults) -> DeviceResults {
    let mut results = HashMap::with_capacity(devices.len());
    for device in devices {
        let result = match payloads.remove(device.id.as_str()) {
            Some(Ok(payload)) => mapper::map(device, &payload).map_err(DeviceFailure::from),
            Some(Err(e)) => Err(DeviceFailure::from(e)),
            None => Err(DeviceFailure::Api(ApiError::Transient {
                message: "no reading returned".into(),
            })),
        };
        results.insert(device.id.clone(), result);
    }
    results
}

/// Marks the coordinator Refreshing for as long as it lives.
struct StateGuard<'a> {
    state: &'a watch::Sender<CycleState>,
}

impl<'a> StateGuard<'a> {
    fn enter(state: &'a watch::Sender<CycleState>) -> Self {
        state.send_replace(CycleState::Refreshing);
        Self { state }
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.state.send_replace(CycleState::Idle);
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodically run a refresh cycle. Ticks that land while a cycle is
/// still running are skipped, not queued.
async fn refresh_task(coordinator: Coordinator, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                match coordinator.refresh().await {
                    CycleOutcome::Success => debug!("scheduled refresh succeeded"),
                    CycleOutcome::PartialFailure { failed } => {
                        debug!(failed = failed.len(), "scheduled refresh partially failed");
                    }
                    CycleOutcome::Failure { error } => debug!(error = %error, "scheduled refresh failed"),
                    CycleOutcome::Deferred { remaining } => {
                        debug!(remaining_secs = remaining.as_secs(), "scheduled refresh deferred");
                    }
                    CycleOutcome::Coalesced => {}
                }
            }
        }
    }
    debug!("refresh task stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn profile_due_after_interval() {
        let now = Utc::now();
        let mut ctx = CycleContext::default();
        let day = Duration::from_secs(24 * 3600);
        assert!(ctx.profile_due(now, day));

        ctx.profile_fetched_at = Some(now - chrono::TimeDelta::hours(1));
        assert!(!ctx.profile_due(now, day));

        ctx.profile_fetched_at = Some(now - chrono::TimeDelta::hours(25));
        assert!(ctx.profile_due(now, day));
    }

    #[test]
    fn backoff_keeps_longest_retry_after() {
        let now = Instant::now();
        let mut ctx = CycleContext::default();
        assert_eq!(ctx.backoff_remaining(now), None);

        ctx.note_rate_limit(&ApiError::RateLimited { retry_after_secs: None }, now);
        assert_eq!(ctx.backoff_remaining(now), None);

        ctx.note_rate_limit(&ApiError::RateLimited { retry_after_secs: Some(60) }, now);
        ctx.note_rate_limit(&ApiError::RateLimited { retry_after_secs: Some(30) }, now);
        ctx.note_rate_limit(&ApiError::Unauthorized, now);
        assert_eq!(ctx.backoff_remaining(now), Some(Duration::from_secs(60)));
        assert_eq!(
            ctx.backoff_remaining(now + Duration::from_secs(45)),
            Some(Duration::from_secs(15))
        );
        assert_eq!(ctx.backoff_remaining(now + Duration::from_secs(60)), None);
    }

    #[test]
    fn state_guard_resets_to_idle() {
        let (state, rx) = watch::channel(CycleState::Idle);
        {
            let _guard = StateGuard::enter(&state);
            assert_eq!(*rx.borrow(), CycleState::Refreshing);
        }
        assert_eq!(*rx.borrow(), CycleState::Idle);
    }
}
