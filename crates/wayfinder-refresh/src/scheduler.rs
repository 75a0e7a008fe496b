//! Refresh scheduler — the single entry point for refresh triggers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use wayfinder_core::{GatewayCache, RankPolicy, WayfinderConfig, epoch_millis};
use wayfinder_health::HealthProber;
use wayfinder_rank::rank;
use wayfinder_registry::RegistryReader;
use wayfinder_state::CacheStore;

use crate::backoff::Backoff;
use crate::error::{RefreshError, RefreshResult};
use crate::state::{RefreshState, RefreshStatus, Tick, TickOutcome};
use crate::timer::{REFRESH_TIMER, RETRY_TIMER, TimerService, TimerSpec};

/// Tunables for one scheduler.
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub interval: Duration,
    pub probe_timeout: Duration,
    pub batch_timeout: Duration,
    pub policy: RankPolicy,
    pub backoff: Backoff,
}

impl RefreshSettings {
    pub fn from_config(config: &WayfinderConfig) -> Self {
        Self {
            interval: config.refresh.interval(),
            probe_timeout: config.probe.timeout(),
            batch_timeout: config.probe.batch_timeout(),
            policy: config.rank.clone(),
            backoff: Backoff::from_config(&config.refresh),
        }
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self::from_config(&WayfinderConfig::default())
    }
}

/// Orchestrates registry → probe → rank → store cycles.
pub struct RefreshScheduler {
    reader: RegistryReader,
    prober: HealthProber,
    store: CacheStore,
    timers: Arc<dyn TimerService>,
    settings: RefreshSettings,
    status: Mutex<RefreshStatus>,
}

/// Marks a cycle in flight; restores the prior state if the cycle future
/// is dropped before it records an outcome.
struct InFlight<'a> {
    status: &'a Mutex<RefreshStatus>,
    resume: RefreshState,
    armed: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
            if status.state == RefreshState::Refreshing {
                status.state = self.resume;
            }
        }
    }
}

impl RefreshScheduler {
    pub fn new(
        reader: RegistryReader,
        prober: HealthProber,
        store: CacheStore,
        timers: Arc<dyn TimerService>,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            reader,
            prober,
            store,
            timers,
            settings,
            status: Mutex::new(RefreshStatus::default()),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn status(&self) -> RefreshStatus {
        self.lock_status().clone()
    }

    fn lock_status(&self) -> MutexGuard<'_, RefreshStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the periodic timer.
    ///
    /// Returns [`Tick::Manual`] when there is no cached snapshot yet, so the
    /// caller can trigger the first refresh immediately.
    pub fn start(&self) -> Option<Tick> {
        self.timers
            .register(REFRESH_TIMER, TimerSpec::Every(self.settings.interval));
        info!(
            interval_secs = self.settings.interval.as_secs(),
            "refresh scheduler started"
        );
        self.store.get().is_empty().then_some(Tick::Manual)
    }

    /// Handle one trigger.
    ///
    /// A tick that arrives while a cycle is in flight is dropped and reports
    /// [`TickOutcome::Skipped`]. Failures leave the cache untouched and
    /// register the next retry.
    pub async fn handle_tick(&self, tick: Tick) -> TickOutcome {
        let mut guard = {
            let mut status = self.lock_status();
            if status.state == RefreshState::Refreshing {
                debug!(?tick, "refresh already in flight; tick dropped");
                return TickOutcome::Skipped;
            }
            let resume = status.state;
            status.state = RefreshState::Refreshing;
            InFlight {
                status: &self.status,
                resume,
                armed: true,
            }
        };

        let attempt = self.lock_status().attempt;
        info!(?tick, attempt, "refresh cycle starting");
        let started = Instant::now();
        let result = self.run_cycle().await;
        guard.armed = false;

        let mut status = self.lock_status();
        match result {
            Ok(cache) => {
                status.state = RefreshState::Idle;
                status.attempt = 0;
                status.next_retry_at_ms = None;
                status.last_error = None;
                status.last_success_ms = Some(cache.built_at_ms);
                drop(status);
                self.timers.cancel(RETRY_TIMER);

                info!(
                    version = cache.version,
                    gateways = cache.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "refresh cycle complete"
                );
                TickOutcome::Refreshed {
                    version: cache.version,
                    gateways: cache.len(),
                }
            }
            Err(e) => {
                let backoff = &self.settings.backoff;
                status.attempt = status.attempt.saturating_add(1);
                let attempt = status.attempt;
                let retry_in = backoff.delay(attempt);
                status.state = if backoff.is_degraded(attempt) {
                    RefreshState::Degraded
                } else {
                    RefreshState::RetryScheduled
                };
                status.next_retry_at_ms =
                    Some(epoch_millis().saturating_add(retry_in.as_millis() as u64));
                status.last_error = Some(e.to_string());
                let state = status.state;
                drop(status);
                self.timers.register(RETRY_TIMER, TimerSpec::Once(retry_in));

                warn!(
                    error = %e,
                    attempt,
                    ?state,
                    retry_in_secs = retry_in.as_secs(),
                    "refresh cycle failed; keeping previous snapshot"
                );
                TickOutcome::Failed { attempt, retry_in }
            }
        }
    }

    async fn run_cycle(&self) -> RefreshResult<Arc<GatewayCache>> {
        let snapshot = self.reader.fetch_candidates().await?;
        let probes = self
            .prober
            .probe(
                &snapshot.candidates,
                self.settings.probe_timeout,
                self.settings.batch_timeout,
            )
            .await;

        let mut cache = rank(&snapshot.candidates, &probes, &self.settings.policy);
        cache.source_hash = snapshot.source_hash;

        // A stale list beats none.
        let previous = self.store.get();
        if cache.is_empty() && !previous.is_empty() {
            return Err(RefreshError::PolicyUnsatisfiable {
                previous: previous.len(),
            });
        }

        Ok(self.store.set(cache)?)
    }

    /// Drive the scheduler from a tick channel until shutdown.
    ///
    /// Each tick runs on its own task so overlapping triggers reach the
    /// single-flight check instead of queueing behind the running cycle.
    pub async fn run(
        self: Arc<Self>,
        mut ticks: mpsc::Receiver<Tick>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut cycles = JoinSet::new();
        debug!("refresh loop starting");

        loop {
            tokio::select! {
                tick = ticks.recv() => {
                    let Some(tick) = tick else { break };
                    let scheduler = self.clone();
                    cycles.spawn(async move { scheduler.handle_tick(tick).await });
                }
                Some(joined) = cycles.join_next(), if !cycles.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "refresh task did not complete");
                    }
                }
                _ = shutdown.changed() => {
                    debug!("refresh loop shutting down");
                    break;
                }
            }
        }

        cycles.shutdown().await;
        self.timers.cancel(RETRY_TIMER);
        self.timers.cancel(REFRESH_TIMER);
        info!("refresh scheduler stopped");
    }
}
