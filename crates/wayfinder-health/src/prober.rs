//! Batch prober — bounded parallel probes under a batch deadline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use wayfinder_core::{FailureKind, GatewayRecord, ProbeResult};

use crate::transport::ProbeTransport;

/// Counts for one probe batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSummary {
    pub healthy: usize,
    pub failed: usize,
    pub batch_timed_out: usize,
}

impl ProbeSummary {
    pub fn of(results: &[ProbeResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result.failure {
                None => summary.healthy += 1,
                Some(FailureKind::BatchTimeout) => summary.batch_timed_out += 1,
                Some(_) => summary.failed += 1,
            }
        }
        summary
    }
}

/// Probes candidate sets through a [`ProbeTransport`].
#[derive(Clone)]
pub struct HealthProber {
    transport: Arc<dyn ProbeTransport>,
    max_parallelism: usize,
}

impl HealthProber {
    pub fn new(transport: Arc<dyn ProbeTransport>, max_parallelism: usize) -> Self {
        Self {
            transport,
            max_parallelism: max_parallelism.max(1),
        }
    }

    /// Probe every candidate; the result has one entry per candidate, in
    /// input order.
    ///
    /// Each probe is cancelled on its own `per_probe_timeout`. When
    /// `batch_timeout` elapses, all outstanding probes are aborted and
    /// recorded as [`FailureKind::BatchTimeout`].
    pub async fn probe(
        &self,
        candidates: &[GatewayRecord],
        per_probe_timeout: Duration,
        batch_timeout: Duration,
    ) -> Vec<ProbeResult> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + batch_timeout;
        let semaphore = Arc::new(Semaphore::new(self.max_parallelism));
        let mut tasks = JoinSet::new();

        for (index, candidate) in candidates.iter().enumerate() {
            let gateway = candidate.id.clone();
            let transport = self.transport.clone();
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, ProbeResult::failed(gateway, FailureKind::Aborted));
                };
                let outcome =
                    tokio::time::timeout(per_probe_timeout, transport.probe(&gateway, per_probe_timeout))
                        .await;
                let result = match outcome {
                    Ok(Ok(latency)) => {
                        ProbeResult::healthy(gateway, latency.as_millis().min(u64::MAX as u128) as u64)
                    }
                    Ok(Err(kind)) => ProbeResult::failed(gateway, kind),
                    Err(_) => ProbeResult::failed(gateway, FailureKind::Timeout),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<ProbeResult>> = vec![None; candidates.len()];
        let mut deadline_hit = false;

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((index, result)))) => {
                    if let Some(kind) = result.failure {
                        debug!(gateway = %result.gateway, ?kind, "probe failed");
                    }
                    slots[index] = Some(result);
                }
                Ok(Some(Err(e))) => warn!(error = %e, "probe task did not complete"),
                Ok(None) => break,
                Err(_) => {
                    deadline_hit = true;
                    tasks.abort_all();
                    break;
                }
            }
        }

        let results: Vec<ProbeResult> = slots
            .into_iter()
            .zip(candidates)
            .map(|(slot, candidate)| {
                slot.unwrap_or_else(|| {
                    let kind = if deadline_hit {
                        FailureKind::BatchTimeout
                    } else {
                        FailureKind::Aborted
                    };
                    ProbeResult::failed(candidate.id.clone(), kind)
                })
            })
            .collect();

        let summary = ProbeSummary::of(&results);
        info!(
            candidates = candidates.len(),
            healthy = summary.healthy,
            failed = summary.failed,
            batch_timed_out = summary.batch_timed_out,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "probe batch complete"
        );
        results
    }
}
