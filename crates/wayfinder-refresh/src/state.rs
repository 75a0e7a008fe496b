//! Refresh state machine values.

use std::time::Duration;

use serde::Serialize;

use crate::timer::RETRY_TIMER;

/// Where the scheduler is in its cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    #[default]
    Idle,
    Refreshing,
    RetryScheduled,
    /// Retries exhausted; retrying at the long degraded interval.
    Degraded,
}

/// Snapshot of the scheduler's state, as reported to operators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStatus {
    pub state: RefreshState,
    /// Consecutive failed cycles; zero after any success.
    pub attempt: u32,
    /// Epoch milliseconds of the registered retry, if one is pending.
    pub next_retry_at_ms: Option<u64>,
    pub last_error: Option<String>,
    /// Epoch milliseconds of the last successful cycle.
    pub last_success_ms: Option<u64>,
}

/// A trigger delivered to the scheduler's single entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Periodic,
    Retry,
    /// Explicit trigger, e.g. first install or the `refresh` command.
    Manual,
}

impl Tick {
    /// The tick fired by the named timer.
    pub fn for_timer(name: &str) -> Self {
        if name == RETRY_TIMER {
            Tick::Retry
        } else {
            Tick::Periodic
        }
    }
}

/// What one call to `handle_tick` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Refreshed { version: u64, gateways: usize },
    Failed { attempt: u32, retry_in: Duration },
    /// A cycle was already in flight; nothing changed.
    Skipped,
}
