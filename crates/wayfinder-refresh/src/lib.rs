//! wayfinder-refresh — orchestrates registry → probe → rank → store cycles.
//!
//! The [`RefreshScheduler`] owns the refresh state machine:
//!
//! ```text
//! Idle ──tick──▶ Refreshing ──ok──▶ Idle
//!                   │ err
//!                   ▼
//!            RetryScheduled ──retry tick──▶ Refreshing
//!                   │ attempts exhausted
//!                   ▼
//!               Degraded (retries at the long interval until a success)
//! ```
//!
//! Every trigger arrives as a [`Tick`] at [`RefreshScheduler::handle_tick`].
//! Timers are owned by a [`TimerService`]; the scheduler only computes
//! delays and registers or cancels named timers.

pub mod backoff;
pub mod error;
pub mod scheduler;
pub mod state;
pub mod timer;

pub use backoff::Backoff;
pub use error::{RefreshError, RefreshResult};
pub use scheduler::{RefreshScheduler, RefreshSettings};
pub use state::{RefreshState, RefreshStatus, Tick, TickOutcome};
pub use timer::{REFRESH_TIMER, RETRY_TIMER, TimerService, TimerSpec, TokioTimers};
