//! Named timers that deliver [`Tick`]s to the scheduler.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::state::Tick;

/// Periodic refresh timer.
pub const REFRESH_TIMER: &str = "wayfinder.refresh";
/// One-shot retry timer, replaced on every failure.
pub const RETRY_TIMER: &str = "wayfinder.retry";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSpec {
    /// Fire once after the delay.
    Once(Duration),
    /// Fire every period, first after one period.
    Every(Duration),
}

/// The timer/alarm collaborator.
///
/// Registering a name that is already registered replaces the old timer.
/// Cancelling an unknown name is a no-op.
pub trait TimerService: Send + Sync {
    fn register(&self, name: &str, spec: TimerSpec);
    fn cancel(&self, name: &str);
}

/// Tokio-backed timers: one task per name, ticks sent over an mpsc channel.
///
/// Must be used from within a Tokio runtime.
pub struct TokioTimers {
    ticks: mpsc::Sender<Tick>,
    slots: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TokioTimers {
    pub fn new(ticks: mpsc::Sender<Tick>) -> Self {
        Self {
            ticks,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Names with a live timer task.
    pub fn active(&self) -> Vec<String> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = slots
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl TimerService for TokioTimers {
    fn register(&self, name: &str, spec: TimerSpec) {
        let tick = Tick::for_timer(name);
        let tx = self.ticks.clone();
        let timer = name.to_string();

        let handle = tokio::spawn(async move {
            match spec {
                TimerSpec::Once(delay) => {
                    tokio::time::sleep(delay).await;
                    trace!(%timer, "timer fired");
                    let _ = tx.send(tick).await;
                }
                TimerSpec::Every(period) => {
                    let start = tokio::time::Instant::now() + period;
                    let mut interval = tokio::time::interval_at(start, period);
                    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                    loop {
                        interval.tick().await;
                        trace!(%timer, "timer fired");
                        if tx.send(tick).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = slots.insert(name.to_string(), handle) {
            old.abort();
        }
        debug!(timer = %name, ?spec, "timer registered");
    }

    fn cancel(&self, name: &str) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slots.remove(name) {
            handle.abort();
            debug!(timer = %name, "timer cancelled");
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        let slots = self.slots.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in slots.drain() {
            handle.abort();
        }
    }
}
