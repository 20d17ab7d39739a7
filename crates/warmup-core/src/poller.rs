//! Bounded readiness polling.
//!
//! The poller is a three-state machine: `Polling` until the first successful
//! probe (`Ready`) or until the retry budget is consumed (`Exhausted`). Both
//! terminal states are final. A failed probe with budget remaining costs one
//! retry and one `interval` of sleep; the failure that consumes the last
//! retry does not sleep.

use std::time::Duration;

use serde::Serialize;

use crate::error::{BootError, Result};
use crate::probe::Probe;

// ---------------------------------------------------------------------------
// PollState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Polling,
    Ready,
    Exhausted,
}

impl PollState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PollState::Polling)
    }
}

// ---------------------------------------------------------------------------
// RetryBudget
// ---------------------------------------------------------------------------

/// `0 <= retry_count <= max_retries` at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryBudget {
    max_retries: u32,
    retry_count: u32,
    interval: Duration,
}

impl RetryBudget {
    pub fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            retry_count: 0,
            interval,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Charge one failed attempt. Returns the resulting state.
    pub fn record_failure(&mut self) -> PollState {
        if self.retry_count < self.max_retries {
            self.retry_count += 1;
        }
        if self.is_exhausted() {
            PollState::Exhausted
        } else {
            PollState::Polling
        }
    }
}

// ---------------------------------------------------------------------------
// Sleeper
// ---------------------------------------------------------------------------

pub trait Sleeper {
    fn sleep(&mut self, interval: Duration);
}

#[derive(Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollReport {
    pub state: PollState,
    /// Probes issued, including the successful one.
    pub attempts: u32,
    pub sleeps: u32,
}

/// Probe until ready or until `budget` runs out.
///
/// A zero budget is already exhausted and probes nothing.
pub fn poll_until_ready<P, S>(
    probe: &mut P,
    mut budget: RetryBudget,
    sleeper: &mut S,
) -> Result<PollReport>
where
    P: Probe + ?Sized,
    S: Sleeper + ?Sized,
{
    let mut attempts = 0;
    let mut sleeps = 0;
    let mut state = if budget.is_exhausted() {
        PollState::Exhausted
    } else {
        PollState::Polling
    };

    while state == PollState::Polling {
        attempts += 1;
        let outcome = probe.probe();
        if outcome.is_ready() {
            tracing::info!(url = probe.target(), attempts, %outcome, "service is ready");
            state = PollState::Ready;
            break;
        }

        state = budget.record_failure();
        tracing::debug!(
            url = probe.target(),
            attempt = attempts,
            retry_count = budget.retry_count(),
            max_retries = budget.max_retries(),
            %outcome,
            "service not ready"
        );
        if state == PollState::Polling {
            tracing::info!(
                "waiting for service at {} ({}/{})",
                probe.target(),
                budget.retry_count(),
                budget.max_retries()
            );
            sleeper.sleep(budget.interval());
            sleeps += 1;
        }
    }

    if state == PollState::Exhausted {
        tracing::error!(url = probe.target(), attempts, "retry budget exhausted");
        return Err(BootError::ServiceUnavailable {
            url: probe.target().to_string(),
            attempts,
        });
    }

    Ok(PollReport {
        state,
        attempts,
        sleeps,
    })
}
