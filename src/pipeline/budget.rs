//! Run budget and cooperative cancellation.
//!
//! An event loop may stop early after `max_events` events, after `max_wall_time`,
//! or when the caller's `should_cancel` closure returns `true`. The budget is only
//! checked between events, so every event is either fully processed or not at all.
//! The closure and the wall clock are polled at most every [`POLL_INTERVAL`], which
//! keeps the cancellation latency independent of the per-event cost.
use std::fmt;
use std::time::{Duration, Instant};

use crate::lookup_params::LookupParams;

/// Minimum time between two calls of the cancellation closure.
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Why an event loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The event source was exhausted
    Completed,
    EventLimit,
    WallTime,
    Cancelled,
}

impl StopReason {
    #[inline]
    pub fn is_truncated(&self) -> bool {
        !matches!(self, StopReason::Completed)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Completed => write!(f, "completed"),
            StopReason::EventLimit => write!(f, "event limit reached"),
            StopReason::WallTime => write!(f, "wall-time limit reached"),
            StopReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunBudget {
    max_events: Option<u64>,
    max_wall_time: Option<Duration>,
    started: Instant,
    last_poll: Instant,
}

impl RunBudget {
    pub fn new(max_events: Option<u64>, max_wall_time: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            max_events,
            max_wall_time,
            started: now,
            last_poll: now,
        }
    }

    pub fn from_params(params: &LookupParams) -> Self {
        Self::new(params.max_events, params.max_wall_time)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Decide whether the loop may process one more event.
    ///
    /// Arguments
    /// -----------------
    /// * `processed`: events already processed.
    /// * `should_cancel`: caller-side cancellation request.
    ///
    /// Return
    /// ----------
    /// * `Some(reason)` if the loop must stop before the next event.
    pub fn check<F>(&mut self, processed: u64, should_cancel: &mut F) -> Option<StopReason>
    where
        F: FnMut() -> bool,
    {
        if self.max_events.is_some_and(|max| processed >= max) {
            return Some(StopReason::EventLimit);
        }
        if self.last_poll.elapsed() >= POLL_INTERVAL {
            self.last_poll = Instant::now();
            if should_cancel() {
                return Some(StopReason::Cancelled);
            }
            if self
                .max_wall_time
                .is_some_and(|limit| self.started.elapsed() >= limit)
            {
                return Some(StopReason::WallTime);
            }
        }
        None
    }
}
