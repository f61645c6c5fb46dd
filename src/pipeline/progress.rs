//! Progress reporting of event loops.
//!
//! [`RunProgress`] counts the events of one fill or lookup run and keeps an
//! [`EventPace`], the event rate smoothed over recent events. With the
//! `progress` feature the pace is shown next to an `indicatif` bar; in every
//! build the final pace is logged at debug level when the run finishes.
use std::fmt;
use std::time::Instant;

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};
#[cfg(feature = "progress")]
use std::time::Duration;

/// Weight of the newest event in the smoothed seconds-per-event.
const PACE_SMOOTHING: f64 = 0.2;

/// Event rate of a running loop.
///
/// The seconds spent per event are smoothed with
/// `s ← k·dt + (1 − k)·s`, `k = 0.2`, starting from the first event.
#[derive(Debug, Clone, Copy)]
pub struct EventPace {
    started: Instant,
    previous: Instant,
    events: u64,
    seconds_per_event: f64,
}

impl EventPace {
    pub fn start(now: Instant) -> Self {
        Self {
            started: now,
            previous: now,
            events: 0,
            seconds_per_event: 0.0,
        }
    }

    /// Mark one event done at `now`, returning the seconds it took.
    pub fn record(&mut self, now: Instant) -> f64 {
        let dt = now.saturating_duration_since(self.previous).as_secs_f64();
        self.previous = now;
        self.events += 1;
        self.seconds_per_event = if self.events == 1 {
            dt
        } else {
            PACE_SMOOTHING * dt + (1.0 - PACE_SMOOTHING) * self.seconds_per_event
        };
        dt
    }

    pub fn events(&self) -> u64 {
        self.events
    }

    /// Smoothed events per second; 0 before any event or for instant events.
    pub fn rate(&self) -> f64 {
        if self.events == 0 || self.seconds_per_event <= 0.0 {
            0.0
        } else {
            self.seconds_per_event.recip()
        }
    }

    /// Seconds between the start and the last recorded event.
    pub fn elapsed(&self) -> f64 {
        self.previous
            .saturating_duration_since(self.started)
            .as_secs_f64()
    }
}

/// `"1.2k ev/s, 3400 events in 2.8s"`.
impl fmt::Display for EventPace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rate = self.rate();
        if rate >= 1e3 {
            write!(f, "{:.1}k ev/s", rate / 1e3)?;
        } else {
            write!(f, "{rate:.0} ev/s")?;
        }
        write!(f, ", {} events in {:.1}s", self.events, self.elapsed())
    }
}

/// Progress of one event loop.
pub struct RunProgress {
    pace: EventPace,
    #[cfg(feature = "progress")]
    bar: ProgressBar,
}

impl RunProgress {
    /// Start reporting; `total` is the expected number of events, if known.
    pub fn new(total: Option<u64>) -> Self {
        #[cfg(not(feature = "progress"))]
        let _ = total;
        Self {
            pace: EventPace::start(Instant::now()),
            #[cfg(feature = "progress")]
            bar: Self::bar(total),
        }
    }

    #[cfg(feature = "progress")]
    fn bar(total: Option<u64>) -> ProgressBar {
        let bar = match total {
            Some(n) => ProgressBar::new(n.max(1)),
            None => ProgressBar::new_spinner(),
        };
        let style = ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | ETA {eta_precise} | {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(200));
        bar
    }

    /// One more event processed.
    #[inline]
    pub fn inc(&mut self) {
        self.pace.record(Instant::now());
        #[cfg(feature = "progress")]
        {
            self.bar.set_message(self.pace.to_string());
            self.bar.inc(1);
        }
    }

    pub fn pace(&self) -> &EventPace {
        &self.pace
    }

    /// Close the bar and log the final pace under `message`.
    pub fn finish(self, message: &str) {
        #[cfg(feature = "progress")]
        {
            self.bar.disable_steady_tick();
            self.bar.finish_and_clear();
        }
        log::debug!("{message}: {}", self.pace);
    }
}
