//! Count-limited warnings.
//!
//! Per-event anomalies (values outside the table axes, noise levels far from any
//! catalogued level, ...) can repeat millions of times in a run. A [`WarningCounter`]
//! forwards the first [`MAX_LOGGED_WARNINGS`] occurrences of a category to
//! `log::warn!`, prints one suppression notice, and only counts the rest.
use crate::constants::MAX_LOGGED_WARNINGS;

#[derive(Debug, Clone)]
pub struct WarningCounter {
    category: &'static str,
    total: u64,
}

impl WarningCounter {
    pub fn new(category: &'static str) -> Self {
        Self { category, total: 0 }
    }

    /// Record one occurrence; the message is only built when it is logged.
    pub fn warn<F>(&mut self, message: F)
    where
        F: FnOnce() -> String,
    {
        self.total += 1;
        if self.total <= MAX_LOGGED_WARNINGS {
            log::warn!("{}: {}", self.category, message());
        } else if self.total == MAX_LOGGED_WARNINGS + 1 {
            log::warn!(
                "{}: more than {} warnings, further ones are only counted",
                self.category,
                MAX_LOGGED_WARNINGS
            );
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn category(&self) -> &'static str {
        self.category
    }

    /// Log the final count if anything was suppressed.
    pub fn report(&self) {
        if self.total > MAX_LOGGED_WARNINGS {
            log::warn!("{}: {} warnings in total", self.category, self.total);
        }
    }
}
