//! End-of-run counters of the quality gates.
use std::fmt;

use crate::pipeline::budget::StopReason;

/// Counts of the table-filling quality gates, in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutStatistics {
    pub events_read: u64,
    /// Non-finite zenith, azimuth or wobble offset
    pub invalid_pointing: u64,
    pub no_simulation_truth: u64,
    /// True energy not finite and positive
    pub invalid_truth: u64,
    pub wobble_offset: u64,
    pub multiplicity: u64,
    pub reconstruction_failed: u64,
    pub core_error: u64,
    /// Events whose images entered at least one table
    pub events_filled: u64,
    pub images_filled: u64,
    pub stop: StopReason,
}

impl Default for CutStatistics {
    fn default() -> Self {
        Self {
            events_read: 0,
            invalid_pointing: 0,
            no_simulation_truth: 0,
            invalid_truth: 0,
            wobble_offset: 0,
            multiplicity: 0,
            reconstruction_failed: 0,
            core_error: 0,
            events_filled: 0,
            images_filled: 0,
            stop: StopReason::Completed,
        }
    }
}

impl CutStatistics {
    /// Events removed by any gate.
    pub fn rejected(&self) -> u64 {
        self.invalid_pointing
            + self.no_simulation_truth
            + self.invalid_truth
            + self.wobble_offset
            + self.multiplicity
            + self.reconstruction_failed
            + self.core_error
    }
}

impl fmt::Display for CutStatistics {
    /// Compact by default; multi-line with the alternate flag (`{:#}`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Table filling: cut statistics")?;
            writeln!(f, "-----------------------------")?;
            writeln!(f, "events read           : {}", self.events_read)?;
            writeln!(f, "invalid pointing      : {}", self.invalid_pointing)?;
            writeln!(f, "no simulation truth   : {}", self.no_simulation_truth)?;
            writeln!(f, "invalid true energy   : {}", self.invalid_truth)?;
            writeln!(f, "wobble offset         : {}", self.wobble_offset)?;
            writeln!(f, "image multiplicity    : {}", self.multiplicity)?;
            writeln!(f, "reconstruction failed : {}", self.reconstruction_failed)?;
            writeln!(f, "core position error   : {}", self.core_error)?;
            writeln!(f, "events filled         : {}", self.events_filled)?;
            writeln!(f, "images filled         : {}", self.images_filled)?;
            write!(f, "run                   : {}", self.stop)
        } else {
            write!(
                f,
                "read={}, bad_pointing={}, no_truth={}, bad_truth={}, wobble={}, multiplicity={}, reco_failed={}, core_error={}, filled={} ({} images), {}",
                self.events_read,
                self.invalid_pointing,
                self.no_simulation_truth,
                self.invalid_truth,
                self.wobble_offset,
                self.multiplicity,
                self.reconstruction_failed,
                self.core_error,
                self.events_filled,
                self.images_filled,
                self.stop
            )
        }
    }
}

/// Counts of the lookup run outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupStatistics {
    pub events_read: u64,
    pub estimated: u64,
    /// Non-finite zenith, azimuth or wobble offset
    pub invalid_input: u64,
    pub multiplicity: u64,
    pub reconstruction_failed: u64,
    pub no_table_estimate: u64,
    /// Telescope lookups that read beyond the table axes
    pub clamped_lookups: u64,
    pub energy_outliers: u64,
    pub stop: StopReason,
}

impl Default for LookupStatistics {
    fn default() -> Self {
        Self {
            events_read: 0,
            estimated: 0,
            invalid_input: 0,
            multiplicity: 0,
            reconstruction_failed: 0,
            no_table_estimate: 0,
            clamped_lookups: 0,
            energy_outliers: 0,
            stop: StopReason::Completed,
        }
    }
}

impl fmt::Display for LookupStatistics {
    /// Compact by default; multi-line with the alternate flag (`{:#}`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Table lookup: event statistics")?;
            writeln!(f, "------------------------------")?;
            writeln!(f, "events read           : {}", self.events_read)?;
            writeln!(f, "estimated             : {}", self.estimated)?;
            writeln!(f, "invalid input         : {}", self.invalid_input)?;
            writeln!(f, "image multiplicity    : {}", self.multiplicity)?;
            writeln!(f, "reconstruction failed : {}", self.reconstruction_failed)?;
            writeln!(f, "no table estimate     : {}", self.no_table_estimate)?;
            writeln!(f, "clamped lookups       : {}", self.clamped_lookups)?;
            writeln!(f, "energy outliers       : {}", self.energy_outliers)?;
            write!(f, "run                   : {}", self.stop)
        } else {
            write!(
                f,
                "read={}, estimated={}, invalid={}, multiplicity={}, reco_failed={}, no_table={}, clamped={}, outliers={}, {}",
                self.events_read,
                self.estimated,
                self.invalid_input,
                self.multiplicity,
                self.reconstruction_failed,
                self.no_table_estimate,
                self.clamped_lookups,
                self.energy_outliers,
                self.stop
            )
        }
    }
}

#[cfg(test)]
mod cuts_tests {
    use super::*;

    #[test]
    fn display_forms() {
        let stats = CutStatistics {
            events_read: 10,
            invalid_pointing: 1,
            multiplicity: 3,
            core_error: 1,
            events_filled: 5,
            images_filled: 17,
            ..Default::default()
        };
        assert_eq!(stats.rejected(), 5);
        let compact = format!("{stats}");
        assert!(compact.starts_with("read=10, "));
        assert!(!compact.contains('\n'));
        let pretty = format!("{stats:#}");
        assert_eq!(pretty.lines().count(), 13);
        assert!(pretty.contains("invalid pointing      : 1"));
        assert!(pretty.contains("core position error   : 1"));
    }

    #[test]
    fn lookup_display() {
        let stats = LookupStatistics {
            events_read: 5,
            estimated: 4,
            stop: StopReason::EventLimit,
            ..Default::default()
        };
        assert!(format!("{stats}").ends_with("event limit reached"));
        assert!(format!("{stats:#}").contains("estimated             : 4"));
    }
}
