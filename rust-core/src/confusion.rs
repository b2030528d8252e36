//! Confusion-matrix tallies: verdicts cross-tabulated against ground truth.
//!
//! Every cell carries a sample count and the summed wake time of those
//! samples, so reports can express false wakes both as a rate and as time
//! the device spent awake for nothing. Rates are `None` when their
//! denominator is zero.

use std::fmt;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::classifier::Verdict;
use crate::types::WakeSample;

/// Count and summed wake time for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tally {
    pub count: usize,
    pub wake_time_ms: u64,
}

impl Tally {
    pub fn record(&mut self, sample: &WakeSample) {
        self.count += 1;
        self.wake_time_ms += sample.wake_time_ms as u64;
    }
}

impl Add for Tally {
    type Output = Tally;

    fn add(self, rhs: Tally) -> Tally {
        Tally {
            count: self.count + rhs.count,
            wake_time_ms: self.wake_time_ms + rhs.wake_time_ms,
        }
    }
}

impl AddAssign for Tally {
    fn add_assign(&mut self, rhs: Tally) {
        *self = *self + rhs;
    }
}

/// Accepted / rejected / punted cells for one ground-truth class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VerdictCounts {
    pub accepted: Tally,
    pub rejected: Tally,
    pub punted: Tally,
}

impl VerdictCounts {
    pub fn cell_mut(&mut self, verdict: Verdict) -> &mut Tally {
        match verdict {
            Verdict::Accept => &mut self.accepted,
            Verdict::Reject => &mut self.rejected,
            Verdict::Pass => &mut self.punted,
        }
    }

    pub fn total(&self) -> Tally {
        self.accepted + self.rejected + self.punted
    }
}

impl AddAssign for VerdictCounts {
    fn add_assign(&mut self, rhs: VerdictCounts) {
        self.accepted += rhs.accepted;
        self.rejected += rhs.rejected;
        self.punted += rhs.punted;
    }
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}

/// `{confirmed, unconfirmed} × {accepted, rejected, punted}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub confirmed: VerdictCounts,
    pub unconfirmed: VerdictCounts,
}

impl ConfusionMatrix {
    pub fn record(&mut self, sample: &WakeSample, verdict: Verdict) {
        let class = if sample.confirmed {
            &mut self.confirmed
        } else {
            &mut self.unconfirmed
        };
        class.cell_mut(verdict).record(sample);
    }

    pub fn total_confirmed(&self) -> usize {
        self.confirmed.total().count
    }

    pub fn total_unconfirmed(&self) -> usize {
        self.unconfirmed.total().count
    }

    pub fn total(&self) -> usize {
        self.total_confirmed() + self.total_unconfirmed()
    }

    /// Every cell of both classes adds up to the given input counts.
    pub fn is_conserved(&self, confirmed_input: usize, unconfirmed_input: usize) -> bool {
        self.total_confirmed() == confirmed_input && self.total_unconfirmed() == unconfirmed_input
    }

    /// Confirmed samples accepted, over all confirmed.
    pub fn true_accept_rate(&self) -> Option<f64> {
        ratio(self.confirmed.accepted.count, self.total_confirmed())
    }

    /// Confirmed samples rejected, over all confirmed.
    pub fn false_reject_rate(&self) -> Option<f64> {
        ratio(self.confirmed.rejected.count, self.total_confirmed())
    }

    /// Unconfirmed samples accepted, over all unconfirmed.
    pub fn false_accept_rate(&self) -> Option<f64> {
        ratio(self.unconfirmed.accepted.count, self.total_unconfirmed())
    }

    /// Unconfirmed samples rejected, over all unconfirmed.
    pub fn true_reject_rate(&self) -> Option<f64> {
        ratio(self.unconfirmed.rejected.count, self.total_unconfirmed())
    }

    /// Share of all samples left uncommitted.
    pub fn punt_rate(&self) -> Option<f64> {
        ratio(
            self.confirmed.punted.count + self.unconfirmed.punted.count,
            self.total(),
        )
    }

    /// Confirmed share of everything accepted.
    pub fn precision(&self) -> Option<f64> {
        let accepted = self.confirmed.accepted.count + self.unconfirmed.accepted.count;
        ratio(self.confirmed.accepted.count, accepted)
    }

    /// Wake time spent on accepted false wakes.
    pub fn false_wake_time_accepted_ms(&self) -> u64 {
        self.unconfirmed.accepted.wake_time_ms
    }

    /// Wake time saved by rejecting false wakes.
    pub fn false_wake_time_avoided_ms(&self) -> u64 {
        self.unconfirmed.rejected.wake_time_ms
    }
}

impl AddAssign for ConfusionMatrix {
    fn add_assign(&mut self, rhs: ConfusionMatrix) {
        self.confirmed += rhs.confirmed;
        self.unconfirmed += rhs.unconfirmed;
    }
}

/// Percentage, or `n/a` when undefined.
pub struct Percent(pub Option<f64>);

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(r) => write!(f, "{:6.2}%", r * 100.0),
            None => write!(f, "{:>7}", "n/a"),
        }
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<12} {:>9} {:>9} {:>9} {:>9}", "", "accepted", "rejected", "punted", "total")?;
        for (label, c) in [("confirmed", &self.confirmed), ("unconfirmed", &self.unconfirmed)] {
            writeln!(
                f,
                "{:<12} {:>9} {:>9} {:>9} {:>9}",
                label,
                c.accepted.count,
                c.rejected.count,
                c.punted.count,
                c.total().count
            )?;
        }
        writeln!(
            f,
            "true accept {}  false accept {}  punted {}",
            Percent(self.true_accept_rate()),
            Percent(self.false_accept_rate()),
            Percent(self.punt_rate())
        )?;
        write!(
            f,
            "false wake time accepted {} ms, avoided {} ms",
            self.false_wake_time_accepted_ms(),
            self.false_wake_time_avoided_ms()
        )
    }
}
