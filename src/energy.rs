use crate::sampler::SampleWindow;
use crate::stats;
use crate::summary::{UnitResult, UnitStatus};
use crate::unit::UnitId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct EnergyCalculator {
    poll_interval_s: f64,
}

impl EnergyCalculator {
    pub fn new(poll_interval_s: f64) -> Self {
        Self { poll_interval_s }
    }

    /// Joules represented by `samples`, one poll interval each.
    pub fn energy_j(&self, watts: impl IntoIterator<Item = f64>) -> f64 {
        watts.into_iter().map(|w| w * self.poll_interval_s).sum()
    }

    pub fn attribute(&self, unit: UnitId, window: &SampleWindow) -> UnitResult {
        let duration_s = window.duration().as_secs_f64();
        let sample_count = window.samples.len();
        let degenerate = if duration_s <= 0.0 {
            Some("zero-duration window")
        } else if sample_count == 0 {
            Some("no samples collected in window")
        } else {
            None
        };
        let (status, energy_j, avg_power_w) = match degenerate {
            Some(reason) => (UnitStatus::Invalid(reason.to_string()), 0.0, None),
            None => {
                let energy_j = self.energy_j(window.samples.iter().map(|s| s.watts));
                (UnitStatus::Measured, energy_j, Some(energy_j / duration_s))
            }
        };
        UnitResult {
            unit,
            status,
            duration_s,
            energy_j,
            avg_power_w,
            sample_count,
            skipped_ticks: window.skipped_ticks,
            stats: stats::summarize(&window.samples),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub duration_s: f64,
    pub energy_j: f64,
    /// Total energy over total duration; `None` when that duration is zero.
    pub avg_power_w: Option<f64>,
    pub measured: usize,
    pub invalid: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Sums every unit that ran to completion. Invalid units add their
/// duration at zero energy; failed and skipped units add nothing.
pub fn totals(results: &[UnitResult]) -> Totals {
    let mut totals = Totals::default();
    for result in results {
        match result.status {
            UnitStatus::Measured => {
                totals.measured += 1;
                totals.duration_s += result.duration_s;
                totals.energy_j += result.energy_j;
            }
            UnitStatus::Invalid(_) => {
                totals.invalid += 1;
                totals.duration_s += result.duration_s;
            }
            UnitStatus::Failed(_) => totals.failed += 1,
            UnitStatus::Skipped(_) => totals.skipped += 1,
        }
    }
    if totals.duration_s > 0.0 {
        totals.avg_power_w = Some(totals.energy_j / totals.duration_s);
    }
    totals
}
