use crate::energy::{self, Totals};
use crate::stats::WindowStats;
use crate::unit::UnitId;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Why a unit does or does not contribute to the totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "kebab-case")]
pub enum UnitStatus {
    Measured,
    /// Zero-duration or zero-sample window. Not a fault.
    Invalid(String),
    Failed(String),
    Skipped(String),
}

impl UnitStatus {
    pub fn is_measured(&self) -> bool {
        matches!(self, UnitStatus::Measured)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitResult {
    pub unit: UnitId,
    pub status: UnitStatus,
    pub duration_s: f64,
    pub energy_j: f64,
    /// Defined only for measured units.
    pub avg_power_w: Option<f64>,
    pub sample_count: usize,
    pub skipped_ticks: usize,
    pub stats: Option<WindowStats>,
}

impl UnitResult {
    pub fn failed(unit: UnitId, reason: impl Into<String>) -> Self {
        Self::unmeasured(unit, UnitStatus::Failed(reason.into()))
    }

    pub fn skipped(unit: UnitId, reason: impl Into<String>) -> Self {
        Self::unmeasured(unit, UnitStatus::Skipped(reason.into()))
    }

    fn unmeasured(unit: UnitId, status: UnitStatus) -> Self {
        Self {
            unit,
            status,
            duration_s: 0.0,
            energy_j: 0.0,
            avg_power_w: None,
            sample_count: 0,
            skipped_ticks: 0,
            stats: None,
        }
    }

    pub fn report_line(&self) -> String {
        match &self.status {
            UnitStatus::Measured => format!(
                "{}: Duration={:.3}s | Energy={:.3}J | Avg Power={:.2}W",
                self.unit.name,
                self.duration_s,
                self.energy_j,
                self.avg_power_w.unwrap_or_default(),
            ),
            UnitStatus::Invalid(reason) => format!(
                "[INVALID] {}: Duration={:.3}s | {reason}",
                self.unit.name, self.duration_s
            ),
            UnitStatus::Failed(reason) => format!("[FAIL] {}: {reason}", self.unit.name),
            UnitStatus::Skipped(reason) => format!("[SKIP] {}: {reason}", self.unit.name),
        }
    }
}

/// Per-unit results in profiling order plus run totals. Built once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    run_id: String,
    model: String,
    units: Vec<UnitResult>,
    totals: Totals,
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>, model: impl Into<String>, units: Vec<UnitResult>) -> Self {
        let totals = energy::totals(&units);
        Self {
            run_id: run_id.into(),
            model: model.into(),
            units,
            totals,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn units(&self) -> &[UnitResult] {
        &self.units
    }

    pub fn totals(&self) -> &Totals {
        &self.totals
    }

    pub fn measured(&self) -> impl Iterator<Item = &UnitResult> {
        self.units.iter().filter(|r| r.status.is_measured())
    }

    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "===== Layer-wise Profiling ({}) =====", self.model);
        for result in &self.units {
            let _ = writeln!(out, "{}", result.report_line());
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "===== Total Summary =====");
        let _ = writeln!(out, "Total Duration: {:.3} s", self.totals.duration_s);
        let _ = writeln!(out, "Total Energy:   {:.3} J", self.totals.energy_j);
        match self.totals.avg_power_w {
            Some(watts) => {
                let _ = writeln!(out, "Avg Total Power: {watts:.2} W");
            }
            None => {
                let _ = writeln!(out, "Avg Total Power: N/A");
            }
        }
        let _ = writeln!(
            out,
            "Units: {} measured, {} invalid, {} failed, {} skipped",
            self.totals.measured, self.totals.invalid, self.totals.failed, self.totals.skipped
        );
        out
    }
}
