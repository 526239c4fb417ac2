use crate::config::Config;
use crate::energy::EnergyCalculator;
use crate::error::ConfigError;
use crate::event::{RecordedSample, UnitEvent, UnitTrace};
use crate::executor::{Timing, UnitExecutor};
use crate::sampler::{PowerSampler, SampleWindow};
use crate::summary::{RunSummary, UnitResult, UnitStatus};
use crate::telemetry::TelemetrySource;
use crate::unit::ExecutionUnit;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, info_span, warn};

/// Everything one profiling run produced.
#[derive(Debug)]
pub struct ProfileRun {
    pub summary: RunSummary,
    pub traces: Vec<UnitTrace>,
    pub events: Vec<UnitEvent>,
}

/// Profiles units one at a time, each inside its own sampling window.
pub struct Profiler {
    config: Config,
    sampler: PowerSampler,
    executor: UnitExecutor,
    calculator: EnergyCalculator,
}

impl Profiler {
    pub fn new(config: Config, source: Arc<dyn TelemetrySource>) -> Result<Self, ConfigError> {
        config.validate()?;
        let poll_interval = config.sampler.poll_interval()?;
        let executor = UnitExecutor::new(
            config.profiler.repeats_per_unit,
            config.profiler.warmup_repeats,
        );
        Ok(Self {
            sampler: PowerSampler::new(source, poll_interval),
            executor,
            calculator: EnergyCalculator::new(config.sampler.poll_interval_seconds),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Profiles `units` in order and builds the run summary.
    ///
    /// Only an unknown name in `profiler.units` is fatal, and it is caught
    /// before any unit runs. Unit-level faults are recorded and skipped past.
    pub fn run<U: ExecutionUnit>(
        &mut self,
        run_id: &str,
        model: &str,
        units: &mut [U],
    ) -> Result<ProfileRun, ConfigError> {
        let names: Vec<&str> = units.iter().map(|u| u.id().name.as_str()).collect();
        self.config.validate_unit_list(&names)?;
        let selected = self.config.profiler.units.clone();
        let cooldown = Duration::from_millis(self.config.profiler.cooldown_ms);
        let epoch = Instant::now();

        let mut results = Vec::with_capacity(units.len());
        let mut traces = Vec::new();
        let mut events = Vec::with_capacity(units.len());
        let mut first = true;
        for unit in units.iter_mut() {
            if !selected.is_empty() && !selected.contains(&unit.id().name) {
                continue;
            }
            if !first && !cooldown.is_zero() {
                std::thread::sleep(cooldown);
            }
            first = false;

            let span = info_span!("unit", name = %unit.id().name, index = unit.id().index);
            let _guard = span.enter();
            let (result, window) = self.profile_unit(unit);
            log_result(&result);

            let offset = |at: Instant| at.saturating_duration_since(epoch).as_secs_f64();
            if let Some(window) = &window {
                traces.push(UnitTrace {
                    unit: result.unit.clone(),
                    samples: window
                        .samples
                        .iter()
                        .map(|s| RecordedSample {
                            timestamp_s: offset(s.at),
                            watts: s.watts,
                        })
                        .collect(),
                });
            }
            events.push(UnitEvent {
                run_id: run_id.to_string(),
                repeats: self.executor.repeats(),
                start_ts_s: window.as_ref().map(|w| offset(w.start)),
                end_ts_s: window.as_ref().map(|w| offset(w.end)),
                result: result.clone(),
            });
            results.push(result);
        }

        Ok(ProfileRun {
            summary: RunSummary::new(run_id, model, results),
            traces,
            events,
        })
    }

    fn profile_unit(&mut self, unit: &mut dyn ExecutionUnit) -> (UnitResult, Option<SampleWindow>) {
        let id = unit.id().clone();
        if !unit.has_input() {
            return (UnitResult::skipped(id, "no input captured"), None);
        }
        if let Err(err) = self.sampler.start() {
            return (UnitResult::failed(id, format!("sampler: {err}")), None);
        }
        let timing: Timing = match self.executor.run(unit) {
            Ok(timing) => timing,
            Err(err) => {
                if let Err(stop_err) = self.sampler.stop() {
                    warn!(error = %stop_err, "sampler did not stop cleanly");
                }
                return (UnitResult::failed(id, err.to_string()), None);
            }
        };
        match self.sampler.stop_window(timing.start, timing.end) {
            Ok(window) => (self.calculator.attribute(id, &window), Some(window)),
            Err(err) => (UnitResult::failed(id, format!("sampler: {err}")), None),
        }
    }
}

fn log_result(result: &UnitResult) {
    match &result.status {
        UnitStatus::Measured => info!(
            duration_s = result.duration_s,
            energy_j = result.energy_j,
            samples = result.sample_count,
            skipped_ticks = result.skipped_ticks,
            "{}",
            result.report_line()
        ),
        _ => warn!("{}", result.report_line()),
    }
}
