#![allow(dead_code)]

use layerwatt::{Config, ExecutionUnit, FnUnit, TelemetryError, TelemetrySource};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Always reads the same wattage.
pub struct ConstantSource(pub f64);

impl TelemetrySource for ConstantSource {
    fn read_total_power_watts(&self) -> Result<f64, TelemetryError> {
        Ok(self.0)
    }
}

/// Reads whatever wattage was last stored.
#[derive(Default)]
pub struct SettableSource {
    bits: AtomicU64,
}

impl SettableSource {
    pub fn set(&self, watts: f64) {
        self.bits.store(watts.to_bits(), Ordering::SeqCst);
    }
}

impl TelemetrySource for SettableSource {
    fn read_total_power_watts(&self) -> Result<f64, TelemetryError> {
        Ok(f64::from_bits(self.bits.load(Ordering::SeqCst)))
    }
}

pub fn config(poll_interval_seconds: f64, repeats: usize) -> Config {
    let mut config = Config::default();
    config.sampler.poll_interval_seconds = poll_interval_seconds;
    config.profiler.repeats_per_unit = repeats;
    config.profiler.warmup_repeats = 0;
    config
}

pub fn sleeper(name: &str, index: usize, per_call: Duration) -> Box<dyn ExecutionUnit> {
    Box::new(FnUnit::new(name, index, move || {
        std::thread::sleep(per_call);
        Ok(())
    }))
}
