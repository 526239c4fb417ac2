use crate::config::{SourceKind, TelemetryConfig};
use crate::error::TelemetryError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// A synchronous read of instantaneous total power.
pub trait TelemetrySource: Send + Sync {
    fn read_total_power_watts(&self) -> Result<f64, TelemetryError>;
}

pub struct SysfsPowerSource {
    path: PathBuf,
    scale_to_watts: f64,
}

impl SysfsPowerSource {
    pub fn new(path: impl Into<PathBuf>, scale_to_watts: f64) -> Self {
        Self {
            path: path.into(),
            scale_to_watts,
        }
    }
}

impl TelemetrySource for SysfsPowerSource {
    fn read_total_power_watts(&self) -> Result<f64, TelemetryError> {
        let text = fs::read_to_string(&self.path).map_err(|err| {
            TelemetryError::ReadUnavailable(format!("{}: {err}", self.path.display()))
        })?;
        let raw: f64 = text
            .trim()
            .parse()
            .map_err(|_| TelemetryError::Malformed(text.trim().to_string()))?;
        Ok(raw * self.scale_to_watts)
    }
}

/// Seeded synthetic power: a base draw plus uniform noise.
pub struct SimulatedPowerSource {
    base_watts: f64,
    noise_watts: f64,
    rng: Mutex<ChaCha8Rng>,
}

impl SimulatedPowerSource {
    pub fn new(base_watts: f64, noise_watts: f64, seed: u64) -> Self {
        Self {
            base_watts,
            noise_watts,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }
}

impl TelemetrySource for SimulatedPowerSource {
    fn read_total_power_watts(&self) -> Result<f64, TelemetryError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| TelemetryError::ReadUnavailable("simulator state poisoned".into()))?;
        let jitter = if self.noise_watts > 0.0 {
            rng.gen_range(-self.noise_watts..=self.noise_watts)
        } else {
            0.0
        };
        Ok((self.base_watts + jitter).max(0.0))
    }
}

pub fn from_config(config: &TelemetryConfig) -> Arc<dyn TelemetrySource> {
    match config.source {
        SourceKind::Sysfs => Arc::new(SysfsPowerSource::new(&config.path, config.scale_to_watts)),
        SourceKind::Simulated => Arc::new(SimulatedPowerSource::new(
            config.base_watts,
            config.noise_watts,
            config.seed,
        )),
    }
}
