use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub sampler: SamplerConfig,
    pub profiler: ProfilerConfig,
    pub telemetry: TelemetryConfig,
    pub model: ModelConfig,
    pub output: OutputConfig,
    pub exporter: ExporterConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Fixed poll interval; also the time slice each sample stands for.
    pub poll_interval_seconds: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 0.02,
        }
    }
}

impl SamplerConfig {
    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        nonzero_interval(self.poll_interval_seconds)
            .ok_or(ConfigError::BadPollInterval(self.poll_interval_seconds))
    }
}

/// `None` for NaN, negative, overflowing or sub-nanosecond values.
fn nonzero_interval(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds)
        .ok()
        .filter(|interval| !interval.is_zero())
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProfilerConfig {
    pub repeats_per_unit: usize,
    pub warmup_repeats: usize,
    /// Names of the units to profile, in decomposition order. Empty means all.
    pub units: Vec<String>,
    pub cooldown_ms: u64,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            repeats_per_unit: 100,
            warmup_repeats: 5,
            units: Vec::new(),
            cooldown_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub source: SourceKind,
    /// File holding the total board power reading.
    pub path: String,
    pub scale_to_watts: f64,
    pub base_watts: f64,
    pub noise_watts: f64,
    pub seed: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Sysfs,
            path: "/sys/bus/i2c/drivers/ina3221x/1-0040/iio:device0/in_power0_input".to_string(),
            scale_to_watts: 0.001,
            base_watts: 5.0,
            noise_watts: 0.25,
            seed: 7,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Sysfs,
    Simulated,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub seed: u64,
    pub input_dim: usize,
    pub hidden_dims: Vec<usize>,
    pub output_dim: usize,
    pub batch: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "mlp".to_string(),
            seed: 42,
            input_dim: 256,
            hidden_dims: vec![512, 512, 256],
            output_dim: 10,
            batch: 8,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub samples_csv_path: Option<String>,
    pub results_csv_path: Option<String>,
    pub summary_json_path: Option<String>,
    pub events_jsonl_path: Option<String>,
    pub chart_svg_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExporterConfig {
    pub bind: String,
    pub refresh_seconds: f64,
}

impl ExporterConfig {
    pub fn refresh_interval(&self) -> Result<Duration, ConfigError> {
        nonzero_interval(self.refresh_seconds)
            .ok_or(ConfigError::BadRefreshInterval(self.refresh_seconds))
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            refresh_seconds: 1.0,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.profiler.repeats_per_unit == 0 {
            return Err(ConfigError::NoRepeats(self.profiler.repeats_per_unit));
        }
        self.sampler.poll_interval()?;
        self.exporter.refresh_interval()?;
        Ok(())
    }

    /// Checks `profiler.units` against the names the decomposition produced.
    pub fn validate_unit_list(&self, available: &[&str]) -> Result<(), ConfigError> {
        match self
            .profiler
            .units
            .iter()
            .find(|wanted| !available.contains(&wanted.as_str()))
        {
            Some(unknown) => Err(ConfigError::UnknownUnit(unknown.clone())),
            None => Ok(()),
        }
    }
}
