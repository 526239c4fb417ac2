use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry backend unavailable: {0}")]
    ReadUnavailable(String),
    #[error("malformed telemetry reading: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("a sampling window is already open")]
    AlreadyRunning,
    #[error("no sampling window is open")]
    NotRunning,
    #[error("sampling thread panicked")]
    Panicked,
    #[error("failed to spawn sampling thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum UnitError {
    #[error("execution failed: {0}")]
    Execution(String),
    #[error("unit panicked: {0}")]
    Panicked(String),
    #[error("no input captured for this unit")]
    MissingInput,
}

/// Rejected configuration. Surfaces before any unit runs.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("repeats_per_unit must be at least 1 (got {0})")]
    NoRepeats(usize),
    #[error("poll_interval_seconds must be a positive number of seconds no shorter than 1ns (got {0})")]
    BadPollInterval(f64),
    #[error("unit `{0}` is not part of the decomposition")]
    UnknownUnit(String),
    #[error("exporter refresh_seconds must be a positive number of seconds no shorter than 1ns (got {0})")]
    BadRefreshInterval(f64),
}

/// Persisting results failed. Already computed results are untouched.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
