use crate::config::Config;
use crate::summary::UnitResult;
use crate::unit::UnitId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordedSample {
    pub timestamp_s: f64,
    pub watts: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitTrace {
    pub unit: UnitId,
    pub samples: Vec<RecordedSample>,
}

/// One line of the events log.
#[derive(Debug, Serialize, Deserialize)]
pub struct UnitEvent {
    pub run_id: String,
    pub repeats: usize,
    /// Window bounds relative to the run epoch; absent when nothing was timed.
    pub start_ts_s: Option<f64>,
    pub end_ts_s: Option<f64>,
    pub result: UnitResult,
}

/// `<model>-<unix secs>-<git rev>-<fingerprint>`, where the fingerprint is
/// the first 4 bytes of sha256 over the config and the decomposed unit names.
pub fn build_run_id(config: &Config, unit_names: &[&str]) -> anyhow::Result<String> {
    let mut digest = Sha256::new().chain_update(toml::to_string(config)?);
    for name in unit_names {
        digest.update(name.as_bytes());
        digest.update([0u8]);
    }
    let fingerprint = hex::encode(&digest.finalize()[..4]);
    let started = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    Ok(format!(
        "{}-{started}-{}-{fingerprint}",
        config.model.name,
        source_revision()
    ))
}

fn source_revision() -> String {
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|rev| rev.trim().to_owned())
        .filter(|rev| !rev.is_empty())
        .unwrap_or_else(|| "nogit".to_owned())
}
