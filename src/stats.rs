use crate::sampler::PowerSample;
use serde::{Deserialize, Serialize};

/// Descriptive statistics over one window's samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub mean_watts: f64,
    pub std_watts: f64,
    pub peak_watts: f64,
    pub p50_watts: f64,
    pub p90_watts: f64,
    /// Mean gap between consecutive samples; `None` below two samples.
    pub mean_gap_s: Option<f64>,
}

pub fn summarize(samples: &[PowerSample]) -> Option<WindowStats> {
    if samples.is_empty() {
        return None;
    }
    let watts: Vec<f64> = samples.iter().map(|s| s.watts).collect();
    let mean = watts.iter().sum::<f64>() / watts.len() as f64;
    let variance = watts
        .iter()
        .map(|value| {
            let diff = value - mean;
            diff * diff
        })
        .sum::<f64>()
        / watts.len() as f64;
    let mut sorted = watts.clone();
    sorted.sort_by(f64::total_cmp);
    let gaps = samples
        .windows(2)
        .map(|pair| pair[1].at.duration_since(pair[0].at).as_secs_f64())
        .collect::<Vec<_>>();
    let mean_gap = if gaps.is_empty() {
        None
    } else {
        Some(gaps.iter().sum::<f64>() / gaps.len() as f64)
    };
    Some(WindowStats {
        mean_watts: mean,
        std_watts: variance.sqrt(),
        peak_watts: sorted[sorted.len() - 1],
        p50_watts: percentile(&sorted, 50.0),
        p90_watts: percentile(&sorted, 90.0),
        mean_gap_s: mean_gap,
    })
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * (sorted.len() as f64 - 1.0)).round() as usize;
    sorted[rank]
}
