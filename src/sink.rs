use crate::config::OutputConfig;
use crate::error::SinkError;
use crate::event::{UnitEvent, UnitTrace};
use crate::orchestrator::ProfileRun;
use crate::summary::RunSummary;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// Where finished runs go. Never mutates the run it is given.
pub trait ResultSink {
    fn persist(&mut self, run: &ProfileRun) -> Result<(), SinkError>;
}

/// Writes each output named in the `[output]` section.
pub struct FileSink {
    output: OutputConfig,
}

impl FileSink {
    pub fn new(output: OutputConfig) -> Self {
        Self { output }
    }
}

impl ResultSink for FileSink {
    fn persist(&mut self, run: &ProfileRun) -> Result<(), SinkError> {
        let out = &self.output;
        let mut first_error = None;
        attempt(&out.samples_csv_path, &mut first_error, |p| {
            write_samples_csv(p, &run.traces)
        });
        attempt(&out.results_csv_path, &mut first_error, |p| {
            write_results_csv(p, &run.summary, &run.traces)
        });
        attempt(&out.summary_json_path, &mut first_error, |p| {
            write_summary_json(p, &run.summary)
        });
        attempt(&out.events_jsonl_path, &mut first_error, |p| {
            write_events_jsonl(p, &run.events)
        });
        attempt(&out.chart_svg_path, &mut first_error, |p| {
            write_chart_svg(p, &run.summary)
        });
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn attempt(
    path: &Option<String>,
    first_error: &mut Option<SinkError>,
    write: impl FnOnce(&str) -> Result<(), SinkError>,
) {
    let Some(path) = path else { return };
    match write(path) {
        Ok(()) => info!(path = %path, "wrote output"),
        Err(err) => {
            warn!(path = %path, error = %err, "failed to write output");
            first_error.get_or_insert(err);
        }
    }
}

#[derive(Serialize)]
struct SampleRow<'a> {
    unit: &'a str,
    sample_index: usize,
    timestamp_s: f64,
    power_w: f64,
}

pub fn write_samples_csv(path: impl AsRef<Path>, traces: &[UnitTrace]) -> Result<(), SinkError> {
    let mut writer = csv::Writer::from_path(path)?;
    for trace in traces {
        for (sample_index, sample) in trace.samples.iter().enumerate() {
            writer.serialize(SampleRow {
                unit: &trace.unit.name,
                sample_index,
                timestamp_s: sample.timestamp_s,
                power_w: sample.watts,
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// One row per unit with its samples joined into the last column.
pub fn write_results_csv(
    path: impl AsRef<Path>,
    summary: &RunSummary,
    traces: &[UnitTrace],
) -> Result<(), SinkError> {
    let by_unit: HashMap<usize, &UnitTrace> = traces.iter().map(|t| (t.unit.index, t)).collect();
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "Layer",
        "Duration (s)",
        "Energy (J)",
        "Avg Power (W)",
        "Power Samples (W)",
    ])?;
    for result in summary.units() {
        let samples = by_unit
            .get(&result.unit.index)
            .map(|trace| {
                trace
                    .samples
                    .iter()
                    .map(|s| format!("{:.2}", s.watts))
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_default();
        let avg_power = match result.avg_power_w {
            Some(watts) => format!("{watts:.2}"),
            None => "N/A".to_string(),
        };
        writer.write_record([
            result.unit.name.clone(),
            format!("{:.3}", result.duration_s),
            format!("{:.3}", result.energy_j),
            avg_power,
            samples,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary_json(path: impl AsRef<Path>, summary: &RunSummary) -> Result<(), SinkError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)?;
    Ok(())
}

pub fn read_summary_json(path: impl AsRef<Path>) -> Result<RunSummary, SinkError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn write_events_jsonl(path: impl AsRef<Path>, events: &[UnitEvent]) -> Result<(), SinkError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    for event in events {
        let line = serde_json::to_string(event)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_chart_svg(path: impl AsRef<Path>, summary: &RunSummary) -> Result<(), SinkError> {
    fs::write(path, render_chart_svg(summary))?;
    Ok(())
}

const BAR_WIDTH: f64 = 28.0;
const BAR_GAP: f64 = 12.0;
const PLOT_HEIGHT: f64 = 320.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_TOP: f64 = 50.0;
const LABEL_SPACE: f64 = 130.0;

/// Bar chart of energy per unit. Units without a measurement get an
/// empty grey slot so the gap is visible.
pub fn render_chart_svg(summary: &RunSummary) -> String {
    let units = summary.units();
    let width = MARGIN_LEFT + units.len() as f64 * (BAR_WIDTH + BAR_GAP) + BAR_GAP + 20.0;
    let height = MARGIN_TOP + PLOT_HEIGHT + LABEL_SPACE;
    let max_energy = units
        .iter()
        .map(|r| r.energy_j)
        .fold(0.0_f64, f64::max)
        .max(f64::EPSILON);
    let baseline = MARGIN_TOP + PLOT_HEIGHT;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.0}" height="{height:.0}" font-family="sans-serif" font-size="11">"#
    );
    let _ = writeln!(
        svg,
        r#"<text x="{:.1}" y="24" font-size="15" text-anchor="middle">{} Layer-wise Energy Consumption</text>"#,
        width / 2.0,
        escape_xml(summary.model())
    );
    let _ = writeln!(
        svg,
        r#"<text x="16" y="{:.1}" transform="rotate(-90 16 {:.1})" text-anchor="middle">Energy (Joules)</text>"#,
        MARGIN_TOP + PLOT_HEIGHT / 2.0,
        MARGIN_TOP + PLOT_HEIGHT / 2.0
    );
    let _ = writeln!(
        svg,
        r#"<line x1="{MARGIN_LEFT}" y1="{baseline}" x2="{:.1}" y2="{baseline}" stroke="black"/>"#,
        width - 10.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{max_energy:.3}</text>"#,
        MARGIN_LEFT - 6.0,
        MARGIN_TOP + 4.0
    );
    for (i, result) in units.iter().enumerate() {
        let x = MARGIN_LEFT + BAR_GAP + i as f64 * (BAR_WIDTH + BAR_GAP);
        let bar = result.energy_j / max_energy * PLOT_HEIGHT;
        let fill = if result.status.is_measured() {
            "#4c72b0"
        } else {
            "#bbbbbb"
        };
        let _ = writeln!(
            svg,
            r#"<rect x="{x:.1}" y="{:.1}" width="{BAR_WIDTH}" height="{bar:.1}" fill="{fill}"><title>{}: {:.3} J</title></rect>"#,
            baseline - bar,
            escape_xml(&result.unit.name),
            result.energy_j
        );
        let label_x = x + BAR_WIDTH / 2.0;
        let label_y = baseline + 8.0;
        let _ = writeln!(
            svg,
            r#"<text x="{label_x:.1}" y="{label_y:.1}" transform="rotate(90 {label_x:.1} {label_y:.1})">{}</text>"#,
            escape_xml(&result.unit.name)
        );
    }
    svg.push_str("</svg>\n");
    svg
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RecordedSample;
    use crate::summary::{UnitResult, UnitStatus};
    use crate::unit::UnitId;

    fn fixture() -> ProfileRun {
        let measured = UnitResult {
            unit: UnitId::new("Linear_0", 0),
            status: UnitStatus::Measured,
            duration_s: 0.5,
            energy_j: 0.3,
            avg_power_w: Some(0.6),
            sample_count: 3,
            skipped_ticks: 0,
            stats: None,
        };
        let failed = UnitResult::failed(UnitId::new("ReLU_1", 1), "boom");
        let trace = UnitTrace {
            unit: measured.unit.clone(),
            samples: vec![
                RecordedSample { timestamp_s: 0.10, watts: 5.0 },
                RecordedSample { timestamp_s: 0.12, watts: 5.0 },
                RecordedSample { timestamp_s: 0.14, watts: 5.0 },
            ],
        };
        ProfileRun {
            summary: RunSummary::new("run-1", "mlp", vec![measured, failed]),
            traces: vec![trace],
            events: Vec::new(),
        }
    }

    #[test]
    fn samples_csv_has_one_row_per_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("samples.csv");
        write_samples_csv(&path, &fixture().traces).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "unit,sample_index,timestamp_s,power_w");
        assert_eq!(lines.len(), 4);
        assert!(lines[3].starts_with("Linear_0,2,"));
    }

    #[test]
    fn results_csv_marks_unmeasured_power() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let run = fixture();
        write_results_csv(&path, &run.summary, &run.traces).unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "Linear_0");
        assert_eq!(&rows[0][3], "0.60");
        assert_eq!(&rows[0][4], "5.00,5.00,5.00");
        assert_eq!(&rows[1][3], "N/A");
    }

    #[test]
    fn summary_json_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let run = fixture();
        write_summary_json(&path, &run.summary).unwrap();
        let back = read_summary_json(&path).unwrap();
        assert_eq!(back.run_id(), "run-1");
        assert_eq!(back.units().len(), 2);
        assert_eq!(back.units()[1].status, UnitStatus::Failed("boom".into()));
        assert_eq!(back.totals().measured, 1);
    }

    #[test]
    fn chart_has_a_bar_per_unit() {
        let svg = render_chart_svg(&fixture().summary);
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("<rect").count(), 2);
        assert!(svg.contains("mlp Layer-wise Energy Consumption"));
        assert!(svg.contains("#bbbbbb"));
    }

    #[test]
    fn failing_output_does_not_block_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("summary.json");
        let mut sink = FileSink::new(OutputConfig {
            samples_csv_path: Some(dir.path().join("missing/samples.csv").display().to_string()),
            summary_json_path: Some(json.display().to_string()),
            ..OutputConfig::default()
        });
        let run = fixture();
        assert!(sink.persist(&run).is_err());
        assert!(json.exists());
        assert_eq!(run.summary.units().len(), 2);
    }
}
