mod common;

use common::{config, sleeper, ConstantSource};
use layerwatt::{
    ExecutionUnit, FnUnit, PowerSampler, Profiler, TelemetryError, TelemetrySource, UnitStatus,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[test]
fn constant_five_watts_over_one_second() {
    let mut profiler = Profiler::new(config(0.1, 10), Arc::new(ConstantSource(5.0))).unwrap();
    let mut units = vec![sleeper("Linear_0", 0, Duration::from_millis(100))];
    let run = profiler.run("a", "scenario", &mut units).unwrap();
    let result = &run.summary.units()[0];

    assert_eq!(result.status, UnitStatus::Measured);
    assert!(result.duration_s >= 1.0);
    assert!(
        (9..=11).contains(&result.sample_count),
        "expected about 10 samples, got {}",
        result.sample_count
    );
    assert!((result.energy_j - 5.0).abs() <= 0.5 + 1e-9);
    assert!((result.avg_power_w.unwrap() - 5.0).abs() <= 0.6);
}

#[test]
fn unit_shorter_than_poll_interval_is_invalid_and_run_continues() {
    // The single warmup call sleeps so the sampler's first reading lands
    // before the timed window; the timed call itself is instant.
    let mut calls = 0;
    let quick = FnUnit::new("ReLU_0", 0, move || {
        calls += 1;
        if calls == 1 {
            std::thread::sleep(Duration::from_millis(30));
        }
        Ok(())
    });
    let mut cfg = config(0.5, 1);
    cfg.profiler.warmup_repeats = 1;
    let mut profiler = Profiler::new(cfg, Arc::new(ConstantSource(5.0))).unwrap();
    let mut units: Vec<Box<dyn ExecutionUnit>> = vec![
        Box::new(quick),
        sleeper("Linear_1", 1, Duration::from_millis(600)),
    ];
    let run = profiler.run("b", "scenario", &mut units).unwrap();

    let results = run.summary.units();
    assert_eq!(results.len(), 2);
    assert!(matches!(results[0].status, UnitStatus::Invalid(_)));
    assert_eq!(results[0].sample_count, 0);
    assert_eq!(results[0].energy_j, 0.0);
    assert!(results[0].avg_power_w.is_none());
    assert_eq!(results[1].status, UnitStatus::Measured);

    let totals = run.summary.totals();
    assert_eq!((totals.measured, totals.invalid), (1, 1));
    assert_eq!(totals.energy_j, results[1].energy_j);
    assert!(results[0].duration_s > 0.0);
    let counted = results[0].duration_s + results[1].duration_s;
    assert!((totals.duration_s - counted).abs() < 1e-12);
    assert!((totals.avg_power_w.unwrap() - totals.energy_j / counted).abs() < 1e-12);
    assert!(run.summary.report().contains("[INVALID] ReLU_0"));
}

/// Fails on three of its first fifty reads, then marks the instant the
/// fifty-first read begins and reports it.
struct ScriptedSource {
    calls: AtomicUsize,
    failing: [usize; 3],
    done: Mutex<Option<Sender<Instant>>>,
}

impl TelemetrySource for ScriptedSource {
    fn read_total_power_watts(&self) -> Result<f64, TelemetryError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 50 {
            if let Some(tx) = self.done.lock().unwrap().take() {
                let _ = tx.send(Instant::now());
            }
        }
        if self.failing.contains(&call) {
            return Err(TelemetryError::ReadUnavailable("device busy".into()));
        }
        Ok(4.0)
    }
}

#[test]
fn three_failed_ticks_out_of_fifty() {
    let (tx, rx) = mpsc::channel();
    let source = Arc::new(ScriptedSource {
        calls: AtomicUsize::new(0),
        failing: [3, 19, 41],
        done: Mutex::new(Some(tx)),
    });
    let mut sampler = PowerSampler::new(source, Duration::from_millis(1));
    let start = Instant::now();
    sampler.start().unwrap();
    let end = rx.recv_timeout(Duration::from_secs(30)).unwrap();
    let window = sampler.stop_window(start, end).unwrap();

    assert_eq!(window.samples.len(), 47);
    assert_eq!(window.skipped_ticks, 3);

    let calculator = layerwatt::EnergyCalculator::new(0.001);
    let result = calculator.attribute(layerwatt::UnitId::new("Linear_0", 0), &window);
    assert_eq!(result.status, UnitStatus::Measured);
    assert!((result.energy_j - 47.0 * 4.0 * 0.001).abs() < 1e-9);
}

#[test]
fn faulting_unit_is_marked_failed_and_the_rest_still_run() {
    let mut profiler = Profiler::new(config(0.002, 5), Arc::new(ConstantSource(3.0))).unwrap();
    let mut n = 0;
    let faulty = FnUnit::new("Linear_1", 1, move || {
        n += 1;
        if n == 3 {
            anyhow::bail!("CUDA error: illegal memory access");
        }
        std::thread::sleep(Duration::from_millis(5));
        Ok(())
    });
    let panicky = FnUnit::new("Softmax_3", 3, || -> anyhow::Result<()> {
        panic!("dimension out of range")
    });
    let mut units: Vec<Box<dyn ExecutionUnit>> = vec![
        sleeper("Linear_0", 0, Duration::from_millis(10)),
        Box::new(faulty),
        sleeper("ReLU_2", 2, Duration::from_millis(10)),
        Box::new(panicky),
        sleeper("Linear_4", 4, Duration::from_millis(10)),
    ];
    let run = profiler.run("d", "scenario", &mut units).unwrap();

    let results = run.summary.units();
    let names: Vec<&str> = results.iter().map(|r| r.unit.name.as_str()).collect();
    assert_eq!(names, ["Linear_0", "Linear_1", "ReLU_2", "Softmax_3", "Linear_4"]);
    match &results[1].status {
        UnitStatus::Failed(reason) => assert!(reason.contains("illegal memory access")),
        other => panic!("unexpected status {other:?}"),
    }
    assert!(matches!(results[3].status, UnitStatus::Failed(_)));
    for i in [0, 2, 4] {
        assert_eq!(results[i].status, UnitStatus::Measured, "{}", names[i]);
    }
    assert_eq!(run.summary.totals().failed, 2);
    assert!(run.summary.report().contains("[FAIL] Linear_1"));
    assert_eq!(run.traces.len(), 3);
}
