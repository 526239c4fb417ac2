use crate::error::SamplerError;
use crate::telemetry::TelemetrySource;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// One telemetry reading, timestamped after the read returned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerSample {
    pub at: Instant,
    pub watts: f64,
}

#[derive(Debug, Default)]
pub struct Drained {
    pub samples: Vec<PowerSample>,
    pub skipped_ticks: usize,
}

/// Samples bounded by one unit's timed repeat loop.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    pub start: Instant,
    pub end: Instant,
    pub samples: Vec<PowerSample>,
    /// Ticks lost to telemetry read failures.
    pub skipped_ticks: usize,
}

impl SampleWindow {
    pub fn new(start: Instant, end: Instant, samples: Vec<PowerSample>) -> Self {
        Self {
            start,
            end,
            samples,
            skipped_ticks: 0,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }

    pub fn contains(&self, at: Instant) -> bool {
        self.start <= at && at <= self.end
    }
}

struct Running {
    stop_tx: Sender<()>,
    handle: JoinHandle<Drained>,
}

pub struct PowerSampler {
    source: Arc<dyn TelemetrySource>,
    poll_interval: Duration,
    running: Option<Running>,
}

impl PowerSampler {
    pub fn new(source: Arc<dyn TelemetrySource>, poll_interval: Duration) -> Self {
        Self {
            source,
            poll_interval,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn start(&mut self) -> Result<(), SamplerError> {
        if self.running.is_some() {
            return Err(SamplerError::AlreadyRunning);
        }
        let (stop_tx, stop_rx) = mpsc::channel();
        let source = Arc::clone(&self.source);
        let poll_interval = self.poll_interval;
        let handle = thread::Builder::new()
            .name("power-sampler".to_string())
            .spawn(move || {
                let mut drained = Drained::default();
                loop {
                    match source.read_total_power_watts() {
                        Ok(watts) => {
                            let at = Instant::now();
                            trace!(watts, "power sample");
                            drained.samples.push(PowerSample { at, watts });
                        }
                        Err(err) => {
                            drained.skipped_ticks += 1;
                            debug!(error = %err, "telemetry read failed, skipping tick");
                        }
                    }
                    match stop_rx.recv_timeout(poll_interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                drained
            })?;
        self.running = Some(Running { stop_tx, handle });
        Ok(())
    }

    /// Signals the sampling thread and blocks until it has exited.
    ///
    /// Returns every sample recorded since `start`, in recording order, and
    /// leaves the sampler ready for the next `start`.
    pub fn stop(&mut self) -> Result<Drained, SamplerError> {
        let running = self.running.take().ok_or(SamplerError::NotRunning)?;
        // The thread may already be gone if the source panicked.
        let _ = running.stop_tx.send(());
        running.handle.join().map_err(|_| SamplerError::Panicked)
    }

    /// Stops sampling and keeps only samples taken within `[start, end]`.
    pub fn stop_window(
        &mut self,
        start: Instant,
        end: Instant,
    ) -> Result<SampleWindow, SamplerError> {
        let drained = self.stop()?;
        let mut window = SampleWindow::new(start, end, Vec::with_capacity(drained.samples.len()));
        window.skipped_ticks = drained.skipped_ticks;
        window.samples.extend(
            drained
                .samples
                .into_iter()
                .filter(|sample| start <= sample.at && sample.at <= end),
        );
        Ok(window)
    }
}

impl Drop for PowerSampler {
    fn drop(&mut self) {
        if self.running.is_some() {
            let _ = self.stop();
        }
    }
}
