use crate::error::UnitError;
use crate::unit::ExecutionUnit;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub start: Instant,
    pub end: Instant,
}

impl Timing {
    pub fn duration(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }
}

/// Replays a unit a fixed number of times back to back.
#[derive(Debug, Clone, Copy)]
pub struct UnitExecutor {
    repeats: usize,
    warmup: usize,
}

impl UnitExecutor {
    /// `repeats` must be at least 1; the profiler validates this up front.
    pub fn new(repeats: usize, warmup: usize) -> Self {
        debug_assert!(repeats >= 1);
        Self { repeats, warmup }
    }

    pub fn repeats(&self) -> usize {
        self.repeats
    }

    /// Runs the warmup invocations, then the timed ones.
    ///
    /// `start` is read immediately before the first timed invocation and
    /// `end` immediately after the last. Warmup happens before `start`.
    pub fn run(&self, unit: &mut dyn ExecutionUnit) -> Result<Timing, UnitError> {
        if !unit.has_input() {
            return Err(UnitError::MissingInput);
        }
        repeat(unit, self.warmup)?;
        let start = Instant::now();
        repeat(unit, self.repeats)?;
        let end = Instant::now();
        Ok(Timing { start, end })
    }
}

fn repeat(unit: &mut dyn ExecutionUnit, times: usize) -> Result<(), UnitError> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        for _ in 0..times {
            unit.invoke()?;
        }
        Ok::<(), anyhow::Error>(())
    }));
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(UnitError::Execution(format!("{err:#}"))),
        Err(payload) => Err(UnitError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::FnUnit;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn invokes_warmup_plus_repeats() {
        let calls = Rc::new(Cell::new(0usize));
        let counter = Rc::clone(&calls);
        let mut unit = FnUnit::new("Count_0", 0, move || {
            counter.set(counter.get() + 1);
            Ok(())
        });
        let timing = UnitExecutor::new(7, 2).run(&mut unit).unwrap();
        assert_eq!(calls.get(), 9);
        assert!(timing.end >= timing.start);
    }

    #[test]
    fn duration_covers_the_timed_loop() {
        let mut unit = FnUnit::new("Sleep_0", 0, || {
            std::thread::sleep(Duration::from_millis(5));
            Ok(())
        });
        let timing = UnitExecutor::new(4, 0).run(&mut unit).unwrap();
        assert!(timing.duration() >= Duration::from_millis(20));
    }

    #[test]
    fn error_mid_repeat_is_reported() {
        let mut n = 0;
        let mut unit = FnUnit::new("Flaky_0", 0, move || {
            n += 1;
            if n == 3 {
                anyhow::bail!("shape mismatch");
            }
            Ok(())
        });
        match UnitExecutor::new(10, 0).run(&mut unit) {
            Err(UnitError::Execution(msg)) => assert!(msg.contains("shape mismatch")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn panic_is_contained() {
        let mut unit = FnUnit::new("Boom_0", 0, || -> anyhow::Result<()> {
            panic!("index out of bounds")
        });
        match UnitExecutor::new(1, 0).run(&mut unit) {
            Err(UnitError::Panicked(msg)) => assert!(msg.contains("index out of bounds")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
