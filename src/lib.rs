pub mod config;
pub mod energy;
pub mod error;
pub mod event;
pub mod executor;
pub mod exporter;
pub mod model;
pub mod orchestrator;
pub mod sampler;
pub mod sink;
pub mod stats;
pub mod summary;
pub mod telemetry;
pub mod unit;

pub use config::Config;
pub use energy::{EnergyCalculator, Totals};
pub use error::{ConfigError, SamplerError, SinkError, TelemetryError, UnitError};
pub use executor::{Timing, UnitExecutor};
pub use event::build_run_id;
pub use orchestrator::{ProfileRun, Profiler};
pub use sampler::{PowerSample, PowerSampler, SampleWindow};
pub use sink::{FileSink, ResultSink};
pub use summary::{RunSummary, UnitResult, UnitStatus};
pub use telemetry::TelemetrySource;
pub use unit::{ExecutionUnit, FnUnit, UnitId};
