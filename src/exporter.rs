use crate::telemetry::TelemetrySource;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const GAUGE_NAME: &str = "jetson_power_total_watts";
const GAUGE_HELP: &str = "Total board power in watts";

/// Last reading, stored as `f64` bits. Starts at 0 W.
#[derive(Debug, Default)]
pub struct PowerGauge {
    bits: AtomicU64,
}

impl PowerGauge {
    pub fn set(&self, watts: f64) {
        self.bits.store(watts.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Reads the source once; keeps the previous value on failure.
    pub fn refresh(&self, source: &dyn TelemetrySource) {
        match source.read_total_power_watts() {
            Ok(watts) => self.set(watts),
            Err(err) => warn!(error = %err, "telemetry read failed, keeping last value"),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "# HELP {GAUGE_NAME} {GAUGE_HELP}\n# TYPE {GAUGE_NAME} gauge\n{GAUGE_NAME} {}\n",
            self.get()
        )
    }
}

pub fn router(gauge: Arc<PowerGauge>) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .with_state(gauge)
}

async fn metrics(State(gauge): State<Arc<PowerGauge>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gauge.render(),
    )
}

pub async fn serve(
    source: Arc<dyn TelemetrySource>,
    bind: &str,
    refresh: Duration,
) -> anyhow::Result<()> {
    let gauge = Arc::new(PowerGauge::default());
    let refresher = Arc::clone(&gauge);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(refresh);
        loop {
            ticker.tick().await;
            let gauge = Arc::clone(&refresher);
            let source = Arc::clone(&source);
            // Telemetry reads are blocking file reads.
            if let Err(err) =
                tokio::task::spawn_blocking(move || gauge.refresh(source.as_ref())).await
            {
                warn!(error = %err, "telemetry refresh task failed");
            }
        }
    });

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "serving {GAUGE_NAME} at /metrics");
    axum::serve(listener, router(gauge)).await?;
    Ok(())
}
