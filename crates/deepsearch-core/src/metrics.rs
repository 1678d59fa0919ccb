use anyhow::Result;
use once_cell::sync::OnceCell;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{global, KeyValue};
use tracing::info;

struct ResearchMetrics {
    runs: Counter<u64>,
    duration_ms: Histogram<f64>,
    backtracks: Counter<u64>,
}

static METRICS: OnceCell<ResearchMetrics> = OnceCell::new();

fn handles() -> &'static ResearchMetrics {
    METRICS.get_or_init(|| {
        let meter: Meter = global::meter("deepsearch.engine");
        ResearchMetrics {
            runs: meter
                .u64_counter("research_runs_total")
                .with_description("Total research runs by terminal state")
                .init(),
            duration_ms: meter
                .f64_histogram("research_run_duration_ms")
                .with_description("Research run wall-clock time in milliseconds")
                .init(),
            backtracks: meter
                .u64_counter("research_backtracks_total")
                .with_description("Adaptive transitions that routed back to an earlier state")
                .init(),
        }
    })
}

/// Hint to operators that OTEL metrics export can be configured externally.
pub fn init_metrics_from_env(service_name: &str) -> Result<()> {
    if std::env::var("DEEPSEARCH_OTEL_METRICS_ENDPOINT").is_ok() {
        info!(
            target = "telemetry",
            "DEEPSEARCH_OTEL_METRICS_ENDPOINT detected for {service_name}. Configure an OTLP meter provider in your deployment to export engine metrics."
        );
    }
    Ok(())
}

/// No-op placeholder for symmetry with tracer shutdown.
pub fn shutdown_metrics() {}

/// Record OTEL metrics for one research run (no-op if no provider installed).
pub fn record_run_metrics(final_state: &str, duration_ms: u64, backtracks: usize) {
    let metrics = handles();
    let attrs = [KeyValue::new("final_state", final_state.to_string())];

    metrics.runs.add(1, &attrs);
    metrics.duration_ms.record(duration_ms as f64, &attrs);
    if backtracks > 0 {
        metrics.backtracks.add(backtracks as u64, &attrs);
    }
}
