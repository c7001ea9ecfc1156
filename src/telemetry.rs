//! Telemetry and structured logging for conversions.

use crate::job::{JobReport, JobStatus};
use opentelemetry::trace::{Span, Tracer};
use opentelemetry::{global, KeyValue};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TRACER_NAME: &str = "mdpdf-service";

/// Conversions slower than this are logged as warnings.
const SLOW_CONVERSION_MS: i64 = 5000;

/// Installs the global `tracing` subscriber.
///
/// Filtering follows `RUST_LOG` and falls back to `info`.
///
/// # Arguments
///
/// * `json` - Emit one JSON object per event instead of human-readable lines
pub fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Records telemetry for a finished conversion.
///
/// Emits one OpenTelemetry span and structured logs per job so render
/// health can be monitored. Recorded fields:
/// - Job id and input kind
/// - Terminal status and duration (ms)
/// - Input and output sizes in bytes
/// - Error message (if the job did not complete)
///
/// # Arguments
///
/// * `report` - Outcome of the finished job
pub fn record_job_telemetry(report: &JobReport) {
    let tracer = global::tracer(TRACER_NAME);
    let mut span = tracer.start("pdf_conversion_job");

    // Add span attributes
    span.set_attribute(KeyValue::new("job_id", report.job_id.clone()));
    span.set_attribute(KeyValue::new("kind", report.kind.to_string()));
    span.set_attribute(KeyValue::new("status", report.status.to_string()));
    span.set_attribute(KeyValue::new("duration_ms", report.duration_ms));
    span.set_attribute(KeyValue::new("input_bytes", report.input_bytes as i64));

    if let Some(output_bytes) = report.output_bytes {
        span.set_attribute(KeyValue::new("output_bytes", output_bytes as i64));
    }

    // Log performance metrics
    info!(
        job_id = %report.job_id,
        kind = %report.kind,
        duration_ms = report.duration_ms,
        status = %report.status,
        "PDF conversion job finished"
    );

    // Warn if exceeding performance threshold
    if report.duration_ms > SLOW_CONVERSION_MS {
        warn!(
            job_id = %report.job_id,
            duration_ms = report.duration_ms,
            "PDF conversion exceeded performance threshold ({}ms)",
            SLOW_CONVERSION_MS
        );
    }

    // Record error details if the job failed or was cancelled
    if report.status != JobStatus::Complete {
        if let Some(ref error) = report.error {
            span.set_attribute(KeyValue::new("error", error.clone()));
            warn!(
                job_id = %report.job_id,
                error = %error,
                status = %report.status,
                "PDF conversion job did not complete"
            );
        }
    }

    span.end();
}

/// Initializes OpenTelemetry with an OTLP exporter.
///
/// Called once at startup when an endpoint is configured, and must run
/// inside a tokio runtime. The service name comes from `OTEL_SERVICE_NAME`
/// (default: mdpdf-service).
///
/// # Arguments
///
/// * `endpoint` - Collector endpoint, e.g. `http://localhost:4317`
///
/// # Returns
///
/// Returns `Ok(())` on success, or an error if the pipeline cannot be built.
pub fn init_telemetry(endpoint: &str) -> Result<(), Box<dyn std::error::Error>> {
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::Config;

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| TRACER_NAME.to_string());

    // Initialize OTLP exporter
    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(Config::default().with_resource(
            opentelemetry_sdk::Resource::new(vec![
                KeyValue::new("service.name", service_name),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
            ]),
        ))
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;

    // Register as the global tracer provider
    if let Some(provider) = tracer.provider() {
        global::set_tracer_provider(provider);
    }

    info!("Telemetry initialized: endpoint={}", endpoint);
    Ok(())
}

/// Shuts down OpenTelemetry, flushing pending spans.
///
/// Call before the process exits.
pub fn shutdown_telemetry() {
    global::shutdown_tracer_provider();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobKind;

    fn report(status: JobStatus, error: Option<&str>) -> JobReport {
        JobReport {
            job_id: "0123456789abcdef0123456789abcdef".to_string(),
            kind: JobKind::Markdown,
            status,
            duration_ms: 42,
            input_bytes: 6,
            output_bytes: error.is_none().then_some(1024),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_record_completed_job() {
        // Global no-op tracer; should not panic
        record_job_telemetry(&report(JobStatus::Complete, None));
    }

    #[test]
    fn test_record_failed_job() {
        record_job_telemetry(&report(JobStatus::Failed, Some("Typst compilation failed")));
    }

    #[test]
    fn test_record_slow_cancelled_job() {
        let mut slow = report(JobStatus::Cancelled, Some("deadline"));
        slow.duration_ms = 30_000;

        record_job_telemetry(&slow);
    }
}
