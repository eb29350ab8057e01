//! For setting up logging.

use super::config::TelemetryConfig;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace::Tracer, Resource};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_error::ErrorLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Flushes logs and exports pending spans upon being dropped.
#[derive(Debug)]
pub struct LogGuard {
    _guards: Vec<WorkerGuard>,
    tracing_exported: bool,
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        if self.tracing_exported {
            opentelemetry::global::shutdown_tracer_provider();
        }
    }
}

/// Initializes logging.
///
/// Logs go to stdout, and to hourly rotated JSON files when a log directory is
/// configured. Spans are exported over OTLP when an endpoint is configured.
pub fn init_logging(config: &TelemetryConfig) -> color_eyre::Result<LogGuard> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_filter.clone());
    let mut guards = Vec::new();

    let (non_blocking_stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(stdout_guard);
    let stdout = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_stdout)
        .with_filter(EnvFilter::new(&log_level));

    let file = config.log_dir.as_ref().map(|dir| {
        let file_appender = tracing_appender::rolling::hourly(dir, "log.");
        let (non_blocking_file_appender, file_guard) =
            tracing_appender::non_blocking(file_appender);
        guards.push(file_guard);
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(non_blocking_file_appender)
            .json()
            .with_filter(EnvFilter::new(&log_level))
    });

    let opentelemetry = match &config.otlp_endpoint {
        Some(endpoint) => {
            let tracer = otlp_tracer(endpoint, &config.service_name)?;
            Some(
                tracing_opentelemetry::layer()
                    .with_tracer(tracer)
                    .with_filter(EnvFilter::new(&log_level)),
            )
        }
        None => None,
    };
    let tracing_exported = opentelemetry.is_some();

    tracing_subscriber::registry()
        .with(stdout)
        .with(file)
        .with(opentelemetry)
        .with(ErrorLayer::default())
        .try_init()?;

    match &config.otlp_endpoint {
        Some(endpoint) => tracing::info!("Exporting spans to {}", endpoint),
        None => tracing::info!("No OTLP endpoint configured, spans are not exported"),
    }

    Ok(LogGuard {
        _guards: guards,
        tracing_exported,
    })
}

/// Builds a tracer exporting spans in batches to an OTLP collector.
fn otlp_tracer(endpoint: &str, service_name: &str) -> color_eyre::Result<Tracer> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);
    let resource = Resource::new(vec![KeyValue::new(
        "service.name",
        service_name.to_string(),
    )]);
    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(opentelemetry_sdk::trace::config().with_resource(resource))
        .install_batch(runtime::Tokio)?;
    Ok(tracer)
}
