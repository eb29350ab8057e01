//! Prometheus metrics.

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Requests served by the greeting routes.
pub const METRIC_ACCESS_COUNTER: &str = "accessctr";

/// Installs the global Prometheus recorder and describes our metrics.
///
/// Call this once at startup; the returned handle renders `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_counter!(
        METRIC_ACCESS_COUNTER,
        "Total number of requests to the greeting service"
    );
    tracing::debug!("Metrics recorder installed");
    Ok(handle)
}

/// A handle to a recorder that is not installed globally.
///
/// Renders an empty exposition, which is what tests and embedders without
/// metrics need.
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Increment the access counter.
pub fn inc_access_counter() {
    counter!(METRIC_ACCESS_COUNTER).increment(1);
}
