//! Global application state.
//!
//! Used for access to the greeting service and to resources shared by every
//! request, such as the configuration or the metrics handle.

use super::config::Config;
use crate::feature::greet::greet_service::GreetingService;
use axum::extract::FromRef;
use metrics_exporter_prometheus::PrometheusHandle;
use std::{sync::Arc, time::Instant};

/// Global application state.
#[derive(Clone, FromRef)]
pub struct AppState {
    config: Arc<Config>,
    greetings: GreetingService,
    metrics: PrometheusHandle,
    #[from_ref(skip)]
    started: Instant,
}

impl AppState {
    /// Constructs a new [`AppState`] with the configured greeting.
    pub fn new(config: Config, metrics: PrometheusHandle) -> Self {
        let greetings = GreetingService::new(config.service.greeting.clone());
        Self {
            config: Arc::new(config),
            greetings,
            metrics,
            started: Instant::now(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the greeting service.
    pub fn greetings(&self) -> &GreetingService {
        &self.greetings
    }

    /// Returns the handle used to render metrics.
    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    /// Returns when the application was started.
    pub fn started(&self) -> Instant {
        self.started
    }
}
