//! For reading application configuration.

use serde::Deserialize;
use std::{path::PathBuf, time::Duration};

/// Application configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Greeting service configuration.
    #[serde(default)]
    pub service: ServiceConfig,
    /// Security configuration.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Logging and tracing configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    /// Server address.
    pub http_address: String,
    /// Server http port.
    pub http_port: u16,
    /// How long a request may take before the client gets a timeout.
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,
    /// Maximum number of requests handled at the same time.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    /// Directory served for paths that no route claims.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_concurrency_limit() -> usize {
    500
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

/// Greeting service configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct ServiceConfig {
    /// The greeting used until someone changes it.
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

fn default_greeting() -> String {
    "Ciao".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
        }
    }
}

/// Security configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct SecurityConfig {
    /// Whether protected routes require credentials.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Users allowed through protected routes.
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

fn default_true() -> bool {
    true
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            users: Vec::new(),
        }
    }
}

/// A user that may authenticate with basic auth.
#[derive(Clone, Deserialize)]
pub struct UserConfig {
    /// The username.
    pub username: String,
    /// A bcrypt hash of the user's password.
    pub password_hash: String,
}

impl std::fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserConfig")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Logging and tracing configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Where to write hourly rotated JSON logs, if anywhere.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// OTLP collector to export spans to, if any.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    /// Service name reported to the collector.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_log_filter() -> String {
    "info,tower_http=debug,greet_service=debug".to_string()
}

fn default_service_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            log_dir: None,
            otlp_endpoint: None,
            service_name: default_service_name(),
        }
    }
}

/// Retrieve [`Config`] from the default configuration file.
#[tracing::instrument]
pub fn load_config() -> Result<Config, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::with_name("config"))
        .add_source(config::Environment::with_prefix("app").separator("__"))
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_file_loads() {
        let config = load_config().unwrap();
        assert_eq!("Ciao", config.service.greeting);
        assert_eq!(Duration::from_secs(10), config.server.request_timeout);
        assert!(config.security.enabled);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config: Config = config::Config::builder()
            .set_override("server.http_address", "127.0.0.1")
            .unwrap()
            .set_override("server.http_port", 8080)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!("Ciao", config.service.greeting);
        assert_eq!(500, config.server.concurrency_limit);
        assert_eq!(PathBuf::from("static"), config.server.static_dir);
        assert!(config.security.users.is_empty());
        assert!(config.telemetry.otlp_endpoint.is_none());
    }

    #[test]
    fn user_debug_hides_password_hash() {
        let user = UserConfig {
            username: "admin".to_string(),
            password_hash: "$2b$04$secret".to_string(),
        };
        let debug = format!("{user:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("secret"));
    }
}
