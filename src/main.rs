//! A greeting service with axum.

use greet_service::{
    infra::{config, logging, metrics},
    server,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let config = config::load_config()?;
    let _guard = logging::init_logging(&config.telemetry)?;
    let metrics = metrics::install_recorder()?;

    // Start server
    let listener = TcpListener::bind((
        config.server.http_address.as_str(),
        config.server.http_port,
    ))
    .await?;
    server::run_app(listener, config, metrics).await?;

    Ok(())
}
