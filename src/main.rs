mod backend;
mod config;
mod error;
mod http_client;
mod relay;
mod server;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::backend::SageMakerBackend;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::Settings::load()?;

    let variant = config.deployment.production_variant()?;
    tracing::info!(
        "Deployment {} ({}): endpoint config {}, variant {}",
        config.deployment.api.name,
        config.deployment.api_key_name(),
        config.deployment.endpoint_config_name(),
        variant
    );
    tracing::debug!(env = ?config.deployment.container_environment(), "model container environment");

    let endpoint_name = config.endpoint_name();
    let backend = SageMakerBackend::from_settings(&config.backend, &endpoint_name)?;
    tracing::info!("Relaying to {} via {}", endpoint_name, backend.invocation_url());

    // Use configured host/port to bind the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = server::create_app(config, Arc::new(backend))?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Relay server running on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
