use anyhow::Context;
use devis_scoring::api::{build_router, AppState};
use devis_scoring::observability::init_tracing;
use devis_scoring::{Config, PredictionPipeline};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    init_tracing(&config.logging)?;

    info!(
        "Starting devis-scoring v{} (script {}, timeout {:?})",
        env!("CARGO_PKG_VERSION"),
        config.scoring.script_path.display(),
        config.scoring.timeout()
    );

    let pipeline =
        PredictionPipeline::from_config(&config).context("Failed to build prediction pipeline")?;
    let app = build_router(AppState::new(pipeline), config.server.body_limit_bytes);

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
