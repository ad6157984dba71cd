use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use stock_forecast::app;
use stock_forecast::config::{ModelSource, ServiceConfig};
use stock_forecast::external::fs_provider::FsModelProvider;
use stock_forecast::external::http_provider::HttpModelProvider;
use stock_forecast::external::model_provider::ModelProvider;
use stock_forecast::logging::{init_logging, LoggingConfig};
use stock_forecast::services::prediction_service::ForecastPipeline;
use stock_forecast::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env())
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let config = ServiceConfig::from_env().context("invalid service configuration")?;

    let provider: Arc<dyn ModelProvider> = match &config.model_source {
        ModelSource::Directory(dir) => {
            tracing::info!("📦 Loading models from directory {:?}", dir);
            Arc::new(FsModelProvider::new(dir.clone()))
        }
        ModelSource::Remote(base_url) => {
            tracing::info!("📦 Downloading models from {}", base_url);
            Arc::new(HttpModelProvider::new(base_url).context("invalid MODEL_BASE_URL")?)
        }
    };

    let pipeline = ForecastPipeline::new(config.pipeline, provider, config.inference_timeout);
    let state = AppState {
        pipeline: Arc::new(pipeline),
    };
    let app = app::create_app(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("🚀 Stock forecast backend running at http://{}/", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
