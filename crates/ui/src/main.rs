use std::sync::Arc;
use ui::{Session, UiConfig, run_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = UiConfig::from_env();

    common::setup_logging(config.environment);

    tracing::info!(
        config = ?config,
        "Loaded configuration"
    );

    let session = Session::from_config(&config)?;
    tracing::info!(output_dir = %config.output_dir.display(), "Saving detections");

    match session.client().health().await {
        Ok(()) => tracing::info!(api_url = %config.api_url, "Inference service is up"),
        Err(e) => tracing::warn!(
            api_url = %config.api_url,
            error = %e,
            "Inference service is not reachable yet"
        ),
    }

    run_server(&config, Arc::new(session)).await
}
