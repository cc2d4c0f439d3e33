use inference::{
    AppState, Detector, InferenceConfig, backend::InferenceBackend, backend::ort::OrtBackend,
    logging::setup_logging, run_server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = InferenceConfig::from_env()?;

    let _telemetry = setup_logging(&config)?;

    tracing::info!(
        config = ?config,
        "Loaded configuration"
    );

    tracing::info!(
        model_path = %config.model_path,
        device = config.device.as_str(),
        "Loading inference model"
    );
    let backend = OrtBackend::load_model(&config)?;
    tracing::info!("Model loaded successfully");

    let detector = Detector::new(backend, config.confidence_threshold);
    run_server(&config, AppState::new(detector)).await
}
