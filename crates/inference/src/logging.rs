use crate::config::InferenceConfig;
use common::TelemetryGuard;

const SERVICE_NAME: &str = "inference";

/// Install the tracing subscriber, exporting to OTLP when an endpoint is
/// configured. The returned guard must be held for the life of the process.
pub fn setup_logging(config: &InferenceConfig) -> anyhow::Result<Option<TelemetryGuard>> {
    match config.otel_endpoint.as_deref() {
        Some(endpoint) => Ok(Some(TelemetryGuard::init(
            SERVICE_NAME,
            endpoint,
            config.environment,
        )?)),
        None => {
            common::setup_logging(config.environment);
            Ok(None)
        }
    }
}
