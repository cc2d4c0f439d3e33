use common::{env_or, env_string_or};
use std::path::PathBuf;
use std::time::Duration;

pub use common::Environment;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub environment: Environment,
    pub bind_addr: String,
    /// Base URL of the inference service, without a trailing path.
    pub api_url: String,
    pub output_dir: PathBuf,
    pub request_timeout: Duration,
}

impl UiConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Self {
        let environment = Environment::from_env();

        let bind_addr = env_string_or("UI_ADDR", "0.0.0.0:7860");

        let api_url = env_string_or("UI_API_URL", "http://localhost:8000")
            .trim_end_matches('/')
            .to_string();

        let output_dir = PathBuf::from(env_string_or("UI_OUTPUT_DIR", "ui_outputs"));

        let request_timeout = Duration::from_secs(env_or("UI_REQUEST_TIMEOUT_SECS", 60));

        Self {
            environment,
            bind_addr,
            api_url,
            output_dir,
            request_timeout,
        }
    }

    /// Create default configuration for testing
    #[cfg(test)]
    pub fn test_default() -> Self {
        Self {
            environment: Environment::Development,
            bind_addr: "127.0.0.1:0".to_string(),
            api_url: "http://localhost:8000".to_string(),
            output_dir: PathBuf::from("ui_outputs"),
            request_timeout: Duration::from_secs(60),
        }
    }
}
