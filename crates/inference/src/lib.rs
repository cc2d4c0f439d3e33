pub mod backend;
pub mod config;
pub mod detector;
pub mod errors;
pub mod labels;
pub mod logging;
pub mod metrics;
pub mod normalize;
pub mod processing;
pub mod server;

// Re-export commonly used types for convenience
pub use backend::{InferenceBackend, InferenceOutput};
pub use config::InferenceConfig;
pub use detector::Detector;
pub use labels::LabelMap;
pub use server::{AppState, router, run_server};
