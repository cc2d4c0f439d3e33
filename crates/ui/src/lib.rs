pub mod client;
pub mod config;
pub mod export;
pub mod interaction;
pub mod overlay;
pub mod web;

// Re-export commonly used types for convenience
pub use client::{ClientError, InferenceClient};
pub use config::UiConfig;
pub use export::save_detections_json;
pub use interaction::{Interaction, InteractionError, Session};
pub use overlay::Overlay;
pub use web::{router, run_server};
