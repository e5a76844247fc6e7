pub mod api;
pub mod config;
pub mod models;
pub mod service;

pub use api::AppState;
pub use config::AppConfig;
pub use models::{ExtractionRecord, MatchResult, MatchStatus};
pub use service::{GeminiExtractor, ParseStats};
