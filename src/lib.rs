// Core modules
pub mod broker;
pub mod config;
pub mod execution;
pub mod models;
pub mod notifier;
pub mod predictor;
pub mod scheduler;

// Re-export commonly used types
pub use config::Config;
pub use execution::TradeError;
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
