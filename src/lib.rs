// Filmorate - film ratings, likes and friendships over a REST API

// HTTP routers, extractors and error mapping
pub mod api;
pub mod app_state;
pub mod config;

// Storage contracts, backends and middleware
pub mod infrastructure;

// Domain records
pub mod models;

// Validation and orchestration
pub mod services;

// Common utilities
pub mod error;

// Re-exports for convenience
pub use api::create_router;
pub use app_state::AppState;
pub use config::Config;
pub use error::{AppError, AppResult};
