pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod pdf;
pub mod service;

pub use api::{build_router, AppState};
pub use config::AppConfig;
pub use db::{create_pool, run_migrations};
pub use error::{AppError, AppResult};
