//! Library inventory server
//!
//! Keeps an in-memory catalog of books, enforces borrow/return accounting
//! under concurrent access and fronts it with a read-through/write-through
//! cache, served as a REST JSON API.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

impl AppState {
    /// Wire services over an explicitly constructed store and cache
    pub fn new(
        config: AppConfig,
        repository: repository::Repository,
        cache: Arc<dyn services::cache::BookCache>,
    ) -> Self {
        let services = services::Services::new(repository, cache, &config);
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
        }
    }
}
