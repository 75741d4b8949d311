//! Business logic services

pub mod auth;
pub mod cache;
pub mod catalog;
pub mod gate;

use std::sync::Arc;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CacheCoordinator,
    pub gate: gate::AccessGate,
    pub repository: Repository,
}

impl Services {
    /// Create all services over the given repository and cache backend
    pub fn new(
        repository: Repository,
        cache: Arc<dyn cache::BookCache>,
        config: &AppConfig,
    ) -> Self {
        Self {
            auth: auth::AuthService::new(config.auth.clone()),
            catalog: catalog::CacheCoordinator::new(
                repository.books.clone(),
                cache,
                &config.cache,
            ),
            gate: gate::AccessGate::new(&config.auth, config.rate_limit.clone()),
            repository,
        }
    }
}
