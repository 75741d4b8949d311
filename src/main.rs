//! Library inventory server - REST API over the book inventory

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use library_inventory_server::{
    api,
    config::AppConfig,
    repository::{InventoryStore, Repository},
    services::cache,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "library_inventory_server={},tower_http=debug",
            config.logging.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting library inventory server v{}", env!("CARGO_PKG_VERSION"));

    // Build the inventory; it lives for the whole process and is never persisted
    let store = if config.inventory.seed {
        InventoryStore::seeded()
    } else {
        InventoryStore::new()
    };

    let cache = cache::connect(&config.cache, &config.redis)
        .await
        .context("Failed to initialize cache backend")?;

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let prune_every = Duration::from_secs(config.rate_limit.prune_interval_secs.max(1));
    let state = AppState::new(config, Repository::new(store), cache);
    state.services.gate.spawn_pruner(prune_every);
    let app = api::create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    // Rate budgets are keyed by the peer address
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
