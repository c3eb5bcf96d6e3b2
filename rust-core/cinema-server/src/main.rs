//! # Cinema Server
//!
//! Binary entry point: reads configuration from the environment, opens the
//! configured record storage, mounts the catalog routes and serves them
//! until Ctrl+C.

use anyhow::Context;
use cinema_core::{
    mount_catalog, CatalogStores, Config, CorsMiddleware, DatabasePool, LoggingMiddleware, Server,
    Storage,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize JSON tracing, `RUST_LOG` overriding the default directive
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cinema=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env().context("invalid configuration")?;

    let mut server = Server::new(config.server_config());
    server.add_middleware(LoggingMiddleware::new());
    if let Some(origin) = &config.cors_origin {
        server.add_middleware(CorsMiddleware::new().allow_origin(origin.as_str()));
    }

    let pool = match &config.storage {
        Storage::Memory => {
            info!(storage = "memory", "Using in-process storage");
            mount_catalog(&mut server, CatalogStores::memory())?;
            None
        }
        Storage::Sql(url) => {
            let pool = DatabasePool::connect(url, Some(config.max_connections))
                .await
                .context("failed to connect to DATABASE_URL")?;
            info!(storage = ?pool.backend(), "Connected to database");
            let stores = CatalogStores::sql(pool.clone())
                .await
                .context("failed to create catalog tables")?;
            mount_catalog(&mut server, stores)?;
            Some(pool)
        }
    };

    server.serve().await?;

    if let Some(pool) = pool {
        pool.close().await;
    }
    info!("Server stopped");
    Ok(())
}
