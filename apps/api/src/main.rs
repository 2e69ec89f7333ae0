//! Retreat access API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dev_seed;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use retreat_access_core::AppError;
use retreat_access_infrastructure::InMemoryAccessStore;
use tracing::{info, warn};

use crate::api_config::{ApiConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;

    let app_state = match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = api_services::connect_and_migrate(database_url).await?;
            if config.migrate_only {
                info!("database migrations applied successfully");
                return Ok(());
            }

            if config.dev_seed_owner.is_some() {
                warn!("DEV_SEED_OWNER_ID is ignored when DATABASE_URL is set");
            }

            api_services::build_app_state(api_services::postgres_ports(pool), &config, "postgres")
        }
        None => {
            let store = Arc::new(InMemoryAccessStore::new());
            if let Some(owner) = config.dev_seed_owner {
                dev_seed::run(&store, owner).await?;
            }

            warn!("DATABASE_URL is not set, state is kept in memory only");
            api_services::build_app_state(api_services::in_memory_ports(store), &config, "in_memory")
        }
    };

    let app = api_router::build_router(app_state);
    let address = config.socket_address()?;

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, "retreat-access-api listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }

    info!("shutdown signal received");
}
