use anyhow::{Context, Result};
use axum::{extract::FromRef, Router};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::backend::BackendClient;
use crate::catalog::Catalog;
use crate::config::Settings;
use crate::context::ClientContext;
use crate::storage::{FileStore, KeyValueStore};

// Declare modules
mod auth;
mod auth_middleware;
mod backend;
mod catalog;
mod compare;
mod config;
mod context;
mod customer_forms;
mod debounce;
mod error;
mod favorites;
mod listing;
mod models;
mod query;
mod routes;
mod session;
mod storage;
mod theme;
mod validation;

// Shared by every handler
#[derive(Clone, FromRef)]
struct AppState {
    settings: Arc<Settings>,
    backend: BackendClient,
    catalog: Catalog,
    context: ClientContext,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "kfz_marketplace=info,tower_http=info".into()))
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing kfz marketplace server...");

    let settings = Settings::new().context("Failed to load configuration")?;
    tracing::info!(backend = %settings.backend_url, storage = %settings.storage_path, "Configuration loaded");

    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(&settings.storage_path)
            .with_context(|| format!("Failed to open storage at {}", settings.storage_path))?,
    );

    let backend = BackendClient::new(&settings).context("Failed to build backend client")?;
    let catalog = Catalog::from_settings(&settings, &backend)?;
    let context = ClientContext::init(store, &settings);

    let addr: SocketAddr = settings
        .server_address
        .parse()
        .with_context(|| format!("Invalid server address format: {}", settings.server_address))?;

    let app_state = AppState {
        settings: Arc::new(settings),
        backend,
        catalog,
        context: context.clone(),
    };

    let router: Router = routes::create_router(app_state);
    let app = router.nest_service("/static", ServeDir::new("static"));

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    context.dispose().await;
    Ok(())
}
