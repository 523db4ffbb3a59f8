use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spyroom::{catalog::Catalog, config::Config, state::AppState, store::MemoryStore};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spyroom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting spyroom...");

    let config = Config::from_env();

    let catalog = match &config.catalog_path {
        Some(path) => match Catalog::from_file(path) {
            Ok(catalog) => {
                tracing::info!("Loaded {} items from {}", catalog.len(), path.display());
                catalog
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load item catalog from {}: {}. Using built-in items.",
                    path.display(),
                    e
                );
                Catalog::builtin()
            }
        },
        None => Catalog::builtin(),
    };

    if config.rng_seed.is_some() {
        tracing::warn!("SPYROOM_RNG_SEED is set, games are deterministic");
    }

    let addr = config.bind_addr;
    let state = Arc::new(AppState::with_parts(
        Arc::new(MemoryStore::new()),
        catalog,
        config,
    ));
    let app = spyroom::app(state);

    tracing::info!("Listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
