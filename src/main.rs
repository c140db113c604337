use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cache;
mod config;
mod routes;
mod utils;
mod weather;

use cache::CacheStore;
use config::Config;
use routes::{cors_layer, create_router, AppState};
use weather::{FetcherSettings, HttpTransport, SnapshotFetcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_dashboard_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // One cache for the whole process, shared by snapshots and the default city
    let cache = CacheStore::new(config.cache_max_capacity);
    let transport = Arc::new(HttpTransport::new(&config)?);
    let fetcher = Arc::new(SnapshotFetcher::new(
        cache,
        transport,
        FetcherSettings::from_config(&config),
    ));

    let app = create_router(AppState::new(fetcher))
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server starting on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
