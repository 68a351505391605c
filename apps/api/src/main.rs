mod auth;
mod classifier;
mod config;
mod db;
mod errors;
mod extract;
mod feed;
mod models;
mod preferences;
mod routes;
mod state;
mod store;
mod telemetry;
mod triage;
mod zones;

#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::classifier::{ClassifierAdapter, HttpClassifier};
use crate::config::{Config, StoreBackend};
use crate::db::create_pool;
use crate::feed::{poller::spawn_poller, ChangeFeed};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{MemoryStore, NotificationStore, PgStore};
use crate::triage::sources::{HttpJsonSource, SourceAdapter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting triage API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the store
    let store: Arc<dyn NotificationStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;
            Arc::new(PgStore::new(
                create_pool(url, config.db_max_connections).await?,
            ))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store; notifications will not survive a restart");
            Arc::new(MemoryStore::new())
        }
    };

    // Initialize classifier
    if config.classifier_api_token.is_none() {
        warn!("CLASSIFIER_API_TOKEN not set; every notification will take the fallback path");
    }
    let backend = HttpClassifier::new(
        config.classifier_url.clone(),
        config.classifier_api_token.clone(),
        config.classifier_model.clone(),
    )?;
    let classifier = ClassifierAdapter::new(Arc::new(backend), config.confidence_threshold);
    info!(
        "Classifier initialized (model: {}, threshold: {:.2})",
        config.classifier_model,
        classifier.threshold()
    );

    // Initialize source adapters
    let mut sources: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    for (name, url) in &config.source_feeds {
        sources.push(Arc::new(HttpJsonSource::new(name.clone(), url.clone())?));
        info!("Source adapter '{name}' -> {url}");
    }

    // Change feed: mutations publish directly; the poller republishes recent rows
    let feed = ChangeFeed::default();
    if config.poll_interval_secs > 0 {
        spawn_poller(
            Arc::clone(&store),
            feed.clone(),
            Duration::from_secs(config.poll_interval_secs),
        );
    }

    // Build app state
    let state = AppState {
        store,
        classifier,
        sources: Arc::new(sources),
        feed,
        config: config.clone(),
    };

    // Build router
    // TODO: restrict CORS origins once the web client has a fixed host
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
