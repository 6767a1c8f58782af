//! dart-score-back binary entrypoint wiring configuration, storage, REST and SSE layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dart_score_back::{
    config::AppConfig,
    dao::score_store::memory::MemoryScoreStore,
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);
    install_store(&app_state).await;

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Connection string of the score database; unset keeps everything in memory.
const MONGO_URI_ENV: &str = "DART_SCORE_MONGO_URI";

/// Connect MongoDB in the background when [`MONGO_URI_ENV`] is set, otherwise keep
/// everything in memory.
async fn install_store(state: &SharedState) {
    match env::var(MONGO_URI_ENV) {
        Ok(uri) if !uri.trim().is_empty() => spawn_mongo_supervisor(state.clone(), uri),
        _ => {
            info!("{MONGO_URI_ENV} not set; using the in-memory score store");
            state
                .set_score_store(Arc::new(MemoryScoreStore::new()))
                .await;
        }
    }
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: SharedState, uri: String) {
    use dart_score_back::{
        dao::score_store::{
            ScoreStore,
            mongodb::{MongoConfig, MongoScoreStore},
        },
        dao::storage::StorageError,
        services::storage_supervisor,
    };

    tokio::spawn(storage_supervisor::run(state, move || {
        let uri = uri.clone();
        async move {
            let config = MongoConfig::from_uri(&uri).await?;
            let store = MongoScoreStore::connect(config).await?;
            Ok::<_, StorageError>(Arc::new(store) as Arc<dyn ScoreStore>)
        }
    }));
}

#[cfg(not(feature = "mongo-store"))]
fn spawn_mongo_supervisor(state: SharedState, _uri: String) {
    warn!("{MONGO_URI_ENV} set but built without `mongo-store`; staying in degraded mode");
    drop(state);
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
