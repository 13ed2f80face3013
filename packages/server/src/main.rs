use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tracing::{Level, info};

use engine::{
    CodeBuilder, ContainerHost, DockerContainerHost, GoPackageAnalyzer, WorkerPool,
};
use server::config::AppConfig;
use server::hub::EventHub;
use server::state::AppState;
use server::store::{PgStore, Store};
use server::{build_router, database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let config = AppConfig::load()?;

    let db = database::init_db(&config.database.url).await?;
    let store: Arc<dyn Store> = Arc::new(PgStore::new(db));

    let host: Arc<dyn ContainerHost> = Arc::new(
        DockerContainerHost::initialize(&config.engine, config.engine.max_workers).await?,
    );
    let pool = Arc::new(WorkerPool::new(&config.engine, host.clone()));
    let builder = Arc::new(
        CodeBuilder::new(vec![Arc::new(GoPackageAnalyzer::new())])
            .with_max_code_length(config.engine.max_code_length),
    );

    let hub = EventHub::new(store.clone(), builder, pool.clone(), config.hub.clone());
    let restored = hub.restore_rooms().await?;
    info!(rooms = restored, "Restored room hubs");

    let cors = cors_layer(&config)?;
    let state = AppState {
        hub,
        store,
        config: config.clone(),
    };
    let app = build_router(state).layer(cors);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // let in-flight jobs reach their verdicts, then drop the containers
    pool.shutdown();
    host.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
}

fn cors_layer(config: &AppConfig) -> anyhow::Result<CorsLayer> {
    let layer = if config.server.cors.allow_origins.is_empty() {
        // SSE clients connect from arbitrary frontends
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .server
            .cors
            .allow_origins
            .iter()
            .map(|origin| origin.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()?;
        CorsLayer::new().allow_origin(origins)
    };

    Ok(layer
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .max_age(Duration::from_secs(config.server.cors.max_age)))
}
