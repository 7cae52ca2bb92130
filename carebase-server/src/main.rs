//! carebase server entry point

use carebase_core::Validator;
use carebase_store::{PgStore, SqliteStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use carebase_server::{
    AppState, build_authorizer, build_router,
    config::{LogFormat, LogSettings, ServerConfig, StorageBackend},
};

fn init_logging(settings: &LogSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let (text, json) = match settings.format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(text)
        .with(json)
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    let config_path = std::env::var("CAREBASE_CONFIG").ok();
    let config = match ServerConfig::discover(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_logging(&LogSettings::default());
            tracing::error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.log);
    run(config).await;
}

async fn run(config: ServerConfig) {
    tracing::info!("Starting carebase server...");

    let authorizer = build_authorizer(&config.auth).unwrap_or_else(|e| {
        tracing::error!("Invalid auth configuration: {}", e);
        std::process::exit(1);
    });

    tracing::info!(
        "Auth: {}",
        if config.auth.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );

    let validator = Validator::new();
    let state = match config.storage.backend {
        StorageBackend::Sqlite => {
            let path = &config.storage.sqlite_path;
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                tracing::error!("Failed to create data directory: {}", e);
                std::process::exit(1);
            }

            let store = SqliteStore::open(path).unwrap_or_else(|e| {
                tracing::error!("Failed to open SQLite store: {}", e);
                std::process::exit(1);
            });
            tracing::info!("Storage: sqlite at {}", path.display());
            AppState::new(config.clone(), Arc::new(store), validator, authorizer)
        }
        StorageBackend::Postgres => {
            let pg = &config.storage.postgres;
            let store = PgStore::connect(pg.connect_options(), pg.max_connections)
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("Failed to connect to PostgreSQL: {}", e);
                    std::process::exit(1);
                });
            tracing::info!("Storage: postgres at {}:{}/{}", pg.host, pg.port, pg.database);
            AppState::new(config.clone(), Arc::new(store), validator, authorizer)
        }
    };

    let app = build_router(Arc::new(state));

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .unwrap_or_else(|e| {
        tracing::error!("Server error: {}", e);
    });

    tracing::info!("Server shut down gracefully");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
