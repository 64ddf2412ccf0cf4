use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hostbook_core::store::memory::MemoryStore;
use hostbook_core::store::DraftStore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hostbook_api::config::ServerConfig;
use hostbook_api::media::LocalMediaStore;
use hostbook_api::router::build_app_router;
use hostbook_api::sessions::run_idle_sweep;
use hostbook_api::state::AppState;
use hostbook_events::{EventBus, EventLogger, EventPersistence};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hostbook_api=debug,hostbook_core=debug,tower_http=debug".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let events_cancel = CancellationToken::new();

    // --- Store ---
    let (store, events_handle) = match &config.database_url {
        Some(database_url) => {
            let pool = hostbook_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            hostbook_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            hostbook_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            let handle = tokio::spawn(EventPersistence::run(
                pool.clone(),
                event_bus.subscribe(),
                events_cancel.clone(),
            ));
            let store: Arc<dyn DraftStore> = Arc::new(hostbook_db::PgDraftStore::new(pool));
            (store, handle)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            let handle = tokio::spawn(EventLogger::run(event_bus.subscribe(), events_cancel.clone()));
            let store: Arc<dyn DraftStore> = Arc::new(MemoryStore::new());
            (store, handle)
        }
    };

    // --- App state ---
    let media = Arc::new(LocalMediaStore::new(config.media_dir.clone()));
    let state = AppState::new(store, config.clone(), Arc::clone(&event_bus), media)
        .expect("Invalid server configuration");
    let sessions = Arc::clone(&state.sessions);

    // --- Idle session sweep ---
    let idle_ttl = Duration::from_secs(config.session_idle_ttl_secs);
    let sweep_cancel = CancellationToken::new();
    let sweep_handle = tokio::spawn(run_idle_sweep(
        Arc::clone(&sessions),
        idle_ttl,
        (idle_ttl / 4).max(Duration::from_secs(1)),
        sweep_cancel.clone(),
    ));

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, flushing editor sessions");
    sweep_cancel.cancel();
    let _ = sweep_handle.await;

    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    match tokio::time::timeout(shutdown_timeout, sessions.close_all()).await {
        Ok(0) => tracing::info!("All editor sessions flushed"),
        Ok(unclean) => tracing::warn!(unclean, "Some editor sessions closed with unsaved changes"),
        Err(_) => tracing::error!("Timed out flushing editor sessions"),
    }

    events_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), events_handle).await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
