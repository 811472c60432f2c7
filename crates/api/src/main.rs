use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use frontdesk_api::config::ServerConfig;
use frontdesk_api::engine::{Coordinator, CoordinatorSettings, VenueSeed};
use frontdesk_api::fanout::EventFanout;
use frontdesk_api::router::build_app_router;
use frontdesk_api::state::AppState;
use frontdesk_api::ws;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "frontdesk_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        demo_mode = config.demo_mode,
        "Loaded server configuration"
    );

    // --- Database (optional) ---
    let pool = match &config.database_url {
        Some(database_url) => {
            let pool = frontdesk_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            frontdesk_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");
            Some(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, state is held in memory only");
            None
        }
    };

    // --- Venue seed ---
    let seed = match (&pool, &config.venue_seed_path) {
        (Some(pool), _) => VenueSeed::from_db(pool)
            .await
            .expect("Failed to load venue from database"),
        (None, Some(path)) => {
            VenueSeed::from_json_file(path).expect("Failed to load venue seed file")
        }
        (None, None) => VenueSeed::demo(),
    };
    tracing::info!(
        resources = seed.resources.len(),
        customers = seed.customers.len(),
        open_visits = seed.visits.len(),
        "Venue loaded"
    );

    // --- Event bus ---
    let event_bus = Arc::new(frontdesk_events::EventBus::default());

    // --- Coordinator ---
    let coordinator = Arc::new(Coordinator::new(
        seed,
        CoordinatorSettings::from_config(&config),
        Arc::clone(&event_bus),
    ));

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // --- Event subscribers ---
    let fanout_handle = tokio::spawn(
        EventFanout::new(Arc::clone(&ws_manager)).run(event_bus.subscribe()),
    );

    let mut persistence_handles = Vec::new();
    if let Some(pool) = &pool {
        persistence_handles.push(tokio::spawn(frontdesk_events::EventPersistence::run(
            pool.clone(),
            event_bus.subscribe(),
        )));
        persistence_handles.push(tokio::spawn(frontdesk_events::StateWriteBack::run(
            pool.clone(),
            event_bus.subscribe(),
        )));
    }
    tracing::info!(
        durable = !persistence_handles.is_empty(),
        "Event services started"
    );
    coordinator.announce_released_holds("system").await;

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        event_bus: Arc::clone(&event_bus),
        coordinator,
    };

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
    tracing::info!("Server stopped accepting connections, cleaning up");
    let drain = Duration::from_secs(config.shutdown_timeout_secs);

    // The channel closes once the last AppState clone is gone.
    drop(event_bus);
    let _ = tokio::time::timeout(drain, fanout_handle).await;
    for handle in persistence_handles {
        let _ = tokio::time::timeout(drain, handle).await;
    }
    tracing::info!("Event services shut down");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_handle.abort();
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
