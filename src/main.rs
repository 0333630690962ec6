use crate::config::Config;
use crate::startup::{AppState, router};
use crate::stats::StatsStore;
use tracing_subscriber::EnvFilter;

#[macro_use]
extern crate tracing;

mod admin;
mod config;
mod db;
mod error;
mod sse;
mod startup;
mod stats;
mod votes;

#[tokio::main]
async fn main() {
    // initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let pool = match db::init_db(&config.database_url, config.db_max_connections).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("failed to initialise database: {e}");
            std::process::exit(1);
        }
    };

    let app_state = AppState::new(pool, &config);
    let store = app_state.store.clone();

    // warm the cache so the first vote takes the optimistic path
    match store.get_snapshot().await {
        Ok(stats) => info!(total_votes = stats.total_votes, "stats cache warmed"),
        Err(e) => warn!("could not warm stats cache: {e}"),
    }

    let app = router(app_state);

    let addr = config.bind_addr;
    info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Unable to spawn tcp listener");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(store.clone()))
        .await
    {
        error!("server exited unexpectedly: {e}");
    }

    store.wait_idle().await;
    info!("shutdown complete");
}

async fn shutdown_signal(store: StatsStore) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
    store.close();
}
