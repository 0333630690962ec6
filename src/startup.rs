use crate::admin::{get_admin_settings, get_public_settings, patch_settings, reset_votes};
use crate::config::Config;
use crate::db::{
    DbPool, PgSettingsRepository, PgVoteRepository, SettingsRepository, VoteRepository,
    pool_stats,
};
use crate::sse::stats_stream;
use crate::stats::StatsStore;
use crate::votes::{get_stats, submit_vote};
use axum::{
    Router,
    extract::Extension,
    http::{
        StatusCode,
        header::{ACCEPT, CONTENT_TYPE},
    },
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

#[derive(Clone)]
pub struct AppState {
    pub store: StatsStore,
    pub settings: Arc<dyn SettingsRepository>,
    pub heartbeat: Duration,
}

impl AppState {
    pub fn new(db: DbPool, config: &Config) -> Self {
        let votes: Arc<dyn VoteRepository> =
            Arc::new(PgVoteRepository::new(db.clone(), config.retry));
        let settings: Arc<dyn SettingsRepository> =
            Arc::new(PgSettingsRepository::new(db.clone(), config.retry));

        let period = config.health_check;
        tokio::spawn(async move {
            let mut interval = interval(period);
            loop {
                interval.tick().await;
                match db.acquire().await {
                    Ok(conn) => {
                        drop(conn);
                        debug!("{}", pool_stats(&db));
                    }
                    Err(e) => {
                        error!("Database connection health check failed: {}", e);
                    }
                }
            }
        });

        Self::with_repositories(votes, settings, config.heartbeat, config.subscriber_capacity)
    }

    pub fn with_repositories(
        votes: Arc<dyn VoteRepository>,
        settings: Arc<dyn SettingsRepository>,
        heartbeat: Duration,
        subscriber_capacity: usize,
    ) -> Self {
        AppState {
            store: StatsStore::new(votes, subscriber_capacity),
            settings,
            heartbeat,
        }
    }
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/vote", post(submit_vote))
        .route("/api/stats", get(get_stats))
        .route("/api/stats/stream", get(stats_stream))
        .route("/api/settings", get(get_public_settings))
        .route(
            "/api/admin/settings",
            get(get_admin_settings).patch(patch_settings),
        )
        .route("/api/admin/votes/reset", post(reset_votes))
        .layer(Extension(app_state))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::mirror_request())
                .allow_credentials(true)
                .allow_methods([
                    axum::http::Method::POST,
                    axum::http::Method::GET,
                    axum::http::Method::PATCH,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([CONTENT_TYPE, ACCEPT]),
        )
        .layer(TraceLayer::new_for_http())
        .fallback(handler_404)
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nothing to see here")
}
