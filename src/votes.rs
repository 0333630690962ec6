use crate::db::models::{MAX_VOTE_VALUE, MIN_VOTE_VALUE, Role};
use crate::error::VoteError;
use crate::startup::AppState;
use crate::stats::Stats;
use axum::{
    extract::{Extension, Json, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub role: Option<String>,
    /// An integer, or a string holding one.
    pub value: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub ok: bool,
    pub stats: Stats,
}

impl VoteRequest {
    pub fn validate(&self) -> Result<(Role, i32), VoteError> {
        let role = self
            .role
            .as_deref()
            .and_then(|code| code.parse::<Role>().ok())
            .ok_or(VoteError::InvalidRole)?;

        let value = match &self.value {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .filter(|v| (i64::from(MIN_VOTE_VALUE)..=i64::from(MAX_VOTE_VALUE)).contains(v))
        .ok_or(VoteError::InvalidValue)?;

        Ok((role, value as i32))
    }
}

/// Record a vote and return the aggregate that includes it
pub async fn submit_vote(
    Extension(app_state): Extension<AppState>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<impl IntoResponse, VoteError> {
    let Json(payload) =
        payload.map_err(|rejection| VoteError::MalformedBody(rejection.body_text()))?;
    let (role, value) = payload.validate()?;

    let stats = app_state.store.add_vote(role, value).await.map_err(|e| {
        warn!(error = %e, %role, value, "vote submission failed");
        VoteError::from(e)
    })?;
    info!(%role, value, total_votes = stats.total_votes, "vote recorded");

    Ok((StatusCode::OK, Json(VoteResponse { ok: true, stats })))
}

/// Current aggregate, recomputed from the full vote set
pub async fn get_stats(
    Extension(app_state): Extension<AppState>,
) -> Result<impl IntoResponse, VoteError> {
    let stats = app_state.store.get_snapshot().await?;
    Ok((StatusCode::OK, Json(stats)))
}
