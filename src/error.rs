use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failure reported by a repository call once its retries are exhausted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("vote store unreachable: {0}")]
    Transient(String),
    #[error("vote store error: {0}")]
    Persistence(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("role must be one of ГДф or СВ")]
    InvalidRole,
    #[error("value must be an integer from 10 to 100")]
    InvalidValue,
    #[error("{0}")]
    MalformedBody(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("{0}: expected a number from 0 to 100")]
    InvalidSettings(&'static str),
    #[error("failed to reset votes: {0}")]
    ResetFailed(StoreError),
    #[error("settings unavailable: {0}")]
    SettingsUnavailable(StoreError),
    #[error("failed to save settings: {0}")]
    SettingsSaveFailed(StoreError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                StoreError::Transient(error.to_string())
            }
            other => StoreError::Persistence(other.to_string()),
        }
    }
}

impl IntoResponse for VoteError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            VoteError::InvalidRole => (StatusCode::BAD_REQUEST, "Invalid role"),
            VoteError::InvalidValue => (StatusCode::BAD_REQUEST, "Invalid value"),
            VoteError::MalformedBody(_) => (StatusCode::BAD_REQUEST, "Invalid request body"),
            VoteError::Store(StoreError::Transient(_)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Network error, please try again",
            ),
            VoteError::Store(StoreError::Persistence(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Request failed")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "details": self.to_string()
        }));

        (status, body).into_response()
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AdminError::InvalidSettings(_) => (StatusCode::BAD_REQUEST, "Invalid settings"),
            AdminError::ResetFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to reset votes")
            }
            AdminError::SettingsUnavailable(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load settings")
            }
            AdminError::SettingsSaveFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to save settings")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "details": self.to_string()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_transient() {
        assert!(StoreError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!StoreError::from(sqlx::Error::RowNotFound).is_transient());
    }

    #[test]
    fn transient_store_failure_maps_to_service_unavailable() {
        let response = VoteError::Store(StoreError::Transient("timeout".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = VoteError::Store(StoreError::Persistence("bad row".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = VoteError::InvalidValue.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
