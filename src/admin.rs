use crate::db::models::{Settings, SettingsPatch};
use crate::error::AdminError;
use crate::startup::AppState;
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use tracing::{error, info};

// Request/Response DTOs
#[derive(Debug, Default, Deserialize)]
pub struct SettingsPatchRequest {
    #[serde(default, deserialize_with = "present")]
    pub course_test_percent_gdf: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub course_test_percent_sv: Option<Value>,
}

#[derive(Debug, Default, Serialize)]
pub struct PublicSettings {
    pub course_test_percent: Option<i32>,
    pub course_test_percent_gdf: Option<i32>,
    pub course_test_percent_sv: Option<i32>,
}

impl From<Settings> for PublicSettings {
    fn from(settings: Settings) -> Self {
        Self {
            course_test_percent: settings.course_test_percent,
            course_test_percent_gdf: settings.course_test_percent_gdf,
            course_test_percent_sv: settings.course_test_percent_sv,
        }
    }
}

// keeps an explicit `null` distinguishable from an absent field
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn percent(field: &'static str, value: &Option<Value>) -> Result<Option<Option<i32>>, AdminError> {
    let value = match value {
        None => return Ok(None),
        Some(Value::Null) => return Ok(Some(None)),
        Some(value) => value,
    };

    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite() && (0.0..=100.0).contains(n))
    .ok_or(AdminError::InvalidSettings(field))?;

    Ok(Some(Some(number.round().clamp(0.0, 100.0) as i32)))
}

impl SettingsPatchRequest {
    pub fn validate(&self) -> Result<SettingsPatch, AdminError> {
        Ok(SettingsPatch {
            course_test_percent_gdf: percent(
                "course_test_percent_gdf",
                &self.course_test_percent_gdf,
            )?,
            course_test_percent_sv: percent("course_test_percent_sv", &self.course_test_percent_sv)?,
        })
    }
}

/// Public view of the test results; never fails, falls back to nulls
pub async fn get_public_settings(Extension(app_state): Extension<AppState>) -> impl IntoResponse {
    let settings = match app_state.settings.get().await {
        Ok(settings) => PublicSettings::from(settings),
        Err(e) => {
            error!("Failed to load settings: {}", e);
            PublicSettings::default()
        }
    };
    (StatusCode::OK, Json(settings))
}

pub async fn get_admin_settings(
    Extension(app_state): Extension<AppState>,
) -> Result<impl IntoResponse, AdminError> {
    let settings = app_state.settings.get().await.map_err(|e| {
        error!("Failed to load settings: {}", e);
        AdminError::SettingsUnavailable(e)
    })?;
    Ok((StatusCode::OK, Json(settings)))
}

pub async fn patch_settings(
    Extension(app_state): Extension<AppState>,
    Json(payload): Json<SettingsPatchRequest>,
) -> Result<impl IntoResponse, AdminError> {
    let patch = payload.validate()?;

    let settings = app_state.settings.update(&patch).await.map_err(|e| {
        error!("Failed to save settings: {}", e);
        AdminError::SettingsSaveFailed(e)
    })?;
    info!(?patch, "settings updated");

    Ok((StatusCode::OK, Json(settings)))
}

/// Delete every vote and push the emptied stats to all live viewers
pub async fn reset_votes(
    Extension(app_state): Extension<AppState>,
) -> Result<impl IntoResponse, AdminError> {
    let stats = app_state.store.reset().await.map_err(|e| {
        error!("Failed to reset votes: {}", e);
        AdminError::ResetFailed(e)
    })?;
    info!("all votes deleted");

    Ok((
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "totalVotes": stats.total_votes
        })),
    ))
}
