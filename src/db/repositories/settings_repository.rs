use crate::db::connection::DbPool;
use crate::db::models::{Settings, SettingsPatch};
use crate::db::retry::{RetryPolicy, with_retry};
use crate::error::StoreError;
use async_trait::async_trait;

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Returns the single settings row, or all-empty settings when none exists.
    async fn get(&self) -> Result<Settings, StoreError>;
    async fn update(&self, patch: &SettingsPatch) -> Result<Settings, StoreError>;
}

pub struct PgSettingsRepository {
    pool: DbPool,
    retry: RetryPolicy,
}

impl PgSettingsRepository {
    pub fn new(pool: DbPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }
}

#[async_trait]
impl SettingsRepository for PgSettingsRepository {
    async fn get(&self) -> Result<Settings, StoreError> {
        let pool = &self.pool;
        let row = with_retry(&self.retry, "get settings", || async move {
            sqlx::query_as::<_, Settings>(
                "SELECT id, course_test_percent, course_test_percent_gdf, course_test_percent_sv \
                 FROM survey_settings ORDER BY id LIMIT 1",
            )
            .fetch_optional(pool)
            .await
        })
        .await?;

        Ok(row.unwrap_or_default())
    }

    async fn update(&self, patch: &SettingsPatch) -> Result<Settings, StoreError> {
        let mut settings = self.get().await?;
        settings.apply(patch);

        let pool = &self.pool;
        let gdf = settings.course_test_percent_gdf;
        let sv = settings.course_test_percent_sv;

        let saved = match settings.id {
            Some(id) => {
                with_retry(&self.retry, "update settings", || async move {
                    sqlx::query_as::<_, Settings>(
                        "UPDATE survey_settings \
                         SET course_test_percent_gdf = $2, course_test_percent_sv = $3 \
                         WHERE id = $1 \
                         RETURNING id, course_test_percent, course_test_percent_gdf, course_test_percent_sv",
                    )
                    .bind(id)
                    .bind(gdf)
                    .bind(sv)
                    .fetch_one(pool)
                    .await
                })
                .await?
            }
            None => {
                with_retry(&self.retry, "insert settings", || async move {
                    sqlx::query_as::<_, Settings>(
                        "INSERT INTO survey_settings (course_test_percent_gdf, course_test_percent_sv) \
                         VALUES ($1, $2) \
                         RETURNING id, course_test_percent, course_test_percent_gdf, course_test_percent_sv",
                    )
                    .bind(gdf)
                    .bind(sv)
                    .fetch_one(pool)
                    .await
                })
                .await?
            }
        };

        Ok(saved)
    }
}
