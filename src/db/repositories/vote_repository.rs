use crate::db::connection::DbPool;
use crate::db::models::{Role, Vote, VoteRecord};
use crate::db::retry::{RetryPolicy, with_retry};
use crate::error::StoreError;
use async_trait::async_trait;
use sqlx::Row;
use sqlx::types::chrono::{DateTime, Utc};
use tracing::warn;

/// System of record for raw votes.
#[async_trait]
pub trait VoteRepository: Send + Sync {
    async fn create(&self, role: Role, value: i32) -> Result<Vote, StoreError>;
    async fn list_all(&self) -> Result<Vec<VoteRecord>, StoreError>;
    async fn delete_all(&self) -> Result<(), StoreError>;
}

pub struct PgVoteRepository {
    pool: DbPool,
    retry: RetryPolicy,
}

impl PgVoteRepository {
    pub fn new(pool: DbPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }
}

#[async_trait]
impl VoteRepository for PgVoteRepository {
    async fn create(&self, role: Role, value: i32) -> Result<Vote, StoreError> {
        let pool = &self.pool;
        let row = with_retry(&self.retry, "create vote", || async move {
            sqlx::query(
                "INSERT INTO votes (role, value) VALUES ($1, $2) RETURNING id, date_created",
            )
            .bind(role.code())
            .bind(value)
            .fetch_one(pool)
            .await
        })
        .await?;

        Ok(Vote {
            id: row.get("id"),
            role,
            value,
            date_created: row.get::<DateTime<Utc>, _>("date_created"),
        })
    }

    async fn list_all(&self) -> Result<Vec<VoteRecord>, StoreError> {
        let pool = &self.pool;
        let rows = with_retry(&self.retry, "list votes", || async move {
            sqlx::query("SELECT role, value FROM votes")
                .fetch_all(pool)
                .await
        })
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let code: String = r.get("role");
                match code.parse::<Role>() {
                    Ok(role) => Some(VoteRecord {
                        role,
                        value: r.get("value"),
                    }),
                    Err(_) => {
                        warn!(role = %code, "skipping vote with unknown role");
                        None
                    }
                }
            })
            .collect())
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        let pool = &self.pool;
        with_retry(&self.retry, "delete votes", || async move {
            sqlx::query("DELETE FROM votes").execute(pool).await
        })
        .await?;

        Ok(())
    }
}
