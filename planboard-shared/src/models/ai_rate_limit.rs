/// Persisted AI request windows, one row per user
///
/// The window arithmetic lives in [`crate::ai_limit`]; this module only
/// loads and stores the counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AiRateLimit {
    pub user_id: Uuid,
    pub minute_count: i32,
    pub minute_reset_at: DateTime<Utc>,
    pub day_count: i32,
    pub day_reset_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const LIMIT_COLUMNS: &str =
    "user_id, minute_count, minute_reset_at, day_count, day_reset_at, updated_at";

impl AiRateLimit {
    /// Fresh, empty windows starting at `now`
    pub fn empty(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            minute_count: 0,
            minute_reset_at: now,
            day_count: 0,
            day_reset_at: now,
            updated_at: now,
        }
    }

    pub async fn find(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AiRateLimit>(&format!(
            "SELECT {LIMIT_COLUMNS} FROM ai_rate_limits WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Loads the row and locks it until the surrounding transaction ends
    pub async fn find_for_update<'e, E>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, AiRateLimit>(&format!(
            "SELECT {LIMIT_COLUMNS} FROM ai_rate_limits WHERE user_id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    /// Inserts or overwrites the user's row
    pub async fn save<'e, E>(executor: E, row: &AiRateLimit) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO ai_rate_limits (user_id, minute_count, minute_reset_at, day_count, day_reset_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET minute_count = EXCLUDED.minute_count,
                minute_reset_at = EXCLUDED.minute_reset_at,
                day_count = EXCLUDED.day_count,
                day_reset_at = EXCLUDED.day_reset_at,
                updated_at = NOW()
            "#,
        )
        .bind(row.user_id)
        .bind(row.minute_count)
        .bind(row.minute_reset_at)
        .bind(row.day_count)
        .bind(row.day_reset_at)
        .execute(executor)
        .await?;

        Ok(())
    }
}
