/// Per-user AI request limits
///
/// Two fixed windows per user, both stored in `ai_rate_limits`:
///
/// - **minute**: at most `per_minute` calls until `minute_reset_at`
/// - **day**: at most `per_day` calls until `day_reset_at`
///
/// A window whose reset time has passed starts over at zero with a new reset
/// time of `now + length`. A call is allowed only if both counters are below
/// their limits, and then increments both.
///
/// # Example
///
/// ```no_run
/// use planboard_shared::ai_limit::{AiLimits, AiRateLimiter};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = AiRateLimiter::new(pool, AiLimits { per_minute: 5, per_day: 50 });
/// limiter.check_and_increment(user_id).await?;
/// // call the model...
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::ai_rate_limit::AiRateLimit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitWindow {
    Minute,
    Day,
}

impl LimitWindow {
    pub fn length(&self) -> Duration {
        match self {
            LimitWindow::Minute => Duration::seconds(60),
            LimitWindow::Day => Duration::hours(24),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LimitWindow::Minute => "per-minute",
            LimitWindow::Day => "daily",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AiLimits {
    pub per_minute: u32,
    pub per_day: u32,
}

impl Default for AiLimits {
    fn default() -> Self {
        Self {
            per_minute: 5,
            per_day: 50,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AiLimitError {
    #[error("AI {} limit of {limit} requests reached", .window.as_str())]
    LimitExceeded {
        window: LimitWindow,
        limit: u32,
        /// Seconds until the blocking window resets
        retry_after: u64,
    },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Current counters as shown to the user
#[derive(Debug, Clone, Serialize)]
pub struct AiUsage {
    pub minute_used: u32,
    pub minute_limit: u32,
    pub minute_resets_at: DateTime<Utc>,
    pub day_used: u32,
    pub day_limit: u32,
    pub day_resets_at: DateTime<Utc>,
}

/// Starts over any window whose reset time has passed
pub fn roll_windows(mut row: AiRateLimit, now: DateTime<Utc>) -> AiRateLimit {
    if now >= row.minute_reset_at {
        row.minute_count = 0;
        row.minute_reset_at = now + LimitWindow::Minute.length();
    }
    if now >= row.day_reset_at {
        row.day_count = 0;
        row.day_reset_at = now + LimitWindow::Day.length();
    }
    row
}

fn seconds_until(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (reset_at - now).num_seconds().max(1) as u64
}

/// Decides one call: the incremented row to persist, or the denial
///
/// The day window is checked first so a user who spent the whole day's
/// allowance is told to come back tomorrow rather than in a minute.
pub fn evaluate(
    row: AiRateLimit,
    limits: AiLimits,
    now: DateTime<Utc>,
) -> Result<AiRateLimit, AiLimitError> {
    let mut row = roll_windows(row, now);

    if row.day_count.max(0) as u32 >= limits.per_day {
        return Err(AiLimitError::LimitExceeded {
            window: LimitWindow::Day,
            limit: limits.per_day,
            retry_after: seconds_until(row.day_reset_at, now),
        });
    }

    if row.minute_count.max(0) as u32 >= limits.per_minute {
        return Err(AiLimitError::LimitExceeded {
            window: LimitWindow::Minute,
            limit: limits.per_minute,
            retry_after: seconds_until(row.minute_reset_at, now),
        });
    }

    row.minute_count += 1;
    row.day_count += 1;
    row.updated_at = now;
    Ok(row)
}

/// Usage view of a row at `now`, with expired windows shown as empty
pub fn usage_of(row: AiRateLimit, limits: AiLimits, now: DateTime<Utc>) -> AiUsage {
    let row = roll_windows(row, now);
    AiUsage {
        minute_used: row.minute_count.max(0) as u32,
        minute_limit: limits.per_minute,
        minute_resets_at: row.minute_reset_at,
        day_used: row.day_count.max(0) as u32,
        day_limit: limits.per_day,
        day_resets_at: row.day_reset_at,
    }
}

/// Database-backed limiter
#[derive(Debug, Clone)]
pub struct AiRateLimiter {
    db: PgPool,
    limits: AiLimits,
}

impl AiRateLimiter {
    pub fn new(db: PgPool, limits: AiLimits) -> Self {
        Self { db, limits }
    }

    pub fn limits(&self) -> AiLimits {
        self.limits
    }

    /// Counts one AI call against the user's windows, or refuses it
    ///
    /// The row is locked for the duration of the check so concurrent calls
    /// from one user are serialized.
    pub async fn check_and_increment(&self, user_id: Uuid) -> Result<AiUsage, AiLimitError> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let current = AiRateLimit::find_for_update(&mut *tx, user_id)
            .await?
            .unwrap_or_else(|| AiRateLimit::empty(user_id, now));

        let updated = match evaluate(current, self.limits, now) {
            Ok(updated) => updated,
            Err(err) => {
                tracing::warn!(user_id = %user_id, error = %err, "AI request rate limited");
                return Err(err);
            }
        };

        AiRateLimit::save(&mut *tx, &updated).await?;
        tx.commit().await?;

        tracing::debug!(
            user_id = %user_id,
            minute_count = updated.minute_count,
            day_count = updated.day_count,
            "AI request counted"
        );

        Ok(usage_of(updated, self.limits, now))
    }

    pub async fn usage(&self, user_id: Uuid) -> Result<AiUsage, AiLimitError> {
        let now = Utc::now();
        let row = AiRateLimit::find(&self.db, user_id)
            .await?
            .unwrap_or_else(|| AiRateLimit::empty(user_id, now));

        Ok(usage_of(row, self.limits, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: AiLimits = AiLimits {
        per_minute: 3,
        per_day: 5,
    };

    fn fresh(now: DateTime<Utc>) -> AiRateLimit {
        AiRateLimit::empty(Uuid::new_v4(), now)
    }

    #[test]
    fn test_first_call_opens_windows() {
        let now = Utc::now();
        let row = evaluate(fresh(now), LIMITS, now).unwrap();

        assert_eq!(row.minute_count, 1);
        assert_eq!(row.day_count, 1);
        assert_eq!(row.minute_reset_at, now + Duration::seconds(60));
        assert_eq!(row.day_reset_at, now + Duration::hours(24));
    }

    #[test]
    fn test_denies_call_over_minute_limit() {
        let now = Utc::now();
        let mut row = fresh(now);
        for _ in 0..LIMITS.per_minute {
            row = evaluate(row, LIMITS, now).unwrap();
        }

        let later = now + Duration::seconds(20);
        match evaluate(row.clone(), LIMITS, later) {
            Err(AiLimitError::LimitExceeded {
                window,
                limit,
                retry_after,
            }) => {
                assert_eq!(window, LimitWindow::Minute);
                assert_eq!(limit, 3);
                assert_eq!(retry_after, 40);
            }
            other => panic!("expected minute limit, got {:?}", other),
        }

        // a new minute lets the next call through
        let next_minute = now + Duration::seconds(61);
        let row = evaluate(row, LIMITS, next_minute).unwrap();
        assert_eq!(row.minute_count, 1);
        assert_eq!(row.day_count, 4);
    }

    #[test]
    fn test_day_limit_wins_over_minute() {
        let now = Utc::now();
        let mut row = fresh(now);
        for minute in 0..LIMITS.per_day {
            row = evaluate(row, LIMITS, now + Duration::minutes(i64::from(minute) * 2)).unwrap();
        }
        assert_eq!(row.day_count, 5);

        let at = now + Duration::minutes(30);
        let err = evaluate(row.clone(), LIMITS, at).unwrap_err();
        assert!(matches!(
            err,
            AiLimitError::LimitExceeded {
                window: LimitWindow::Day,
                ..
            }
        ));

        let tomorrow = now + Duration::hours(24);
        assert!(evaluate(row, LIMITS, tomorrow).is_ok());
    }

    #[test]
    fn test_retry_after_is_at_least_one_second() {
        let now = Utc::now();
        let mut row = fresh(now);
        row.minute_count = 3;
        row.minute_reset_at = now + Duration::milliseconds(300);
        row.day_reset_at = now + Duration::hours(1);

        match evaluate(row, LIMITS, now) {
            Err(AiLimitError::LimitExceeded { retry_after, .. }) => assert_eq!(retry_after, 1),
            other => panic!("expected limit, got {:?}", other),
        }
    }

    #[test]
    fn test_usage_hides_expired_windows() {
        let now = Utc::now();
        let mut row = fresh(now);
        row.minute_count = 3;
        row.minute_reset_at = now - Duration::seconds(1);
        row.day_count = 4;
        row.day_reset_at = now + Duration::hours(2);

        let usage = usage_of(row, LIMITS, now);
        assert_eq!(usage.minute_used, 0);
        assert_eq!(usage.day_used, 4);
        assert_eq!(usage.day_limit, 5);
    }

    #[test]
    fn test_error_message() {
        let err = AiLimitError::LimitExceeded {
            window: LimitWindow::Day,
            limit: 50,
            retry_after: 10,
        };
        assert_eq!(err.to_string(), "AI daily limit of 50 requests reached");
    }
}
