use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::types::{AttemptStatus, TestStatus};

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ScoredAttemptRow {
    pub(crate) attempt_id: String,
    pub(crate) user_id: String,
    pub(crate) full_name: String,
    pub(crate) test_id: String,
    pub(crate) test_title: String,
    pub(crate) category_id: Option<String>,
    pub(crate) category_name: Option<String>,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
    pub(crate) submitted_at: PrimitiveDateTime,
}

const SCORED_ATTEMPTS: &str = "\
    SELECT a.id AS attempt_id, a.user_id, u.full_name, a.test_id, t.title AS test_title,
           t.category_id, c.name AS category_name,
           COALESCE(a.total_score, 0) AS total_score, COALESCE(a.max_score, 0) AS max_score,
           a.submitted_at
    FROM attempts a
    JOIN users u ON u.id = a.user_id
    JOIN tests t ON t.id = a.test_id
    LEFT JOIN categories c ON c.id = t.category_id
    WHERE a.status = $1 AND a.submitted_at IS NOT NULL";

pub(crate) async fn scored_attempts_for_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<ScoredAttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, ScoredAttemptRow>(&format!(
        "{SCORED_ATTEMPTS} AND a.user_id = $2 ORDER BY a.submitted_at"
    ))
    .bind(AttemptStatus::Submitted)
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Submitted attempts of active students, optionally for one test.
pub(crate) async fn scored_attempts_for_leaderboard(
    pool: &PgPool,
    test_id: Option<&str>,
) -> Result<Vec<ScoredAttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, ScoredAttemptRow>(&format!(
        "{SCORED_ATTEMPTS} AND u.is_active = TRUE AND ($2::varchar IS NULL OR a.test_id = $2)
         ORDER BY a.submitted_at"
    ))
    .bind(AttemptStatus::Submitted)
    .bind(test_id)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct TestStatsRow {
    pub(crate) test_id: String,
    pub(crate) title: String,
    pub(crate) status: TestStatus,
    pub(crate) submitted_count: i64,
    pub(crate) active_count: i64,
    pub(crate) average_percentage: Option<f64>,
    pub(crate) best_percentage: Option<f64>,
}

pub(crate) async fn test_stats(pool: &PgPool) -> Result<Vec<TestStatsRow>, sqlx::Error> {
    sqlx::query_as::<_, TestStatsRow>(
        "SELECT t.id AS test_id, t.title, t.status,
                COUNT(a.id) FILTER (WHERE a.status = 'submitted') AS submitted_count,
                COUNT(a.id) FILTER (WHERE a.status = 'active') AS active_count,
                AVG(a.total_score / a.max_score * 100)
                    FILTER (WHERE a.status = 'submitted' AND a.max_score > 0)
                    AS average_percentage,
                MAX(a.total_score / a.max_score * 100)
                    FILTER (WHERE a.status = 'submitted' AND a.max_score > 0)
                    AS best_percentage
         FROM tests t
         LEFT JOIN attempts a ON a.test_id = t.id
         GROUP BY t.id, t.title, t.status, t.created_at
         ORDER BY t.created_at DESC",
    )
    .fetch_all(pool)
    .await
}

/// Counts shown on the admin dashboard.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct PlatformCounts {
    pub(crate) students: i64,
    pub(crate) tests: i64,
    pub(crate) published_tests: i64,
    pub(crate) submitted_attempts: i64,
}

pub(crate) async fn platform_counts(pool: &PgPool) -> Result<PlatformCounts, sqlx::Error> {
    sqlx::query_as::<_, PlatformCounts>(
        "SELECT
            (SELECT COUNT(*) FROM users WHERE role = 'student') AS students,
            (SELECT COUNT(*) FROM tests) AS tests,
            (SELECT COUNT(*) FROM tests WHERE status = 'published') AS published_tests,
            (SELECT COUNT(*) FROM attempts WHERE status = 'submitted') AS submitted_attempts",
    )
    .fetch_one(pool)
    .await
}
