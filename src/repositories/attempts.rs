use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Attempt;
use crate::db::types::AttemptStatus;

pub(crate) const COLUMNS: &str = "\
    id, user_id, test_id, status, started_at, submitted_at, total_score, max_score, \
    time_remaining_seconds, answer_draft, created_at, updated_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!("SELECT {COLUMNS} FROM attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// The submitted attempt for (user, test) if there is one, else the active one. A single
/// statement, so a submission committed concurrently is never missed between two reads.
pub(crate) async fn find_current_by_user_test(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: &str,
    test_id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts
         WHERE user_id = $1 AND test_id = $2
         ORDER BY CASE WHEN status = $3 THEN 0 ELSE 1 END
         LIMIT 1"
    ))
    .bind(user_id)
    .bind(test_id)
    .bind(AttemptStatus::Submitted)
    .fetch_optional(executor)
    .await
}

/// Serialises attempt creation for one (user, test) pair until the transaction ends.
pub(crate) async fn acquire_user_test_lock(
    executor: impl sqlx::PgExecutor<'_>,
    user_id: &str,
    test_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1), hashtext($2))")
        .bind(user_id)
        .bind(test_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) user_id: &'a str,
    pub(crate) test_id: &'a str,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) time_remaining_seconds: i32,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateAttempt<'_>,
) -> Result<Attempt, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "INSERT INTO attempts (
            id, user_id, test_id, status, started_at, time_remaining_seconds,
            answer_draft, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,'{{}}'::jsonb,$5,$5)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.user_id)
    .bind(params.test_id)
    .bind(AttemptStatus::Active)
    .bind(params.started_at)
    .bind(params.time_remaining_seconds)
    .fetch_one(executor)
    .await
}

pub(crate) async fn save_draft(
    pool: &PgPool,
    id: &str,
    draft: serde_json::Value,
    time_remaining_seconds: i32,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempts
         SET answer_draft = $1, time_remaining_seconds = $2, updated_at = $3
         WHERE id = $4 AND status = $5",
    )
    .bind(draft)
    .bind(time_remaining_seconds)
    .bind(now)
    .bind(id)
    .bind(AttemptStatus::Active)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) struct MarkSubmitted<'a> {
    pub(crate) id: &'a str,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
    pub(crate) time_remaining_seconds: i32,
}

/// Returns `false` when the attempt was not active any more.
pub(crate) async fn mark_submitted(
    executor: impl sqlx::PgExecutor<'_>,
    params: MarkSubmitted<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempts
         SET status = $1, submitted_at = $2, total_score = $3, max_score = $4,
             time_remaining_seconds = $5, updated_at = $2
         WHERE id = $6 AND status = $7",
    )
    .bind(AttemptStatus::Submitted)
    .bind(params.submitted_at)
    .bind(params.total_score)
    .bind(params.max_score)
    .bind(params.time_remaining_seconds)
    .bind(params.id)
    .bind(AttemptStatus::Active)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn list_expired_active(
    pool: &PgPool,
    now: PrimitiveDateTime,
    grace_seconds: i64,
) -> Result<Vec<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(
        "SELECT a.id, a.user_id, a.test_id, a.status, a.started_at, a.submitted_at,
                a.total_score, a.max_score, a.time_remaining_seconds, a.answer_draft,
                a.created_at, a.updated_at
         FROM attempts a
         JOIN tests t ON t.id = a.test_id
         WHERE a.status = $1
           AND a.started_at + make_interval(mins => t.duration_minutes, secs => $2) < $3
         ORDER BY a.started_at
         LIMIT 500",
    )
    .bind(AttemptStatus::Active)
    .bind(grace_seconds as f64)
    .bind(now)
    .fetch_all(pool)
    .await
}

/// Submitted attempts of one user, newest first, with the test title.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SubmittedAttemptRow {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) test_title: String,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) total_score: Option<f64>,
    pub(crate) max_score: Option<f64>,
}

pub(crate) async fn list_submitted_by_user(
    pool: &PgPool,
    user_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<SubmittedAttemptRow>, sqlx::Error> {
    sqlx::query_as::<_, SubmittedAttemptRow>(
        "SELECT a.id, a.test_id, t.title AS test_title, a.submitted_at,
                a.total_score, a.max_score
         FROM attempts a
         JOIN tests t ON t.id = a.test_id
         WHERE a.user_id = $1 AND a.status = $2
         ORDER BY a.submitted_at DESC
         OFFSET $3 LIMIT $4",
    )
    .bind(user_id)
    .bind(AttemptStatus::Submitted)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_submitted_by_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE user_id = $1 AND status = $2")
        .bind(user_id)
        .bind(AttemptStatus::Submitted)
        .fetch_one(pool)
        .await
}
