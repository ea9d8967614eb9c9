use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Subscription;

const COLUMNS: &str = "\
    id, user_id, plan, starts_at, expires_at, is_active, created_at, updated_at";

pub(crate) async fn list(
    pool: &PgPool,
    user_id: Option<&str>,
) -> Result<Vec<Subscription>, sqlx::Error> {
    sqlx::query_as::<_, Subscription>(&format!(
        "SELECT {COLUMNS} FROM subscriptions
         WHERE ($1::varchar IS NULL OR user_id = $1)
         ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Active subscriptions of a user that have started and not yet expired at `now`.
pub(crate) async fn list_current_for_user(
    pool: &PgPool,
    user_id: &str,
    now: PrimitiveDateTime,
) -> Result<Vec<Subscription>, sqlx::Error> {
    sqlx::query_as::<_, Subscription>(&format!(
        "SELECT {COLUMNS} FROM subscriptions
         WHERE user_id = $1 AND is_active = TRUE AND starts_at <= $2
           AND (expires_at IS NULL OR expires_at > $2)
         ORDER BY starts_at DESC"
    ))
    .bind(user_id)
    .bind(now)
    .fetch_all(pool)
    .await
}

pub(crate) struct SaveSubscription<'a> {
    pub(crate) user_id: &'a str,
    pub(crate) plan: &'a str,
    pub(crate) starts_at: PrimitiveDateTime,
    pub(crate) expires_at: Option<PrimitiveDateTime>,
    pub(crate) is_active: bool,
}

pub(crate) async fn create(
    pool: &PgPool,
    id: &str,
    params: SaveSubscription<'_>,
    now: PrimitiveDateTime,
) -> Result<Subscription, sqlx::Error> {
    sqlx::query_as::<_, Subscription>(&format!(
        "INSERT INTO subscriptions (
            id, user_id, plan, starts_at, expires_at, is_active, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$7)
        RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(params.user_id)
    .bind(params.plan)
    .bind(params.starts_at)
    .bind(params.expires_at)
    .bind(params.is_active)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn replace(
    pool: &PgPool,
    id: &str,
    params: SaveSubscription<'_>,
    now: PrimitiveDateTime,
) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as::<_, Subscription>(&format!(
        "UPDATE subscriptions SET
            user_id = $1, plan = $2, starts_at = $3, expires_at = $4, is_active = $5,
            updated_at = $6
         WHERE id = $7
         RETURNING {COLUMNS}"
    ))
    .bind(params.user_id)
    .bind(params.plan)
    .bind(params.starts_at)
    .bind(params.expires_at)
    .bind(params.is_active)
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM subscriptions WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
