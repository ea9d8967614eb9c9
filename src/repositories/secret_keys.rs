use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::SecretKey;

const COLUMNS: &str = "\
    id, key_hash, label, created_by, is_active, redeemed_by, redeemed_at, expires_at, created_at";

pub(crate) struct CreateSecretKey<'a> {
    pub(crate) id: &'a str,
    pub(crate) key_hash: &'a str,
    pub(crate) label: Option<&'a str>,
    pub(crate) created_by: &'a str,
    pub(crate) expires_at: Option<PrimitiveDateTime>,
    pub(crate) created_at: PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateSecretKey<'_>,
) -> Result<SecretKey, sqlx::Error> {
    sqlx::query_as::<_, SecretKey>(&format!(
        "INSERT INTO secret_keys (id, key_hash, label, created_by, is_active, expires_at, created_at)
         VALUES ($1,$2,$3,$4,TRUE,$5,$6)
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.key_hash)
    .bind(params.label)
    .bind(params.created_by)
    .bind(params.expires_at)
    .bind(params.created_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn list(
    pool: &PgPool,
    include_redeemed: bool,
) -> Result<Vec<SecretKey>, sqlx::Error> {
    sqlx::query_as::<_, SecretKey>(&format!(
        "SELECT {COLUMNS} FROM secret_keys
         WHERE ($1 OR redeemed_by IS NULL)
         ORDER BY created_at DESC"
    ))
    .bind(include_redeemed)
    .fetch_all(pool)
    .await
}

pub(crate) async fn revoke(pool: &PgPool, id: &str) -> Result<Option<SecretKey>, sqlx::Error> {
    sqlx::query_as::<_, SecretKey>(&format!(
        "UPDATE secret_keys SET is_active = FALSE WHERE id = $1 RETURNING {COLUMNS}"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Marks an active, unexpired, unredeemed key as used by `user_id`. Returns `false` when no
/// key matched, which also covers a concurrent redemption of the same key.
pub(crate) async fn redeem(
    executor: impl sqlx::PgExecutor<'_>,
    key_hash: &str,
    user_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE secret_keys
         SET redeemed_by = $1, redeemed_at = $2, is_active = FALSE
         WHERE key_hash = $3
           AND is_active = TRUE
           AND redeemed_by IS NULL
           AND (expires_at IS NULL OR expires_at > $2)",
    )
    .bind(user_id)
    .bind(now)
    .bind(key_hash)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}
