use sqlx::PgPool;

use crate::db::models::Category;

const COLUMNS: &str = "id, name, description, created_at, updated_at";

pub(crate) async fn list(pool: &PgPool) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(&format!("SELECT {COLUMNS} FROM categories ORDER BY name"))
        .fetch_all(pool)
        .await
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(&format!("SELECT {COLUMNS} FROM categories WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn exists_by_name(
    pool: &PgPool,
    name: &str,
    exclude_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (
            SELECT 1 FROM categories
            WHERE LOWER(name) = LOWER($1) AND ($2::varchar IS NULL OR id <> $2)
        )",
    )
    .bind(name)
    .bind(exclude_id)
    .fetch_one(pool)
    .await
}

pub(crate) async fn create(
    pool: &PgPool,
    id: &str,
    name: &str,
    description: Option<&str>,
    now: time::PrimitiveDateTime,
) -> Result<Category, sqlx::Error> {
    sqlx::query_as::<_, Category>(&format!(
        "INSERT INTO categories (id, name, description, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$4)
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(description)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    name: Option<&str>,
    description: Option<&str>,
    now: time::PrimitiveDateTime,
) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>(&format!(
        "UPDATE categories SET
            name = COALESCE($1, name),
            description = COALESCE($2, description),
            updated_at = $3
         WHERE id = $4
         RETURNING {COLUMNS}"
    ))
    .bind(name)
    .bind(description)
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
