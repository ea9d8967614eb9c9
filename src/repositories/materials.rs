use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::models::StudyMaterial;
use crate::db::types::MaterialKind;

const COLUMNS: &str = "\
    id, title, description, category_id, kind, url, body, is_published, created_at, updated_at";

pub(crate) async fn list(
    pool: &PgPool,
    published_only: bool,
    category_id: Option<&str>,
) -> Result<Vec<StudyMaterial>, sqlx::Error> {
    let mut builder =
        QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM study_materials WHERE 1=1"));
    if published_only {
        builder.push(" AND is_published = TRUE");
    }
    if let Some(category_id) = category_id {
        builder.push(" AND category_id = ");
        builder.push_bind(category_id);
    }
    builder.push(" ORDER BY created_at DESC");

    builder.build_query_as::<StudyMaterial>().fetch_all(pool).await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<StudyMaterial>, sqlx::Error> {
    sqlx::query_as::<_, StudyMaterial>(&format!("SELECT {COLUMNS} FROM study_materials WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) struct SaveMaterial<'a> {
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) category_id: Option<&'a str>,
    pub(crate) kind: MaterialKind,
    pub(crate) url: Option<&'a str>,
    pub(crate) body: Option<&'a str>,
    pub(crate) is_published: bool,
}

pub(crate) async fn create(
    pool: &PgPool,
    id: &str,
    params: SaveMaterial<'_>,
    now: time::PrimitiveDateTime,
) -> Result<StudyMaterial, sqlx::Error> {
    sqlx::query_as::<_, StudyMaterial>(&format!(
        "INSERT INTO study_materials (
            id, title, description, category_id, kind, url, body, is_published,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$9)
        RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.category_id)
    .bind(params.kind)
    .bind(params.url)
    .bind(params.body)
    .bind(params.is_published)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn replace(
    pool: &PgPool,
    id: &str,
    params: SaveMaterial<'_>,
    now: time::PrimitiveDateTime,
) -> Result<Option<StudyMaterial>, sqlx::Error> {
    sqlx::query_as::<_, StudyMaterial>(&format!(
        "UPDATE study_materials SET
            title = $1, description = $2, category_id = $3, kind = $4, url = $5, body = $6,
            is_published = $7, updated_at = $8
         WHERE id = $9
         RETURNING {COLUMNS}"
    ))
    .bind(params.title)
    .bind(params.description)
    .bind(params.category_id)
    .bind(params.kind)
    .bind(params.url)
    .bind(params.body)
    .bind(params.is_published)
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM study_materials WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
