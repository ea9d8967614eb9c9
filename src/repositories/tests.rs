use std::collections::HashMap;

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::models::Test;
use crate::db::types::TestStatus;

pub(crate) const COLUMNS: &str = "\
    id, title, description, category_id, duration_minutes, status, shuffle_questions, \
    shuffle_options, negative_marking, created_by, created_at, updated_at, published_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Test>, sqlx::Error> {
    sqlx::query_as::<_, Test>(&format!("SELECT {COLUMNS} FROM tests WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

#[derive(Clone, Copy)]
pub(crate) struct ListTests<'a> {
    pub(crate) statuses: &'a [TestStatus],
    pub(crate) category_id: Option<&'a str>,
    pub(crate) search: Option<&'a str>,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, filters: &ListTests<'a>) {
    builder.push(" WHERE 1=1");
    if !filters.statuses.is_empty() {
        builder.push(" AND status IN (");
        let mut separated = builder.separated(", ");
        for status in filters.statuses {
            separated.push_bind(*status);
        }
        separated.push_unseparated(")");
    }
    if let Some(category_id) = filters.category_id {
        builder.push(" AND category_id = ");
        builder.push_bind(category_id);
    }
    if let Some(search) = filters.search {
        builder.push(" AND title ILIKE ");
        builder.push_bind(format!("%{}%", search.trim()));
    }
}

pub(crate) async fn list(pool: &PgPool, filters: ListTests<'_>) -> Result<Vec<Test>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM tests"));
    push_filters(&mut builder, &filters);
    builder.push(" ORDER BY created_at DESC OFFSET ");
    builder.push_bind(filters.skip.max(0));
    builder.push(" LIMIT ");
    builder.push_bind(filters.limit.clamp(1, 1000));

    builder.build_query_as::<Test>().fetch_all(pool).await
}

pub(crate) async fn count(pool: &PgPool, filters: ListTests<'_>) -> Result<i64, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM tests");
    push_filters(&mut builder, &filters);
    builder.build_query_scalar::<i64>().fetch_one(pool).await
}

pub(crate) async fn count_questions(pool: &PgPool, test_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE test_id = $1")
        .bind(test_id)
        .fetch_one(pool)
        .await
}

/// Question counts keyed by test id; tests without questions are absent.
pub(crate) async fn count_questions_by_tests(
    pool: &PgPool,
    test_ids: &[String],
) -> Result<HashMap<String, i64>, sqlx::Error> {
    if test_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT test_id, COUNT(*) FROM questions WHERE test_id = ANY($1) GROUP BY test_id",
    )
    .bind(test_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().collect())
}

pub(crate) struct CreateTest<'a> {
    pub(crate) id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) category_id: Option<&'a str>,
    pub(crate) duration_minutes: i32,
    pub(crate) status: TestStatus,
    pub(crate) shuffle_questions: bool,
    pub(crate) shuffle_options: bool,
    pub(crate) negative_marking: bool,
    pub(crate) created_by: &'a str,
    pub(crate) now: time::PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateTest<'_>) -> Result<Test, sqlx::Error> {
    let published_at = (params.status == TestStatus::Published).then_some(params.now);

    sqlx::query_as::<_, Test>(&format!(
        "INSERT INTO tests (
            id, title, description, category_id, duration_minutes, status, shuffle_questions,
            shuffle_options, negative_marking, created_by, created_at, updated_at, published_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$11,$12)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(params.description)
    .bind(params.category_id)
    .bind(params.duration_minutes)
    .bind(params.status)
    .bind(params.shuffle_questions)
    .bind(params.shuffle_options)
    .bind(params.negative_marking)
    .bind(params.created_by)
    .bind(params.now)
    .bind(published_at)
    .fetch_one(pool)
    .await
}

#[derive(Default)]
pub(crate) struct UpdateTest {
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) category_id: Option<String>,
    pub(crate) duration_minutes: Option<i32>,
    pub(crate) shuffle_questions: Option<bool>,
    pub(crate) shuffle_options: Option<bool>,
    pub(crate) negative_marking: Option<bool>,
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateTest,
    now: time::PrimitiveDateTime,
) -> Result<Option<Test>, sqlx::Error> {
    sqlx::query_as::<_, Test>(&format!(
        "UPDATE tests SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            category_id = COALESCE($3, category_id),
            duration_minutes = COALESCE($4, duration_minutes),
            shuffle_questions = COALESCE($5, shuffle_questions),
            shuffle_options = COALESCE($6, shuffle_options),
            negative_marking = COALESCE($7, negative_marking),
            updated_at = $8
         WHERE id = $9
         RETURNING {COLUMNS}",
    ))
    .bind(params.title)
    .bind(params.description)
    .bind(params.category_id)
    .bind(params.duration_minutes)
    .bind(params.shuffle_questions)
    .bind(params.shuffle_options)
    .bind(params.negative_marking)
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Moving to `published` stamps `published_at` the first time only.
pub(crate) async fn set_status(
    pool: &PgPool,
    id: &str,
    status: TestStatus,
    now: time::PrimitiveDateTime,
) -> Result<Option<Test>, sqlx::Error> {
    sqlx::query_as::<_, Test>(&format!(
        "UPDATE tests SET
            status = $1,
            published_at = CASE WHEN $1 = 'published'::teststatus
                THEN COALESCE(published_at, $2) ELSE published_at END,
            updated_at = $2
         WHERE id = $3
         RETURNING {COLUMNS}",
    ))
    .bind(status)
    .bind(now)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM tests WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}
