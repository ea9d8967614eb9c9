use std::collections::HashMap;

use serde::Serialize;
use sqlx::PgPool;

use crate::db::models::{Question, QuestionOption};

const COLUMNS: &str = "id, test_id, text, points, negative_points, order_index, created_at";
const OPTION_COLUMNS: &str = "id, question_id, label, is_correct, order_index";

#[derive(Debug, Clone, Serialize)]
pub(crate) struct QuestionWithOptions {
    pub(crate) question: Question,
    pub(crate) options: Vec<QuestionOption>,
}

impl QuestionWithOptions {
    pub(crate) fn option(&self, option_id: &str) -> Option<&QuestionOption> {
        self.options.iter().find(|option| option.id == option_id)
    }

    pub(crate) fn correct_option(&self) -> Option<&QuestionOption> {
        self.options.iter().find(|option| option.is_correct)
    }
}

pub(crate) async fn list_with_options(
    pool: &PgPool,
    test_id: &str,
) -> Result<Vec<QuestionWithOptions>, sqlx::Error> {
    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE test_id = $1 ORDER BY order_index, created_at"
    ))
    .bind(test_id)
    .fetch_all(pool)
    .await?;

    if questions.is_empty() {
        return Ok(Vec::new());
    }

    let question_ids: Vec<String> = questions.iter().map(|question| question.id.clone()).collect();
    let options = sqlx::query_as::<_, QuestionOption>(&format!(
        "SELECT {OPTION_COLUMNS} FROM question_options
         WHERE question_id = ANY($1)
         ORDER BY order_index, id"
    ))
    .bind(&question_ids)
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<String, Vec<QuestionOption>> = HashMap::new();
    for option in options {
        grouped.entry(option.question_id.clone()).or_default().push(option);
    }

    Ok(questions
        .into_iter()
        .map(|question| {
            let options = grouped.remove(&question.id).unwrap_or_default();
            QuestionWithOptions { question, options }
        })
        .collect())
}

pub(crate) async fn find_with_options(
    pool: &PgPool,
    test_id: &str,
    question_id: &str,
) -> Result<Option<QuestionWithOptions>, sqlx::Error> {
    let Some(question) = sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE id = $1 AND test_id = $2"
    ))
    .bind(question_id)
    .bind(test_id)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let options = sqlx::query_as::<_, QuestionOption>(&format!(
        "SELECT {OPTION_COLUMNS} FROM question_options WHERE question_id = $1 ORDER BY order_index"
    ))
    .bind(question_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(QuestionWithOptions { question, options }))
}

pub(crate) async fn next_order_index(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar::<_, i32>(
        "SELECT COALESCE(MAX(order_index) + 1, 0) FROM questions WHERE test_id = $1",
    )
    .bind(test_id)
    .fetch_one(executor)
    .await
}

pub(crate) struct NewOption<'a> {
    pub(crate) label: &'a str,
    pub(crate) is_correct: bool,
}

pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) test_id: &'a str,
    pub(crate) text: &'a str,
    pub(crate) points: f64,
    pub(crate) negative_points: f64,
    pub(crate) order_index: i32,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (id, test_id, text, points, negative_points, order_index, created_at)
         VALUES ($1,$2,$3,$4,$5,$6,$7)
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.test_id)
    .bind(params.text)
    .bind(params.points)
    .bind(params.negative_points)
    .bind(params.order_index)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn update(
    executor: impl sqlx::PgExecutor<'_>,
    question_id: &str,
    text: &str,
    points: f64,
    negative_points: f64,
    order_index: i32,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions SET text = $1, points = $2, negative_points = $3, order_index = $4
         WHERE id = $5
         RETURNING {COLUMNS}"
    ))
    .bind(text)
    .bind(points)
    .bind(negative_points)
    .bind(order_index)
    .bind(question_id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn insert_option(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    question_id: &str,
    option: &NewOption<'_>,
    order_index: i32,
) -> Result<QuestionOption, sqlx::Error> {
    sqlx::query_as::<_, QuestionOption>(&format!(
        "INSERT INTO question_options (id, question_id, label, is_correct, order_index)
         VALUES ($1,$2,$3,$4,$5)
         RETURNING {OPTION_COLUMNS}"
    ))
    .bind(id)
    .bind(question_id)
    .bind(option.label)
    .bind(option.is_correct)
    .bind(order_index)
    .fetch_one(executor)
    .await
}

pub(crate) async fn delete_options(
    executor: impl sqlx::PgExecutor<'_>,
    question_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM question_options WHERE question_id = $1")
        .bind(question_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn delete_by_id(
    pool: &PgPool,
    test_id: &str,
    question_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1 AND test_id = $2")
        .bind(question_id)
        .bind(test_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
