use sqlx::PgPool;

use crate::db::models::Answer;

const COLUMNS: &str = "attempt_id, question_id, chosen_option_id, is_correct, score";

pub(crate) struct UpsertAnswer<'a> {
    pub(crate) attempt_id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) chosen_option_id: &'a str,
    pub(crate) is_correct: bool,
    pub(crate) score: f64,
}

pub(crate) async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    params: UpsertAnswer<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO answers (attempt_id, question_id, chosen_option_id, is_correct, score)
         VALUES ($1,$2,$3,$4,$5)
         ON CONFLICT (attempt_id, question_id) DO UPDATE SET
            chosen_option_id = EXCLUDED.chosen_option_id,
            is_correct = EXCLUDED.is_correct,
            score = EXCLUDED.score",
    )
    .bind(params.attempt_id)
    .bind(params.question_id)
    .bind(params.chosen_option_id)
    .bind(params.is_correct)
    .bind(params.score)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn list_by_attempt(
    pool: &PgPool,
    attempt_id: &str,
) -> Result<Vec<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!("SELECT {COLUMNS} FROM answers WHERE attempt_id = $1"))
        .bind(attempt_id)
        .fetch_all(pool)
        .await
}
