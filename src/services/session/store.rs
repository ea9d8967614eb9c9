use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::db::models::{Attempt, Test};
use crate::db::types::AttemptStatus;
use crate::repositories;
use crate::services::scoring::GradedAnswer;
use crate::services::session::cache::AnswerDraft;

pub(crate) use crate::repositories::questions::QuestionWithOptions;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Constraint violations fail the same way on every retry.
    pub(crate) fn is_permanent(&self) -> bool {
        use sqlx::error::ErrorKind;

        match self {
            Self::Database(sqlx::Error::Database(err)) => matches!(
                err.kind(),
                ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation
            ),
            Self::Database(_) | Self::Unavailable(_) => false,
        }
    }
}

/// What the locked lookup for (user, test) found.
#[derive(Debug, Clone)]
pub(crate) enum OpenedAttempt {
    Created(Attempt),
    Resumed(Attempt),
    Submitted(Attempt),
}

#[derive(Debug, Clone)]
pub(crate) struct AttemptSubmission {
    pub(crate) attempt_id: String,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
    pub(crate) time_remaining_seconds: u32,
    pub(crate) answers: Vec<GradedAnswer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmitWrite {
    Written,
    AlreadySubmitted,
}

/// Everything the session controller and the sweeper need from durable storage.
#[async_trait]
pub(crate) trait AttemptStore: Send + Sync {
    async fn fetch_test(&self, test_id: &str) -> Result<Option<Test>, StoreError>;

    /// Questions ordered by `order_index`, each with its options in order.
    async fn fetch_questions(&self, test_id: &str) -> Result<Vec<QuestionWithOptions>, StoreError>;

    /// Returns the submitted or active attempt for (user, test), creating an active one when
    /// neither exists. The lookup and the insert happen under one per-pair lock.
    async fn open_attempt(
        &self,
        user_id: &str,
        test_id: &str,
        duration_seconds: u32,
        now: PrimitiveDateTime,
    ) -> Result<OpenedAttempt, StoreError>;

    async fn save_draft(
        &self,
        attempt_id: &str,
        draft: &AnswerDraft,
        time_remaining_seconds: u32,
        now: PrimitiveDateTime,
    ) -> Result<(), StoreError>;

    /// Writes answers and marks the attempt submitted atomically. Only an `active` attempt
    /// is updated; anything else reports [`SubmitWrite::AlreadySubmitted`].
    async fn submit_attempt(&self, submission: &AttemptSubmission)
        -> Result<SubmitWrite, StoreError>;

    /// Active attempts whose time ran out more than `grace_seconds` before `now`.
    async fn expired_attempts(
        &self,
        now: PrimitiveDateTime,
        grace_seconds: i64,
    ) -> Result<Vec<Attempt>, StoreError>;
}

#[derive(Clone)]
pub(crate) struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn fetch_test(&self, test_id: &str) -> Result<Option<Test>, StoreError> {
        Ok(repositories::tests::find_by_id(&self.pool, test_id).await?)
    }

    async fn fetch_questions(&self, test_id: &str) -> Result<Vec<QuestionWithOptions>, StoreError> {
        Ok(repositories::questions::list_with_options(&self.pool, test_id).await?)
    }

    async fn open_attempt(
        &self,
        user_id: &str,
        test_id: &str,
        duration_seconds: u32,
        now: PrimitiveDateTime,
    ) -> Result<OpenedAttempt, StoreError> {
        let mut tx = self.pool.begin().await?;
        repositories::attempts::acquire_user_test_lock(&mut *tx, user_id, test_id).await?;

        if let Some(attempt) =
            repositories::attempts::find_current_by_user_test(&mut *tx, user_id, test_id).await?
        {
            tx.commit().await?;
            return Ok(match attempt.status {
                AttemptStatus::Submitted => OpenedAttempt::Submitted(attempt),
                AttemptStatus::Active => OpenedAttempt::Resumed(attempt),
            });
        }

        let attempt = repositories::attempts::create(
            &mut *tx,
            repositories::attempts::CreateAttempt {
                id: &Uuid::new_v4().to_string(),
                user_id,
                test_id,
                started_at: now,
                time_remaining_seconds: duration_seconds as i32,
            },
        )
        .await?;
        tx.commit().await?;

        Ok(OpenedAttempt::Created(attempt))
    }

    async fn save_draft(
        &self,
        attempt_id: &str,
        draft: &AnswerDraft,
        time_remaining_seconds: u32,
        now: PrimitiveDateTime,
    ) -> Result<(), StoreError> {
        repositories::attempts::save_draft(
            &self.pool,
            attempt_id,
            draft.to_value(),
            time_remaining_seconds as i32,
            now,
        )
        .await?;
        Ok(())
    }

    async fn submit_attempt(
        &self,
        submission: &AttemptSubmission,
    ) -> Result<SubmitWrite, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = repositories::attempts::mark_submitted(
            &mut *tx,
            repositories::attempts::MarkSubmitted {
                id: &submission.attempt_id,
                submitted_at: submission.submitted_at,
                total_score: submission.total_score,
                max_score: submission.max_score,
                time_remaining_seconds: submission.time_remaining_seconds as i32,
            },
        )
        .await?;

        if !updated {
            tx.rollback().await?;
            return Ok(SubmitWrite::AlreadySubmitted);
        }

        for answer in &submission.answers {
            repositories::answers::upsert(
                &mut *tx,
                repositories::answers::UpsertAnswer {
                    attempt_id: &submission.attempt_id,
                    question_id: &answer.question_id,
                    chosen_option_id: &answer.chosen_option_id,
                    is_correct: answer.is_correct,
                    score: answer.score,
                },
            )
            .await?;
        }

        tx.commit().await?;
        Ok(SubmitWrite::Written)
    }

    async fn expired_attempts(
        &self,
        now: PrimitiveDateTime,
        grace_seconds: i64,
    ) -> Result<Vec<Attempt>, StoreError> {
        Ok(repositories::attempts::list_expired_active(&self.pool, now, grace_seconds).await?)
    }
}
