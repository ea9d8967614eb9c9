use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::PrimitiveDateTime;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::core::time::seconds_remaining;
use crate::db::models::Test;
use crate::db::types::TestStatus;
use crate::services::scoring;
use crate::services::session::cache::{AnswerCache, AnswerDraft, CacheEntry};
use crate::services::session::demo::{DemoResult, DemoVault};
use crate::services::session::store::{
    AttemptStore, AttemptSubmission, OpenedAttempt, QuestionWithOptions, StoreError, SubmitWrite,
};

/// Who is taking the test. Demo identities never touch attempt rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum SessionIdentity {
    Student { user_id: String },
    Demo { demo_id: String },
}

impl SessionIdentity {
    pub(crate) fn owner_id(&self) -> &str {
        match self {
            Self::Student { user_id } => user_id,
            Self::Demo { demo_id } => demo_id,
        }
    }

    pub(crate) fn is_demo(&self) -> bool {
        matches!(self, Self::Demo { .. })
    }
}

/// Loading and load failure are the in-flight and `Err` outcomes of [`SessionController::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SessionPhase {
    Ready,
    InProgress,
    Submitting,
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SubmitTrigger {
    Manual,
    Timer,
    Sweeper,
}

impl SubmitTrigger {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Timer => "timer",
            Self::Sweeper => "sweeper",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Redirect {
    Catalog,
    Results { attempt_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SubmitReceipt {
    pub(crate) attempt_id: String,
    pub(crate) test_id: String,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) trigger: SubmitTrigger,
}

#[derive(Debug, Clone)]
pub(crate) enum SubmitOutcome {
    Submitted(SubmitReceipt),
    AlreadySubmitted { attempt_id: String },
    InFlight,
}

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("test {0} not found")]
    NotFound(String),
    #[error("session redirected to {0:?}")]
    Redirect(Redirect),
    #[error("failed to load test session")]
    Load(#[source] StoreError),
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    #[error("session is {actual:?}, expected {expected:?}")]
    InvalidPhase { expected: SessionPhase, actual: SessionPhase },
    #[error("failed to submit attempt")]
    Submit(#[source] StoreError),
    #[error("attempt store failed")]
    Store(#[source] StoreError),
}

impl SessionError {
    /// Store failures that may clear up on their own. Constraint violations never do.
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            Self::Load(err) | Self::Submit(err) | Self::Store(err) => !err.is_permanent(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Navigation {
    To(usize),
    Next,
    Previous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tick {
    Running(u32),
    Expired,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SessionSnapshot {
    pub(crate) attempt_id: String,
    pub(crate) test_id: String,
    pub(crate) phase: SessionPhase,
    pub(crate) cursor: usize,
    pub(crate) total_questions: usize,
    pub(crate) answered_count: usize,
    pub(crate) remaining_seconds: u32,
    pub(crate) resumed: bool,
    pub(crate) answers: Vec<CacheEntry>,
}

/// Work handed out by [`SessionController::begin_submit`] to be written outside the lock.
#[derive(Debug, Clone)]
pub(crate) struct PendingSubmission {
    pub(crate) trigger: SubmitTrigger,
    pub(crate) submission: AttemptSubmission,
    pub(crate) demo_result: Option<DemoResult>,
}

#[derive(Debug)]
pub(crate) enum SubmitStep {
    Done(SubmitOutcome),
    Write(PendingSubmission),
}

pub(crate) struct SessionController {
    identity: SessionIdentity,
    test: Test,
    questions: Vec<QuestionWithOptions>,
    attempt_id: String,
    resumed: bool,
    draft: AnswerDraft,
    phase: SessionPhase,
    cache: AnswerCache,
    cursor: usize,
    remaining_seconds: u32,
    deadline: Option<Instant>,
    receipt: Option<SubmitReceipt>,
}

impl SessionController {
    /// Reads the test and its questions, then resolves the attempt for `identity`.
    pub(crate) async fn load(
        store: &dyn AttemptStore,
        vault: &DemoVault,
        identity: SessionIdentity,
        test_id: &str,
        now: PrimitiveDateTime,
    ) -> Result<Self, SessionError> {
        let test = store
            .fetch_test(test_id)
            .await
            .map_err(SessionError::Load)?
            .ok_or_else(|| SessionError::NotFound(test_id.to_string()))?;

        if test.status != TestStatus::Published {
            return Err(SessionError::Redirect(Redirect::Catalog));
        }

        let questions = store.fetch_questions(test_id).await.map_err(SessionError::Load)?;
        let duration_seconds = duration_seconds(&test);

        let (attempt_id, draft, remaining_seconds, resumed) = match &identity {
            SessionIdentity::Student { user_id } => {
                let (attempt, resumed) = match store
                    .open_attempt(user_id, test_id, duration_seconds, now)
                    .await
                    .map_err(SessionError::Load)?
                {
                    OpenedAttempt::Submitted(done) => {
                        return Err(SessionError::Redirect(Redirect::Results {
                            attempt_id: done.id,
                        }));
                    }
                    OpenedAttempt::Resumed(attempt) => (attempt, true),
                    OpenedAttempt::Created(attempt) => (attempt, false),
                };
                let remaining = seconds_remaining(attempt.started_at, duration_seconds, now);
                let draft = AnswerDraft::from_value(&attempt.answer_draft.0);
                (attempt.id, draft, remaining, resumed)
            }
            SessionIdentity::Demo { demo_id } => {
                if let Some(prior) = vault.find_for_test(demo_id, test_id).await {
                    return Err(SessionError::Redirect(Redirect::Results {
                        attempt_id: prior.attempt_id,
                    }));
                }
                (format!("demo-{}", Uuid::new_v4()), AnswerDraft::default(), duration_seconds, false)
            }
        };

        let questions = arrange(&test, questions, &attempt_id);

        tracing::info!(
            attempt_id = %attempt_id,
            test_id = %test.id,
            demo = identity.is_demo(),
            resumed,
            remaining_seconds,
            "Test session loaded"
        );

        Ok(Self {
            identity,
            test,
            questions,
            attempt_id,
            resumed,
            draft,
            phase: SessionPhase::Ready,
            cache: AnswerCache::default(),
            cursor: 0,
            remaining_seconds,
            deadline: None,
            receipt: None,
        })
    }

    /// Builds the answer cache and starts the clock.
    pub(crate) fn begin(&mut self) -> Result<(), SessionError> {
        self.expect_phase(SessionPhase::Ready)?;
        self.cache = AnswerCache::new(self.questions.iter().map(|item| item.question.id.clone()));
        self.cache.restore(&self.draft);
        let remaining = Duration::from_secs(u64::from(self.remaining_seconds));
        self.deadline = Some(Instant::now() + remaining);
        self.phase = SessionPhase::InProgress;
        Ok(())
    }

    pub(crate) fn select_option(
        &mut self,
        question_id: &str,
        option_id: Option<&str>,
    ) -> Result<(), SessionError> {
        self.expect_phase(SessionPhase::InProgress)?;

        let item = self
            .questions
            .iter()
            .find(|item| item.question.id == question_id)
            .ok_or_else(|| {
                SessionError::InvalidSelection(format!("question {question_id} is not in this test"))
            })?;

        if let Some(option_id) = option_id {
            if item.option(option_id).is_none() {
                return Err(SessionError::InvalidSelection(format!(
                    "option {option_id} does not belong to question {question_id}"
                )));
            }
        }

        self.cache.set(question_id, option_id.map(str::to_string));
        Ok(())
    }

    pub(crate) fn navigate(&mut self, navigation: Navigation) -> Result<usize, SessionError> {
        self.expect_phase(SessionPhase::InProgress)?;

        let last = self.questions.len().saturating_sub(1);
        self.cursor = match navigation {
            Navigation::To(index) => index.min(last),
            Navigation::Next => (self.cursor + 1).min(last),
            Navigation::Previous => self.cursor.saturating_sub(1),
        };
        Ok(self.cursor)
    }

    /// Reads the clock against the deadline set by `begin`, so late ticks never stretch the
    /// exam. The clock keeps running while a submission is in flight.
    pub(crate) fn tick(&mut self, now: Instant) -> Tick {
        match self.phase {
            SessionPhase::Ready | SessionPhase::Submitted => Tick::Stopped,
            SessionPhase::InProgress | SessionPhase::Submitting => {
                self.remaining_seconds = self.remaining_at(now);
                if self.remaining_seconds == 0 {
                    Tick::Expired
                } else {
                    Tick::Running(self.remaining_seconds)
                }
            }
        }
    }

    /// Takes the submit latch. Callers that find it taken get a terminal outcome instead.
    pub(crate) fn begin_submit(
        &mut self,
        trigger: SubmitTrigger,
        now: PrimitiveDateTime,
    ) -> Result<SubmitStep, SessionError> {
        match self.phase {
            SessionPhase::Submitted => {
                return Ok(SubmitStep::Done(SubmitOutcome::AlreadySubmitted {
                    attempt_id: self.attempt_id.clone(),
                }));
            }
            SessionPhase::Submitting => return Ok(SubmitStep::Done(SubmitOutcome::InFlight)),
            SessionPhase::Ready => {
                return Err(SessionError::InvalidPhase {
                    expected: SessionPhase::InProgress,
                    actual: SessionPhase::Ready,
                });
            }
            SessionPhase::InProgress => {}
        }

        self.phase = SessionPhase::Submitting;
        self.remaining_seconds = self.remaining_at(Instant::now());

        let grading = scoring::grade(&self.questions, &self.cache);
        let submission = AttemptSubmission {
            attempt_id: self.attempt_id.clone(),
            submitted_at: now,
            total_score: grading.total_score,
            max_score: grading.max_score,
            time_remaining_seconds: self.remaining_seconds,
            answers: grading.answers,
        };

        let demo_result = self.identity.is_demo().then(|| DemoResult {
            attempt_id: self.attempt_id.clone(),
            test: self.test.clone(),
            questions: self.questions.clone(),
            submitted_at: now,
            total_score: submission.total_score,
            max_score: submission.max_score,
            time_remaining_seconds: submission.time_remaining_seconds,
            answers: submission.answers.clone(),
        });

        Ok(SubmitStep::Write(PendingSubmission { trigger, submission, demo_result }))
    }

    /// Releases the latch: success is terminal, failure returns to `InProgress`.
    pub(crate) fn finish_submit(
        &mut self,
        pending: PendingSubmission,
        written: Result<SubmitWrite, StoreError>,
    ) -> Result<SubmitOutcome, SessionError> {
        match written {
            Ok(SubmitWrite::Written) => {
                let receipt = SubmitReceipt {
                    attempt_id: self.attempt_id.clone(),
                    test_id: self.test.id.clone(),
                    total_score: pending.submission.total_score,
                    max_score: pending.submission.max_score,
                    submitted_at: pending.submission.submitted_at,
                    trigger: pending.trigger,
                };
                self.phase = SessionPhase::Submitted;
                self.receipt = Some(receipt.clone());

                metrics::counter!(
                    crate::core::metrics::EXAM_SUBMISSIONS_TOTAL,
                    "trigger" => pending.trigger.as_str()
                )
                .increment(1);
                tracing::info!(
                    attempt_id = %self.attempt_id,
                    trigger = pending.trigger.as_str(),
                    total_score = receipt.total_score,
                    max_score = receipt.max_score,
                    "Attempt submitted"
                );
                Ok(SubmitOutcome::Submitted(receipt))
            }
            Ok(SubmitWrite::AlreadySubmitted) => {
                self.phase = SessionPhase::Submitted;
                tracing::info!(
                    attempt_id = %self.attempt_id,
                    trigger = pending.trigger.as_str(),
                    "Attempt was already submitted elsewhere"
                );
                Ok(SubmitOutcome::AlreadySubmitted { attempt_id: self.attempt_id.clone() })
            }
            Err(err) => {
                self.phase = SessionPhase::InProgress;
                tracing::warn!(
                    attempt_id = %self.attempt_id,
                    trigger = pending.trigger.as_str(),
                    error = %err,
                    "Attempt submission failed"
                );
                Err(SessionError::Submit(err))
            }
        }
    }

    pub(crate) fn draft(&self) -> Result<(AnswerDraft, u32), SessionError> {
        self.expect_phase(SessionPhase::InProgress)?;
        Ok((self.cache.to_draft(), self.remaining_at(Instant::now())))
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            attempt_id: self.attempt_id.clone(),
            test_id: self.test.id.clone(),
            phase: self.phase,
            cursor: self.cursor,
            total_questions: self.questions.len(),
            answered_count: self.cache.answered_count(),
            remaining_seconds: self.remaining_at(Instant::now()),
            resumed: self.resumed,
            answers: self.cache.entries().to_vec(),
        }
    }

    pub(crate) fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub(crate) fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub(crate) fn test(&self) -> &Test {
        &self.test
    }

    pub(crate) fn questions(&self) -> &[QuestionWithOptions] {
        &self.questions
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub(crate) fn receipt(&self) -> Option<&SubmitReceipt> {
        self.receipt.as_ref()
    }

    /// Whole seconds left, rounded up. Frozen once the attempt is submitted.
    fn remaining_at(&self, now: Instant) -> u32 {
        match (self.phase, self.deadline) {
            (SessionPhase::InProgress | SessionPhase::Submitting, Some(deadline)) => {
                let left = deadline.saturating_duration_since(now);
                let seconds = left.as_secs() + u64::from(left.subsec_nanos() > 0);
                u32::try_from(seconds).unwrap_or(u32::MAX)
            }
            _ => self.remaining_seconds,
        }
    }

    fn expect_phase(&self, expected: SessionPhase) -> Result<(), SessionError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidPhase { expected, actual: self.phase })
        }
    }
}

pub(crate) fn duration_seconds(test: &Test) -> u32 {
    u32::try_from(test.duration_minutes).unwrap_or(0).saturating_mul(60)
}

/// Applies the test's shuffle flags with a generator seeded by the attempt id, so a resumed
/// attempt sees the same order.
fn arrange(
    test: &Test,
    mut questions: Vec<QuestionWithOptions>,
    attempt_id: &str,
) -> Vec<QuestionWithOptions> {
    if !test.shuffle_questions && !test.shuffle_options {
        return questions;
    }

    let digest = Sha256::digest(attempt_id.as_bytes());
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&digest);
    let mut rng = StdRng::from_seed(seed);

    if test.shuffle_questions {
        questions.shuffle(&mut rng);
    }
    if test.shuffle_options {
        for item in &mut questions {
            item.options.shuffle(&mut rng);
        }
    }
    questions
}
