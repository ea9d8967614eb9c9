use std::collections::HashMap;

use time::PrimitiveDateTime;

use crate::core::metrics::EXAM_SUBMISSIONS_TOTAL;
use crate::db::models::Attempt;
use crate::services::scoring;
use crate::services::session::cache::{AnswerCache, AnswerDraft};
use crate::services::session::store::{
    AttemptSubmission, QuestionWithOptions, StoreError, SubmitWrite,
};
use crate::services::session::{SessionRegistry, SubmitTrigger};

/// Expired attempts younger than this are left to their own countdown.
pub(crate) const SWEEP_GRACE_SECONDS: i64 = 30;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SweepReport {
    pub(crate) submitted: usize,
    pub(crate) skipped_live: usize,
    pub(crate) already_submitted: usize,
    pub(crate) failed: usize,
}

/// Submits expired attempts that no live session owns, grading them from their saved draft.
pub(crate) async fn sweep_expired(
    sessions: &SessionRegistry,
    now: PrimitiveDateTime,
) -> Result<SweepReport, StoreError> {
    let store = sessions.store();
    let expired = store.expired_attempts(now, SWEEP_GRACE_SECONDS).await?;
    let mut report = SweepReport::default();
    let mut questions_by_test: HashMap<String, Vec<QuestionWithOptions>> = HashMap::new();

    for attempt in expired {
        if sessions.contains(&attempt.id).await {
            report.skipped_live += 1;
            continue;
        }

        if !questions_by_test.contains_key(&attempt.test_id) {
            match store.fetch_questions(&attempt.test_id).await {
                Ok(questions) => {
                    questions_by_test.insert(attempt.test_id.clone(), questions);
                }
                Err(err) => {
                    tracing::error!(
                        attempt_id = %attempt.id,
                        test_id = %attempt.test_id,
                        error = %err,
                        "Failed to load questions for expired attempt"
                    );
                    report.failed += 1;
                    continue;
                }
            }
        }
        let questions =
            questions_by_test.get(&attempt.test_id).map(Vec::as_slice).unwrap_or_default();

        match store.submit_attempt(&graded_submission(&attempt, questions, now)).await {
            Ok(SubmitWrite::Written) => {
                metrics::counter!(
                    EXAM_SUBMISSIONS_TOTAL,
                    "trigger" => SubmitTrigger::Sweeper.as_str()
                )
                .increment(1);
                tracing::info!(
                    attempt_id = %attempt.id,
                    user_id = %attempt.user_id,
                    "Expired attempt submitted from draft"
                );
                report.submitted += 1;
            }
            Ok(SubmitWrite::AlreadySubmitted) => report.already_submitted += 1,
            Err(err) => {
                tracing::error!(attempt_id = %attempt.id, error = %err, "Failed to submit expired attempt");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

fn graded_submission(
    attempt: &Attempt,
    questions: &[QuestionWithOptions],
    now: PrimitiveDateTime,
) -> AttemptSubmission {
    let mut cache = AnswerCache::new(questions.iter().map(|item| item.question.id.clone()));
    cache.restore(&AnswerDraft::from_value(&attempt.answer_draft.0));
    let grading = scoring::grade(questions, &cache);

    AttemptSubmission {
        attempt_id: attempt.id.clone(),
        submitted_at: now,
        total_score: grading.total_score,
        max_score: grading.max_score,
        time_remaining_seconds: 0,
        answers: grading.answers,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sqlx::types::Json;
    use time::Duration;
    use tokio::sync::watch;

    use super::*;
    use crate::core::time::primitive_now_utc;
    use crate::db::types::{AttemptStatus, TestStatus};
    use crate::services::session::store::memory::{fixtures, MemoryAttemptStore};
    use crate::services::session::{DemoVault, SessionIdentity};

    fn setup() -> (Arc<MemoryAttemptStore>, SessionRegistry, watch::Sender<bool>) {
        let store = Arc::new(MemoryAttemptStore::with_test(
            fixtures::test("t1", TestStatus::Published, 10),
            vec![
                fixtures::question("t1", "q1", 0, 2.0, 1),
                fixtures::question("t1", "q2", 1, 3.0, 0),
            ],
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let registry = SessionRegistry::new(store.clone(), DemoVault::default(), shutdown_rx);
        (store, registry, shutdown_tx)
    }

    #[tokio::test]
    async fn submits_expired_attempt_from_draft() {
        let (store, registry, _shutdown) = setup();
        let now = primitive_now_utc();
        let mut attempt =
            fixtures::attempt("a1", "student-1", "t1", now - Duration::minutes(15), 600);
        attempt.answer_draft = Json(serde_json::json!({ "q1": "q1-o1", "q2": "q2-o3" }));
        store.insert_attempt(attempt);

        let report = sweep_expired(&registry, now).await.unwrap();
        assert_eq!(report, SweepReport { submitted: 1, ..SweepReport::default() });

        let stored = store.attempt("a1").unwrap();
        assert_eq!(stored.status, AttemptStatus::Submitted);
        assert_eq!(stored.total_score, Some(2.0));
        assert_eq!(stored.max_score, Some(5.0));
        assert_eq!(stored.time_remaining_seconds, 0);

        let answers = store.state().answers.get("a1").cloned().unwrap();
        assert_eq!(answers.len(), 2);
    }

    #[tokio::test]
    async fn leaves_running_and_recent_attempts_alone() {
        let (store, registry, _shutdown) = setup();
        let now = primitive_now_utc();
        store.insert_attempt(fixtures::attempt("running", "s1", "t1", now, 600));
        store.insert_attempt(fixtures::attempt(
            "in-grace",
            "s2",
            "t1",
            now - Duration::minutes(10) + Duration::seconds(5),
            600,
        ));

        let report = sweep_expired(&registry, now).await.unwrap();
        assert_eq!(report, SweepReport::default());
        assert_eq!(store.attempt("running").unwrap().status, AttemptStatus::Active);
        assert_eq!(store.attempt("in-grace").unwrap().status, AttemptStatus::Active);
    }

    #[tokio::test]
    async fn skips_attempts_owned_by_a_live_session() {
        let (store, registry, _shutdown) = setup();
        let live = registry
            .open(SessionIdentity::Student { user_id: "student-1".into() }, "t1")
            .await
            .unwrap();

        let later = primitive_now_utc() + Duration::minutes(20);
        let report = sweep_expired(&registry, later).await.unwrap();
        assert_eq!(report.skipped_live, 1);
        assert_eq!(report.submitted, 0);
        assert_eq!(store.attempt(live.attempt_id()).unwrap().status, AttemptStatus::Active);
    }
}
