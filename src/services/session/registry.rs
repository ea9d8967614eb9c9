use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex, MutexGuard, RwLock};

use crate::core::metrics::{EXAM_SESSIONS_LIVE, EXAM_SESSIONS_STARTED_TOTAL};
use crate::core::time::primitive_now_utc;
use crate::services::session::controller::{
    SessionController, SessionError, SessionIdentity, SubmitOutcome, SubmitStep, SubmitTrigger,
    Tick,
};
use crate::services::session::countdown;
use crate::services::session::demo::DemoVault;
use crate::services::session::store::{AttemptStore, SubmitWrite};

/// One attempt being taken right now. HTTP handlers and the countdown share it.
pub(crate) struct LiveSession {
    attempt_id: String,
    test_id: String,
    identity: SessionIdentity,
    store: Arc<dyn AttemptStore>,
    vault: DemoVault,
    controller: Mutex<SessionController>,
}

impl LiveSession {
    fn new(controller: SessionController, store: Arc<dyn AttemptStore>, vault: DemoVault) -> Self {
        Self {
            attempt_id: controller.attempt_id().to_string(),
            test_id: controller.test().id.clone(),
            identity: controller.identity().clone(),
            store,
            vault,
            controller: Mutex::new(controller),
        }
    }

    pub(crate) fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub(crate) fn is_owned_by(&self, identity: &SessionIdentity) -> bool {
        &self.identity == identity
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, SessionController> {
        self.controller.lock().await
    }

    pub(crate) async fn tick(&self) -> Tick {
        self.controller.lock().await.tick(tokio::time::Instant::now())
    }

    /// Single entry point for every submitter. The latch is taken under the lock and the
    /// write happens after it is released, so concurrent callers see `InFlight`.
    pub(crate) async fn submit(&self, trigger: SubmitTrigger) -> Result<SubmitOutcome, SessionError> {
        let pending = {
            let mut controller = self.controller.lock().await;
            match controller.begin_submit(trigger, primitive_now_utc())? {
                SubmitStep::Done(outcome) => return Ok(outcome),
                SubmitStep::Write(pending) => pending,
            }
        };

        let written = match (&self.identity, &pending.demo_result) {
            (SessionIdentity::Demo { demo_id }, Some(result)) => {
                self.vault.record(demo_id, result.clone()).await;
                Ok(SubmitWrite::Written)
            }
            _ => self.store.submit_attempt(&pending.submission).await,
        };

        self.controller.lock().await.finish_submit(pending, written)
    }

    /// Persists the cache for resume. Demo sessions keep nothing remotely.
    pub(crate) async fn save_draft(&self) -> Result<(), SessionError> {
        let (draft, remaining) = self.controller.lock().await.draft()?;
        if self.identity.is_demo() {
            return Ok(());
        }

        self.store
            .save_draft(&self.attempt_id, &draft, remaining, primitive_now_utc())
            .await
            .map_err(SessionError::Store)
    }
}

#[derive(Default)]
struct Sessions {
    by_attempt: HashMap<String, Arc<LiveSession>>,
    by_owner: HashMap<(String, String), String>,
}

impl Sessions {
    fn for_owner(&self, owner_id: &str, test_id: &str) -> Option<Arc<LiveSession>> {
        let attempt_id = self.by_owner.get(&(owner_id.to_string(), test_id.to_string()))?;
        self.by_attempt.get(attempt_id).cloned()
    }
}

struct RegistryInner {
    store: Arc<dyn AttemptStore>,
    vault: DemoVault,
    sessions: RwLock<Sessions>,
    shutdown: watch::Receiver<bool>,
}

/// Owns every live session, keyed by attempt id.
#[derive(Clone)]
pub(crate) struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub(crate) fn new(
        store: Arc<dyn AttemptStore>,
        vault: DemoVault,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                store,
                vault,
                sessions: RwLock::new(Sessions::default()),
                shutdown,
            }),
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn AttemptStore> {
        &self.inner.store
    }

    pub(crate) fn vault(&self) -> &DemoVault {
        &self.inner.vault
    }

    /// Returns the live session of `identity` for `test_id`, loading and starting one if needed.
    pub(crate) async fn open(
        &self,
        identity: SessionIdentity,
        test_id: &str,
    ) -> Result<Arc<LiveSession>, SessionError> {
        if let Some(live) = self.inner.sessions.read().await.for_owner(identity.owner_id(), test_id)
        {
            return Ok(live);
        }

        let mut controller = SessionController::load(
            self.inner.store.as_ref(),
            &self.inner.vault,
            identity.clone(),
            test_id,
            primitive_now_utc(),
        )
        .await?;

        let mut sessions = self.inner.sessions.write().await;
        if let Some(existing) = sessions.by_attempt.get(controller.attempt_id()) {
            return Ok(existing.clone());
        }
        if let Some(existing) = sessions.for_owner(identity.owner_id(), test_id) {
            return Ok(existing);
        }

        controller.begin()?;
        let live = Arc::new(LiveSession::new(
            controller,
            self.inner.store.clone(),
            self.inner.vault.clone(),
        ));
        sessions.by_attempt.insert(live.attempt_id.clone(), live.clone());
        sessions
            .by_owner
            .insert((identity.owner_id().to_string(), test_id.to_string()), live.attempt_id.clone());
        let live_count = sessions.by_attempt.len();
        drop(sessions);

        metrics::counter!(EXAM_SESSIONS_STARTED_TOTAL).increment(1);
        metrics::gauge!(EXAM_SESSIONS_LIVE).set(live_count as f64);
        tracing::info!(attempt_id = %live.attempt_id, test_id, live_count, "Test session started");

        countdown::spawn(self.clone(), live.clone(), self.inner.shutdown.clone());
        Ok(live)
    }

    pub(crate) async fn get(&self, attempt_id: &str) -> Option<Arc<LiveSession>> {
        self.inner.sessions.read().await.by_attempt.get(attempt_id).cloned()
    }

    pub(crate) async fn contains(&self, attempt_id: &str) -> bool {
        self.inner.sessions.read().await.by_attempt.contains_key(attempt_id)
    }

    pub(crate) async fn live_count(&self) -> usize {
        self.inner.sessions.read().await.by_attempt.len()
    }

    /// Submits through the session and evicts it once the attempt is final.
    pub(crate) async fn submit(
        &self,
        live: &Arc<LiveSession>,
        trigger: SubmitTrigger,
    ) -> Result<SubmitOutcome, SessionError> {
        let outcome = live.submit(trigger).await?;
        if matches!(outcome, SubmitOutcome::Submitted(_) | SubmitOutcome::AlreadySubmitted { .. }) {
            self.evict(live).await;
        }
        Ok(outcome)
    }

    /// Gives up on a live session whose submission keeps failing. The attempt stays active
    /// with its latest answers saved, so the sweeper submits it.
    pub(crate) async fn release(&self, live: &Arc<LiveSession>) {
        if let Err(err) = live.save_draft().await {
            tracing::warn!(
                attempt_id = %live.attempt_id,
                error = %err,
                "Failed to save draft of released session"
            );
        }
        self.evict(live).await;
    }

    async fn evict(&self, live: &LiveSession) {
        let mut sessions = self.inner.sessions.write().await;
        if sessions.by_attempt.remove(&live.attempt_id).is_none() {
            return;
        }
        sessions.by_owner.remove(&(live.identity.owner_id().to_string(), live.test_id.clone()));
        let live_count = sessions.by_attempt.len();
        drop(sessions);

        metrics::gauge!(EXAM_SESSIONS_LIVE).set(live_count as f64);
        tracing::debug!(attempt_id = %live.attempt_id, live_count, "Test session evicted");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::db::types::{AttemptStatus, TestStatus};
    use crate::services::session::controller::{Redirect, SessionPhase};
    use crate::services::session::countdown::MAX_TIMER_SUBMIT_FAILURES;
    use crate::tasks::sweeper::sweep_expired;
    use crate::services::session::store::memory::{fixtures, MemoryAttemptStore};

    struct Harness {
        store: Arc<MemoryAttemptStore>,
        registry: SessionRegistry,
        shutdown: watch::Sender<bool>,
    }

    fn harness(duration_minutes: i32) -> Harness {
        let store = Arc::new(MemoryAttemptStore::with_test(
            fixtures::test("t1", TestStatus::Published, duration_minutes),
            vec![
                fixtures::question("t1", "q1", 0, 1.0, 0),
                fixtures::question("t1", "q2", 1, 1.0, 0),
                fixtures::question("t1", "q3", 2, 1.0, 0),
            ],
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let registry = SessionRegistry::new(store.clone(), DemoVault::default(), shutdown_rx);
        Harness { store, registry, shutdown: shutdown_tx }
    }

    fn student() -> SessionIdentity {
        SessionIdentity::Student { user_id: "student-1".into() }
    }

    fn demo() -> SessionIdentity {
        SessionIdentity::Demo { demo_id: "demo-visitor".into() }
    }

    #[tokio::test(start_paused = true)]
    async fn reopening_returns_the_same_live_session() {
        let h = harness(1);
        let first = h.registry.open(student(), "t1").await.expect("open");
        let second = h.registry.open(student(), "t1").await.expect("reopen");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(h.registry.live_count().await, 1);
        assert_eq!(h.store.state().attempts.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_submits_exactly_once_at_zero() {
        let h = harness(1);
        let live = h.registry.open(student(), "t1").await.expect("open");
        let attempt_id = live.attempt_id().to_string();
        live.lock().await.select_option("q1", Some("q1-o0")).expect("select");

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(h.store.state().submit_calls, 0);
        assert_eq!(live.lock().await.phase(), SessionPhase::InProgress);

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(h.store.state().submit_calls, 1);
        let attempt = h.store.attempt(&attempt_id).expect("attempt");
        assert_eq!(attempt.status, AttemptStatus::Submitted);
        assert_eq!(attempt.total_score, Some(1.0));
        let receipt = live.lock().await.receipt().cloned().expect("receipt");
        assert_eq!(receipt.trigger, SubmitTrigger::Timer);
        assert!(!h.registry.contains(&attempt_id).await);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.store.state().submit_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_submit_in_flight_wins_race_with_timer() {
        let h = harness(1);
        let live = h.registry.open(student(), "t1").await.expect("open");
        let attempt_id = live.attempt_id().to_string();
        h.store.delay_submits(Duration::from_secs(10));

        tokio::time::sleep(Duration::from_millis(58_500)).await;
        let manual = {
            let registry = h.registry.clone();
            let live = live.clone();
            tokio::spawn(async move { registry.submit(&live, SubmitTrigger::Manual).await })
        };

        tokio::time::sleep(Duration::from_secs(20)).await;
        let outcome = manual.await.expect("join").expect("submit");

        assert!(matches!(outcome, SubmitOutcome::Submitted(ref receipt)
            if receipt.trigger == SubmitTrigger::Manual));
        assert_eq!(h.store.state().submit_calls, 1);
        assert_eq!(h.store.attempt(&attempt_id).expect("attempt").status, AttemptStatus::Submitted);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_manual_submits_write_once() {
        let h = harness(5);
        let live = h.registry.open(student(), "t1").await.expect("open");
        h.store.delay_submits(Duration::from_secs(1));

        let (first, second) = tokio::join!(
            h.registry.submit(&live, SubmitTrigger::Manual),
            h.registry.submit(&live, SubmitTrigger::Manual),
        );
        let outcomes = [first.expect("first"), second.expect("second")];

        let submitted =
            outcomes.iter().filter(|outcome| matches!(outcome, SubmitOutcome::Submitted(_))).count();
        let in_flight =
            outcomes.iter().filter(|outcome| matches!(outcome, SubmitOutcome::InFlight)).count();
        assert_eq!(submitted, 1);
        assert_eq!(in_flight, 1);
        assert_eq!(h.store.state().submit_calls, 1);

        let again = h.registry.submit(&live, SubmitTrigger::Manual).await.expect("again");
        assert!(matches!(again, SubmitOutcome::AlreadySubmitted { .. }));
        assert_eq!(h.store.state().submit_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_submit_stays_live_and_can_be_retried() {
        let h = harness(5);
        let live = h.registry.open(student(), "t1").await.expect("open");
        h.store.state().failing_submits = 1;

        let failed = h.registry.submit(&live, SubmitTrigger::Manual).await;
        assert!(matches!(failed, Err(SessionError::Submit(_))));
        assert_eq!(live.lock().await.phase(), SessionPhase::InProgress);
        assert!(h.registry.contains(live.attempt_id()).await);

        let retried = h.registry.submit(&live, SubmitTrigger::Manual).await.expect("retry");
        assert!(matches!(retried, SubmitOutcome::Submitted(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_stops_retrying_and_leaves_attempt_to_sweeper() {
        let h = harness(1);
        let live = h.registry.open(student(), "t1").await.expect("open");
        let attempt_id = live.attempt_id().to_string();
        live.lock().await.select_option("q1", Some("q1-o0")).expect("select");
        h.store.state().failing_submits = usize::MAX;

        tokio::time::sleep(Duration::from_secs(3600)).await;

        assert_eq!(h.store.state().submit_calls, MAX_TIMER_SUBMIT_FAILURES as usize);
        assert!(!h.registry.contains(&attempt_id).await);
        let attempt = h.store.attempt(&attempt_id).expect("attempt");
        assert_eq!(attempt.status, AttemptStatus::Active);
        assert_eq!(attempt.answer_draft.0, serde_json::json!({ "q1": "q1-o0" }));

        h.store.state().failing_submits = 0;
        let later = primitive_now_utc() + time::Duration::minutes(5);
        let report = sweep_expired(&h.registry, later).await.expect("sweep");

        assert_eq!(report.submitted, 1);
        assert_eq!(report.skipped_live, 0);
        let attempt = h.store.attempt(&attempt_id).expect("attempt");
        assert_eq!(attempt.status, AttemptStatus::Submitted);
        assert_eq!(attempt.total_score, Some(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_backs_off_between_failed_submissions() {
        let h = harness(1);
        let live = h.registry.open(student(), "t1").await.expect("open");
        h.store.state().failing_submits = 2;

        tokio::time::sleep(Duration::from_millis(60_500)).await;
        assert_eq!(h.store.state().submit_calls, 1);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.store.state().submit_calls, 2);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.store.state().submit_calls, 2);
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(h.store.state().submit_calls, 3);
        assert_eq!(live.lock().await.phase(), SessionPhase::Submitted);
        assert!(!h.registry.contains(live.attempt_id()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn submitted_attempt_redirects_on_reentry() {
        let h = harness(5);
        let live = h.registry.open(student(), "t1").await.expect("open");
        h.registry.submit(&live, SubmitTrigger::Manual).await.expect("submit");

        let reentry = h.registry.open(student(), "t1").await;

        match reentry {
            Err(SessionError::Redirect(Redirect::Results { attempt_id })) => {
                assert_eq!(attempt_id, live.attempt_id())
            }
            other => panic!("expected redirect, got {:?}", other.err()),
        }
        assert_eq!(h.store.state().submit_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn demo_results_stay_in_the_vault() {
        let h = harness(5);
        let live = h.registry.open(demo(), "t1").await.expect("open");
        live.lock().await.select_option("q1", Some("q1-o0")).expect("select");
        live.lock().await.select_option("q2", Some("q2-o2")).expect("select");
        live.save_draft().await.expect("draft");

        let outcome = h.registry.submit(&live, SubmitTrigger::Manual).await.expect("submit");
        let SubmitOutcome::Submitted(receipt) = outcome else {
            panic!("expected submission");
        };

        {
            let state = h.store.state();
            assert_eq!(state.attempt_reads, 0);
            assert_eq!(state.attempt_writes, 0);
            assert_eq!(state.submit_calls, 0);
            assert_eq!(state.draft_saves, 0);
        }

        let stored = h.registry.vault().get("demo-visitor", &receipt.attempt_id).await.expect("vault");
        assert_eq!(stored.total_score, 1.0);
        assert_eq!(stored.max_score, 3.0);
        assert_eq!(stored.answers.len(), 2);
        assert_eq!(stored.questions.len(), 3);

        let reentry = h.registry.open(demo(), "t1").await;
        assert!(matches!(reentry, Err(SessionError::Redirect(Redirect::Results { .. }))));
    }

    #[tokio::test(start_paused = true)]
    async fn draft_is_saved_for_students() {
        let h = harness(5);
        let live = h.registry.open(student(), "t1").await.expect("open");
        live.lock().await.select_option("q3", Some("q3-o1")).expect("select");

        live.save_draft().await.expect("draft");

        let attempt = h.store.attempt(live.attempt_id()).expect("attempt");
        assert_eq!(attempt.answer_draft.0, serde_json::json!({ "q3": "q3-o1" }));
        assert_eq!(h.store.state().draft_saves, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_countdowns() {
        let h = harness(1);
        let live = h.registry.open(student(), "t1").await.expect("open");

        h.shutdown.send(true).expect("shutdown");
        tokio::time::sleep(Duration::from_secs(120)).await;

        assert_eq!(h.store.state().submit_calls, 0);
        assert_eq!(live.lock().await.phase(), SessionPhase::InProgress);
    }
}
