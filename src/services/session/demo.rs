use std::collections::HashMap;
use std::sync::Arc;

use time::PrimitiveDateTime;
use tokio::sync::RwLock;

use crate::db::models::Test;
use crate::services::scoring::GradedAnswer;
use crate::services::session::store::QuestionWithOptions;

/// A finished demo attempt with enough of the test captured to render results later.
#[derive(Debug, Clone)]
pub(crate) struct DemoResult {
    pub(crate) attempt_id: String,
    pub(crate) test: Test,
    pub(crate) questions: Vec<QuestionWithOptions>,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
    pub(crate) time_remaining_seconds: u32,
    pub(crate) answers: Vec<GradedAnswer>,
}

/// Process-local results of demo identities, keyed by demo id. Nothing here reaches PostgreSQL.
#[derive(Clone, Default)]
pub(crate) struct DemoVault {
    results: Arc<RwLock<HashMap<String, Vec<DemoResult>>>>,
}

impl DemoVault {
    pub(crate) async fn record(&self, demo_id: &str, result: DemoResult) {
        let mut results = self.results.write().await;
        let entries = results.entry(demo_id.to_string()).or_default();
        entries.retain(|existing| existing.test.id != result.test.id);
        entries.push(result);
    }

    pub(crate) async fn find_for_test(&self, demo_id: &str, test_id: &str) -> Option<DemoResult> {
        let results = self.results.read().await;
        results.get(demo_id)?.iter().find(|result| result.test.id == test_id).cloned()
    }

    pub(crate) async fn get(&self, demo_id: &str, attempt_id: &str) -> Option<DemoResult> {
        let results = self.results.read().await;
        results.get(demo_id)?.iter().find(|result| result.attempt_id == attempt_id).cloned()
    }

    /// Newest first.
    pub(crate) async fn list(&self, demo_id: &str) -> Vec<DemoResult> {
        let results = self.results.read().await;
        let mut entries = results.get(demo_id).cloned().unwrap_or_default();
        entries.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        entries
    }

    /// Drops results submitted before `cutoff`; returns how many were removed.
    pub(crate) async fn prune(&self, cutoff: PrimitiveDateTime) -> usize {
        let mut results = self.results.write().await;
        let mut removed = 0;
        results.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|result| result.submitted_at >= cutoff);
            removed += before - entries.len();
            !entries.is_empty()
        });
        removed
    }
}
