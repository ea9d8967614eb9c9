use serde::{Deserialize, Serialize};

use crate::db::types::TestStatus;
use crate::repositories::stats::{PlatformCounts, TestStatsRow};
use crate::schemas::format_primitive;
use crate::services::analytics::StudentAnalytics;
use crate::services::leaderboard::{LeaderboardEntry, PlaceholderEntry};

#[derive(Debug, Serialize)]
pub(crate) struct CategoryAccuracyResponse {
    pub(crate) category_id: Option<String>,
    pub(crate) category_name: String,
    pub(crate) attempts: usize,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
    pub(crate) accuracy: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentAnalyticsResponse {
    pub(crate) attempt_count: usize,
    pub(crate) average_percentage: f64,
    pub(crate) best_percentage: f64,
    pub(crate) categories: Vec<CategoryAccuracyResponse>,
}

impl From<StudentAnalytics> for StudentAnalyticsResponse {
    fn from(summary: StudentAnalytics) -> Self {
        Self {
            attempt_count: summary.attempt_count,
            average_percentage: summary.average_percentage,
            best_percentage: summary.best_percentage,
            categories: summary
                .categories
                .into_iter()
                .map(|category| CategoryAccuracyResponse {
                    category_id: category.category_id,
                    category_name: category.category_name,
                    attempts: category.attempts,
                    total_score: category.total_score,
                    max_score: category.max_score,
                    accuracy: category.accuracy,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TestStatsResponse {
    pub(crate) test_id: String,
    pub(crate) title: String,
    pub(crate) status: TestStatus,
    pub(crate) submitted_count: i64,
    pub(crate) active_count: i64,
    pub(crate) average_percentage: Option<f64>,
    pub(crate) best_percentage: Option<f64>,
}

impl From<TestStatsRow> for TestStatsResponse {
    fn from(row: TestStatsRow) -> Self {
        let round = |value: f64| (value * 100.0).round() / 100.0;
        Self {
            test_id: row.test_id,
            title: row.title,
            status: row.status,
            submitted_count: row.submitted_count,
            active_count: row.active_count,
            average_percentage: row.average_percentage.map(round),
            best_percentage: row.best_percentage.map(round),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PlatformAnalyticsResponse {
    pub(crate) students: i64,
    pub(crate) tests: i64,
    pub(crate) published_tests: i64,
    pub(crate) submitted_attempts: i64,
    pub(crate) live_sessions: usize,
    pub(crate) per_test: Vec<TestStatsResponse>,
}

impl PlatformAnalyticsResponse {
    pub(crate) fn new(counts: PlatformCounts, live_sessions: usize, rows: Vec<TestStatsRow>) -> Self {
        Self {
            students: counts.students,
            tests: counts.tests,
            published_tests: counts.published_tests,
            submitted_attempts: counts.submitted_attempts,
            live_sessions,
            per_test: rows.into_iter().map(TestStatsResponse::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LeaderboardQuery {
    #[serde(default, alias = "testId")]
    pub(crate) test_id: Option<String>,
    #[serde(default = "default_leaderboard_limit")]
    pub(crate) limit: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct LeaderboardEntryResponse {
    pub(crate) rank: u32,
    pub(crate) user_id: String,
    pub(crate) full_name: String,
    pub(crate) attempt_id: String,
    pub(crate) test_id: String,
    pub(crate) test_title: String,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
    pub(crate) percentage: f64,
    pub(crate) submitted_at: String,
}

impl From<LeaderboardEntry> for LeaderboardEntryResponse {
    fn from(entry: LeaderboardEntry) -> Self {
        Self {
            rank: entry.rank,
            user_id: entry.user_id,
            full_name: entry.full_name,
            attempt_id: entry.attempt_id,
            test_id: entry.test_id,
            test_title: entry.test_title,
            total_score: entry.total_score,
            max_score: entry.max_score,
            percentage: entry.percentage,
            submitted_at: format_primitive(entry.submitted_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PlaceholderEntryResponse {
    pub(crate) rank: u32,
    pub(crate) full_name: String,
    pub(crate) percentage: f64,
    pub(crate) label: String,
}

impl From<PlaceholderEntry> for PlaceholderEntryResponse {
    fn from(entry: PlaceholderEntry) -> Self {
        Self {
            rank: entry.rank,
            full_name: entry.full_name.to_string(),
            percentage: entry.percentage,
            label: entry.label.to_string(),
        }
    }
}

/// Ranked entries come from submitted attempts only; placeholders are a separate list.
#[derive(Debug, Serialize)]
pub(crate) struct LeaderboardResponse {
    pub(crate) test_id: Option<String>,
    pub(crate) entries: Vec<LeaderboardEntryResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) placeholders: Option<Vec<PlaceholderEntryResponse>>,
}

const fn default_leaderboard_limit() -> usize {
    50
}
