use std::cmp::Ordering;
use std::collections::HashMap;

use time::PrimitiveDateTime;

use crate::repositories::stats::ScoredAttemptRow;
use crate::services::scoring::percentage;

#[derive(Debug, Clone)]
pub(crate) struct LeaderboardEntry {
    pub(crate) rank: u32,
    pub(crate) user_id: String,
    pub(crate) full_name: String,
    pub(crate) attempt_id: String,
    pub(crate) test_id: String,
    pub(crate) test_title: String,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
    pub(crate) percentage: f64,
    pub(crate) submitted_at: PrimitiveDateTime,
}

/// Sample rows for an empty board. Never mixed into the ranked entries.
#[derive(Debug, Clone)]
pub(crate) struct PlaceholderEntry {
    pub(crate) rank: u32,
    pub(crate) full_name: &'static str,
    pub(crate) percentage: f64,
    pub(crate) label: &'static str,
}

const PLACEHOLDERS: [(&str, f64); 5] = [
    ("Aarav Sharma", 96.5),
    ("Priya Nair", 93.0),
    ("Rohan Verma", 89.25),
    ("Sneha Iyer", 84.0),
    ("Kabir Singh", 78.5),
];

pub(crate) fn placeholder_entries() -> Vec<PlaceholderEntry> {
    PLACEHOLDERS
        .iter()
        .zip(1..)
        .map(|((full_name, percentage), rank)| PlaceholderEntry {
            rank,
            full_name: *full_name,
            percentage: *percentage,
            label: "sample",
        })
        .collect()
}

/// Keeps each student's best attempt, then ranks by percentage with earlier submissions first
/// on ties.
pub(crate) fn rank_entries(rows: Vec<ScoredAttemptRow>, limit: usize) -> Vec<LeaderboardEntry> {
    let mut best: HashMap<String, (f64, ScoredAttemptRow)> = HashMap::new();

    for row in rows {
        let pct = percentage(row.total_score, row.max_score);
        match best.get(&row.user_id) {
            Some((current, existing)) if !beats(pct, &row, *current, existing) => {}
            _ => {
                best.insert(row.user_id.clone(), (pct, row));
            }
        }
    }

    let mut ranked: Vec<(f64, ScoredAttemptRow)> = best.into_values().collect();
    ranked.sort_by(|(a_pct, a), (b_pct, b)| {
        b_pct
            .partial_cmp(a_pct)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.submitted_at.cmp(&b.submitted_at))
            .then_with(|| a.attempt_id.cmp(&b.attempt_id))
    });

    ranked
        .into_iter()
        .take(limit)
        .zip(1..)
        .map(|((pct, row), rank)| LeaderboardEntry {
            rank,
            user_id: row.user_id,
            full_name: row.full_name,
            attempt_id: row.attempt_id,
            test_id: row.test_id,
            test_title: row.test_title,
            total_score: row.total_score,
            max_score: row.max_score,
            percentage: pct,
            submitted_at: row.submitted_at,
        })
        .collect()
}

fn beats(pct: f64, row: &ScoredAttemptRow, current: f64, existing: &ScoredAttemptRow) -> bool {
    pct > current || (pct == current && row.submitted_at < existing.submitted_at)
}
