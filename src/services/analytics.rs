use std::collections::BTreeMap;

use crate::repositories::stats::ScoredAttemptRow;
use crate::services::scoring::percentage;

const UNCATEGORISED: &str = "Uncategorised";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CategoryAccuracy {
    pub(crate) category_id: Option<String>,
    pub(crate) category_name: String,
    pub(crate) attempts: usize,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
    pub(crate) accuracy: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StudentAnalytics {
    pub(crate) attempt_count: usize,
    pub(crate) average_percentage: f64,
    pub(crate) best_percentage: f64,
    pub(crate) categories: Vec<CategoryAccuracy>,
}

/// Summarises a student's submitted attempts. Category accuracy pools scores across attempts
/// so longer tests weigh more than short ones.
pub(crate) fn summarize(rows: &[ScoredAttemptRow]) -> StudentAnalytics {
    if rows.is_empty() {
        return StudentAnalytics {
            attempt_count: 0,
            average_percentage: 0.0,
            best_percentage: 0.0,
            categories: Vec::new(),
        };
    }

    let percentages: Vec<f64> =
        rows.iter().map(|row| percentage(row.total_score, row.max_score)).collect();
    let average = percentages.iter().sum::<f64>() / percentages.len() as f64;
    let best = percentages.iter().copied().fold(0.0, f64::max);

    let mut grouped: BTreeMap<String, CategoryAccuracy> = BTreeMap::new();
    for row in rows {
        let name = row.category_name.clone().unwrap_or_else(|| UNCATEGORISED.to_string());
        let entry = grouped.entry(name.clone()).or_insert_with(|| CategoryAccuracy {
            category_id: row.category_id.clone(),
            category_name: name,
            attempts: 0,
            total_score: 0.0,
            max_score: 0.0,
            accuracy: 0.0,
        });
        entry.attempts += 1;
        entry.total_score += row.total_score;
        entry.max_score += row.max_score;
    }

    let categories = grouped
        .into_values()
        .map(|mut category| {
            category.accuracy = percentage(category.total_score, category.max_score);
            category
        })
        .collect();

    StudentAnalytics {
        attempt_count: rows.len(),
        average_percentage: (average * 100.0).round() / 100.0,
        best_percentage: best,
        categories,
    }
}
