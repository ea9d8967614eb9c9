use serde::Serialize;

use crate::services::scoring::{percentage, LetterGrade};
use crate::services::results::ResultSheet;
use crate::schemas::format_primitive;

#[derive(Debug, Serialize)]
pub(crate) struct ResultSummaryResponse {
    pub(crate) attempt_id: String,
    pub(crate) test_id: String,
    pub(crate) test_title: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
    pub(crate) percentage: f64,
    pub(crate) is_demo: bool,
}

impl ResultSummaryResponse {
    pub(crate) fn new(
        attempt_id: String,
        test_id: String,
        test_title: String,
        submitted_at: Option<time::PrimitiveDateTime>,
        total_score: f64,
        max_score: f64,
        is_demo: bool,
    ) -> Self {
        Self {
            attempt_id,
            test_id,
            test_title,
            submitted_at: submitted_at.map(format_primitive),
            total_score,
            max_score,
            percentage: percentage(total_score, max_score),
            is_demo,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionOutcomeResponse {
    pub(crate) question_id: String,
    pub(crate) text: String,
    pub(crate) points: f64,
    pub(crate) answered: bool,
    pub(crate) chosen_option_id: Option<String>,
    pub(crate) chosen_label: Option<String>,
    pub(crate) correct_option_id: Option<String>,
    pub(crate) correct_label: Option<String>,
    pub(crate) is_correct: bool,
    pub(crate) score: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultDetailResponse {
    pub(crate) attempt_id: String,
    pub(crate) test_id: String,
    pub(crate) test_title: String,
    pub(crate) submitted_at: String,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: LetterGrade,
    pub(crate) passed: bool,
    pub(crate) time_remaining_seconds: u32,
    pub(crate) correct_count: usize,
    pub(crate) wrong_count: usize,
    pub(crate) unanswered_count: usize,
    pub(crate) is_demo: bool,
    pub(crate) report_url: String,
    pub(crate) questions: Vec<QuestionOutcomeResponse>,
}

impl ResultDetailResponse {
    pub(crate) fn from_sheet(sheet: ResultSheet, is_demo: bool, api_prefix: &str) -> Self {
        Self {
            report_url: format!("{api_prefix}/results/{}/report", sheet.attempt_id),
            attempt_id: sheet.attempt_id,
            test_id: sheet.test_id,
            test_title: sheet.test_title,
            submitted_at: format_primitive(sheet.submitted_at),
            total_score: sheet.total_score,
            max_score: sheet.max_score,
            percentage: sheet.percentage,
            grade: sheet.grade,
            passed: sheet.passed,
            time_remaining_seconds: sheet.time_remaining_seconds,
            correct_count: sheet.correct_count,
            wrong_count: sheet.wrong_count,
            unanswered_count: sheet.unanswered_count,
            is_demo,
            questions: sheet
                .questions
                .into_iter()
                .map(|outcome| QuestionOutcomeResponse {
                    question_id: outcome.question_id,
                    text: outcome.text,
                    points: outcome.points,
                    answered: outcome.answered,
                    chosen_option_id: outcome.chosen_option_id,
                    chosen_label: outcome.chosen_label,
                    correct_option_id: outcome.correct_option_id,
                    correct_label: outcome.correct_label,
                    is_correct: outcome.is_correct,
                    score: outcome.score,
                })
                .collect(),
        }
    }
}
