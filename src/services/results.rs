use std::collections::HashMap;

use time::PrimitiveDateTime;

use crate::db::models::Answer;
use crate::services::scoring::{letter_grade, percentage, GradedAnswer, LetterGrade};
use crate::services::session::store::QuestionWithOptions;

/// One stored answer as read back for results. Unanswered questions have none.
#[derive(Debug, Clone)]
pub(crate) struct StoredAnswer {
    pub(crate) question_id: String,
    pub(crate) chosen_option_id: Option<String>,
    pub(crate) is_correct: bool,
    pub(crate) score: f64,
}

impl From<Answer> for StoredAnswer {
    fn from(answer: Answer) -> Self {
        Self {
            question_id: answer.question_id,
            chosen_option_id: answer.chosen_option_id,
            is_correct: answer.is_correct,
            score: answer.score,
        }
    }
}

impl From<GradedAnswer> for StoredAnswer {
    fn from(answer: GradedAnswer) -> Self {
        Self {
            question_id: answer.question_id,
            chosen_option_id: Some(answer.chosen_option_id),
            is_correct: answer.is_correct,
            score: answer.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QuestionOutcome {
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

#[derive(Debug, Clone)]
pub(crate) struct ResultSheet {
    pub(crate) attempt_id: String,
    pub(crate) test_id: String,
    pub(crate) test_title: String,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: LetterGrade,
    pub(crate) passed: bool,
    pub(crate) time_remaining_seconds: u32,
    pub(crate) correct_count: usize,
    pub(crate) wrong_count: usize,
    pub(crate) unanswered_count: usize,
    pub(crate) questions: Vec<QuestionOutcome>,
}

pub(crate) struct SheetHeader<'a> {
    pub(crate) attempt_id: &'a str,
    pub(crate) test_id: &'a str,
    pub(crate) test_title: &'a str,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
    pub(crate) time_remaining_seconds: u32,
}

/// Rebuilds the per-question breakdown in question order. A question without an answer row is
/// reported as unanswered with zero score.
pub(crate) fn build_sheet(
    header: SheetHeader<'_>,
    questions: &[QuestionWithOptions],
    answers: Vec<StoredAnswer>,
    pass_percentage: f64,
) -> ResultSheet {
    let mut by_question: HashMap<String, StoredAnswer> =
        answers.into_iter().map(|answer| (answer.question_id.clone(), answer)).collect();

    let mut outcomes = Vec::with_capacity(questions.len());
    let (mut correct_count, mut wrong_count, mut unanswered_count) = (0, 0, 0);

    for item in questions {
        let correct = item.correct_option();
        let answer = by_question.remove(&item.question.id);
        let chosen_option_id = answer.as_ref().and_then(|answer| answer.chosen_option_id.clone());
        let answered = chosen_option_id.is_some();
        let is_correct = answer.as_ref().is_some_and(|answer| answer.is_correct);

        match (answered, is_correct) {
            (false, _) => unanswered_count += 1,
            (true, true) => correct_count += 1,
            (true, false) => wrong_count += 1,
        }

        outcomes.push(QuestionOutcome {
            question_id: item.question.id.clone(),
            text: item.question.text.clone(),
            points: item.question.points,
            answered,
            chosen_label: chosen_option_id
                .as_deref()
                .and_then(|id| item.option(id))
                .map(|option| option.label.clone()),
            chosen_option_id,
            correct_option_id: correct.map(|option| option.id.clone()),
            correct_label: correct.map(|option| option.label.clone()),
            is_correct,
            score: answer.map(|answer| answer.score).unwrap_or(0.0),
        });
    }

    let pct = percentage(header.total_score, header.max_score);
    ResultSheet {
        attempt_id: header.attempt_id.to_string(),
        test_id: header.test_id.to_string(),
        test_title: header.test_title.to_string(),
        submitted_at: header.submitted_at,
        total_score: header.total_score,
        max_score: header.max_score,
        percentage: pct,
        grade: letter_grade(pct, pass_percentage),
        passed: pct >= pass_percentage,
        time_remaining_seconds: header.time_remaining_seconds,
        correct_count,
        wrong_count,
        unanswered_count,
        questions: outcomes,
    }
}
