use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::db::models::Test;
use crate::db::types::TestStatus;
use crate::repositories::questions::QuestionWithOptions;
use crate::schemas::format_primitive;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct TestCreate {
    #[validate(length(min = 1, max = 200, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default, alias = "categoryId")]
    pub(crate) category_id: Option<String>,
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 1, max = 600, message = "duration_minutes must be between 1 and 600"))]
    pub(crate) duration_minutes: i32,
    #[serde(default = "default_status")]
    pub(crate) status: TestStatus,
    #[serde(default, alias = "shuffleQuestions")]
    pub(crate) shuffle_questions: bool,
    #[serde(default, alias = "shuffleOptions")]
    pub(crate) shuffle_options: bool,
    #[serde(default, alias = "negativeMarking")]
    pub(crate) negative_marking: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct TestUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "title must not be empty"))]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default, alias = "categoryId")]
    pub(crate) category_id: Option<String>,
    #[serde(default, alias = "durationMinutes")]
    #[validate(range(min = 1, max = 600, message = "duration_minutes must be between 1 and 600"))]
    pub(crate) duration_minutes: Option<i32>,
    #[serde(default, alias = "shuffleQuestions")]
    pub(crate) shuffle_questions: Option<bool>,
    #[serde(default, alias = "shuffleOptions")]
    pub(crate) shuffle_options: Option<bool>,
    #[serde(default, alias = "negativeMarking")]
    pub(crate) negative_marking: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TestStatusUpdate {
    pub(crate) status: TestStatus,
}

/// Catalog entry shown to students.
#[derive(Debug, Serialize)]
pub(crate) struct TestSummaryResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) category_id: Option<String>,
    pub(crate) duration_minutes: i32,
    pub(crate) status: TestStatus,
    pub(crate) question_count: i64,
    pub(crate) published_at: Option<String>,
}

impl TestSummaryResponse {
    pub(crate) fn from_db(test: Test, question_count: i64) -> Self {
        Self {
            id: test.id,
            title: test.title,
            description: test.description,
            category_id: test.category_id,
            duration_minutes: test.duration_minutes,
            status: test.status,
            question_count,
            published_at: test.published_at.map(format_primitive),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AdminTestResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) category_id: Option<String>,
    pub(crate) duration_minutes: i32,
    pub(crate) status: TestStatus,
    pub(crate) shuffle_questions: bool,
    pub(crate) shuffle_options: bool,
    pub(crate) negative_marking: bool,
    pub(crate) question_count: i64,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
    pub(crate) published_at: Option<String>,
}

impl AdminTestResponse {
    pub(crate) fn from_db(test: Test, question_count: i64) -> Self {
        Self {
            id: test.id,
            title: test.title,
            description: test.description,
            category_id: test.category_id,
            duration_minutes: test.duration_minutes,
            status: test.status,
            shuffle_questions: test.shuffle_questions,
            shuffle_options: test.shuffle_options,
            negative_marking: test.negative_marking,
            question_count,
            created_by: test.created_by,
            created_at: format_primitive(test.created_at),
            updated_at: format_primitive(test.updated_at),
            published_at: test.published_at.map(format_primitive),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub(crate) struct OptionInput {
    #[validate(length(min = 1, max = 500, message = "option label must not be empty"))]
    pub(crate) label: String,
    #[serde(default, alias = "isCorrect")]
    pub(crate) is_correct: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_single_correct", skip_on_field_errors = false))]
pub(crate) struct QuestionSave {
    #[validate(length(min = 1, message = "text must not be empty"))]
    pub(crate) text: String,
    #[validate(range(exclusive_min = 0.0, message = "points must be positive"))]
    pub(crate) points: f64,
    #[serde(default, alias = "negativePoints")]
    #[validate(range(min = 0.0, message = "negative_points must be non-negative"))]
    pub(crate) negative_points: f64,
    #[serde(default, alias = "orderIndex")]
    #[validate(range(min = 0, message = "order_index must be non-negative"))]
    pub(crate) order_index: Option<i32>,
    #[validate(length(min = 2, max = 4, message = "between 2 and 4 options are required"), nested)]
    pub(crate) options: Vec<OptionInput>,
}

fn validate_single_correct(question: &QuestionSave) -> Result<(), ValidationError> {
    let correct = question.options.iter().filter(|option| option.is_correct).count();
    if correct == 1 {
        Ok(())
    } else {
        let mut error = ValidationError::new("single_correct");
        error.message = Some("exactly one option must be correct".into());
        Err(error)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AdminOptionResponse {
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) is_correct: bool,
    pub(crate) order_index: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct AdminQuestionResponse {
    pub(crate) id: String,
    pub(crate) test_id: String,
    pub(crate) text: String,
    pub(crate) points: f64,
    pub(crate) negative_points: f64,
    pub(crate) order_index: i32,
    pub(crate) options: Vec<AdminOptionResponse>,
}

impl AdminQuestionResponse {
    pub(crate) fn from_db(item: QuestionWithOptions) -> Self {
        Self {
            id: item.question.id,
            test_id: item.question.test_id,
            text: item.question.text,
            points: item.question.points,
            negative_points: item.question.negative_points,
            order_index: item.question.order_index,
            options: item
                .options
                .into_iter()
                .map(|option| AdminOptionResponse {
                    id: option.id,
                    label: option.label,
                    is_correct: option.is_correct,
                    order_index: option.order_index,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionImportResponse {
    pub(crate) imported: usize,
}

fn default_status() -> TestStatus {
    TestStatus::Draft
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: &[bool]) -> QuestionSave {
        QuestionSave {
            text: "Outline for 'because'".to_string(),
            points: 1.0,
            negative_points: 0.0,
            order_index: None,
            options: correct
                .iter()
                .enumerate()
                .map(|(index, is_correct)| OptionInput {
                    label: format!("option {index}"),
                    is_correct: *is_correct,
                })
                .collect(),
        }
    }

    #[test]
    fn exactly_one_correct_option_is_required() {
        assert!(question(&[true, false, false]).validate().is_ok());
        assert!(question(&[false, false]).validate().is_err());
        assert!(question(&[true, true]).validate().is_err());
    }

    #[test]
    fn option_count_is_bounded() {
        assert!(question(&[true]).validate().is_err());
        assert!(question(&[true, false, false, false, false]).validate().is_err());
    }
}
