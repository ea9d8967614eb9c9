use serde::{Deserialize, Serialize};

use crate::services::scoring::percentage;
use crate::services::session::controller::{
    Navigation, SessionController, SessionPhase, SubmitOutcome, SubmitTrigger,
};
use crate::schemas::format_primitive;

/// Options as students see them: no correctness flags.
#[derive(Debug, Serialize)]
pub(crate) struct SessionOption {
    pub(crate) id: String,
    pub(crate) label: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionQuestion {
    pub(crate) id: String,
    pub(crate) text: String,
    pub(crate) points: f64,
    pub(crate) options: Vec<SessionOption>,
    pub(crate) chosen_option_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionResponse {
    pub(crate) attempt_id: String,
    pub(crate) test_id: String,
    pub(crate) test_title: String,
    pub(crate) duration_minutes: i32,
    pub(crate) phase: SessionPhase,
    pub(crate) cursor: usize,
    pub(crate) total_questions: usize,
    pub(crate) answered_count: usize,
    pub(crate) remaining_seconds: u32,
    pub(crate) resumed: bool,
    pub(crate) is_demo: bool,
    pub(crate) questions: Vec<SessionQuestion>,
}

impl SessionResponse {
    pub(crate) fn from_controller(controller: &SessionController) -> Self {
        let snapshot = controller.snapshot();
        let chosen = |question_id: &str| {
            snapshot
                .answers
                .iter()
                .find(|entry| entry.question_id == question_id)
                .and_then(|entry| entry.chosen_option_id.clone())
        };

        let questions = controller
            .questions()
            .iter()
            .map(|item| SessionQuestion {
                id: item.question.id.clone(),
                text: item.question.text.clone(),
                points: item.question.points,
                options: item
                    .options
                    .iter()
                    .map(|option| SessionOption { id: option.id.clone(), label: option.label.clone() })
                    .collect(),
                chosen_option_id: chosen(&item.question.id),
            })
            .collect();

        Self {
            attempt_id: snapshot.attempt_id,
            test_id: snapshot.test_id,
            test_title: controller.test().title.clone(),
            duration_minutes: controller.test().duration_minutes,
            phase: snapshot.phase,
            cursor: snapshot.cursor,
            total_questions: snapshot.total_questions,
            answered_count: snapshot.answered_count,
            remaining_seconds: snapshot.remaining_seconds,
            resumed: snapshot.resumed,
            is_demo: controller.identity().is_demo(),
            questions,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SelectAnswerRequest {
    #[serde(default, alias = "optionId")]
    pub(crate) option_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerResponse {
    pub(crate) question_id: String,
    pub(crate) chosen_option_id: Option<String>,
    pub(crate) answered_count: usize,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum NavigateDirection {
    Next,
    Previous,
}

/// Either an absolute `index` or a relative `direction`.
#[derive(Debug, Deserialize)]
pub(crate) struct NavigateRequest {
    #[serde(default)]
    pub(crate) index: Option<usize>,
    #[serde(default)]
    pub(crate) direction: Option<NavigateDirection>,
}

impl NavigateRequest {
    pub(crate) fn navigation(&self) -> Option<Navigation> {
        match (self.index, self.direction) {
            (Some(index), None) => Some(Navigation::To(index)),
            (None, Some(NavigateDirection::Next)) => Some(Navigation::Next),
            (None, Some(NavigateDirection::Previous)) => Some(Navigation::Previous),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct NavigateResponse {
    pub(crate) cursor: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct DraftResponse {
    pub(crate) saved: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SubmitStatus {
    Submitted,
    AlreadySubmitted,
    InFlight,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitResponse {
    pub(crate) status: SubmitStatus,
    pub(crate) attempt_id: String,
    pub(crate) trigger: Option<SubmitTrigger>,
    pub(crate) total_score: Option<f64>,
    pub(crate) max_score: Option<f64>,
    pub(crate) percentage: Option<f64>,
    pub(crate) submitted_at: Option<String>,
    pub(crate) results_url: Option<String>,
}

impl SubmitResponse {
    pub(crate) fn from_outcome(attempt_id: &str, outcome: SubmitOutcome, api_prefix: &str) -> Self {
        let results_url = |attempt_id: &str| Some(format!("{api_prefix}/results/{attempt_id}"));
        match outcome {
            SubmitOutcome::Submitted(receipt) => Self {
                status: SubmitStatus::Submitted,
                results_url: results_url(&receipt.attempt_id),
                trigger: Some(receipt.trigger),
                total_score: Some(receipt.total_score),
                max_score: Some(receipt.max_score),
                percentage: Some(percentage(receipt.total_score, receipt.max_score)),
                submitted_at: Some(format_primitive(receipt.submitted_at)),
                attempt_id: receipt.attempt_id,
            },
            SubmitOutcome::AlreadySubmitted { attempt_id } => Self {
                status: SubmitStatus::AlreadySubmitted,
                results_url: results_url(&attempt_id),
                attempt_id,
                trigger: None,
                total_score: None,
                max_score: None,
                percentage: None,
                submitted_at: None,
            },
            SubmitOutcome::InFlight => Self {
                status: SubmitStatus::InFlight,
                attempt_id: attempt_id.to_string(),
                trigger: None,
                total_score: None,
                max_score: None,
                percentage: None,
                submitted_at: None,
                results_url: None,
            },
        }
    }
}
