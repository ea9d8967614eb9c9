use serde::{Deserialize, Serialize};

use crate::services::session::cache::AnswerCache;
use crate::services::session::store::QuestionWithOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct GradedAnswer {
    pub(crate) question_id: String,
    pub(crate) chosen_option_id: String,
    pub(crate) is_correct: bool,
    pub(crate) score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Grading {
    pub(crate) answers: Vec<GradedAnswer>,
    pub(crate) total_score: f64,
    pub(crate) max_score: f64,
}

/// Correct choice earns the question's points, anything else earns zero. Negative marking
/// flags on the test are not consulted. Unanswered questions produce no answer.
pub(crate) fn grade(questions: &[QuestionWithOptions], cache: &AnswerCache) -> Grading {
    let mut answers = Vec::new();
    let mut total_score = 0.0;
    let mut max_score = 0.0;

    for item in questions {
        max_score += item.question.points;

        let Some(chosen) = cache.chosen(&item.question.id) else {
            continue;
        };
        let Some(option) = item.option(chosen) else {
            continue;
        };

        let score = if option.is_correct { item.question.points } else { 0.0 };
        total_score += score;
        answers.push(GradedAnswer {
            question_id: item.question.id.clone(),
            chosen_option_id: option.id.clone(),
            is_correct: option.is_correct,
            score,
        });
    }

    Grading { answers, total_score, max_score }
}

pub(crate) fn percentage(total_score: f64, max_score: f64) -> f64 {
    if max_score <= 0.0 {
        return 0.0;
    }
    ((total_score / max_score) * 10_000.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

/// Bands above the pass mark split evenly into D..A; below it is F.
pub(crate) fn letter_grade(percentage: f64, pass_percentage: f64) -> LetterGrade {
    if percentage < pass_percentage {
        return LetterGrade::F;
    }
    let band = (100.0 - pass_percentage) / 4.0;
    if percentage >= pass_percentage + band * 3.0 {
        LetterGrade::A
    } else if percentage >= pass_percentage + band * 2.0 {
        LetterGrade::B
    } else if percentage >= pass_percentage + band {
        LetterGrade::C
    } else {
        LetterGrade::D
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::session::store::memory::fixtures;

    #[test]
    fn right_wrong_and_blank_questions() {
        let questions = vec![
            fixtures::question("t1", "q1", 0, 1.0, 0),
            fixtures::question("t1", "q2", 1, 1.0, 0),
            fixtures::question("t1", "q3", 2, 1.0, 0),
        ];
        let mut cache = AnswerCache::new(["q1", "q2", "q3"]);
        cache.set("q1", Some("q1-o0".into()));
        cache.set("q2", Some("q2-o1".into()));

        let grading = grade(&questions, &cache);

        assert_eq!(grading.total_score, 1.0);
        assert_eq!(grading.max_score, 3.0);
        assert_eq!(grading.answers.len(), 2);
        assert!(grading.answers[0].is_correct);
        assert_eq!(grading.answers[0].score, 1.0);
        assert!(!grading.answers[1].is_correct);
        assert_eq!(grading.answers[1].score, 0.0);
    }

    #[test]
    fn points_are_weighted_and_negative_points_ignored() {
        let mut weighted = fixtures::question("t1", "q1", 0, 4.0, 2);
        weighted.question.negative_points = 1.0;
        let mut penalised = fixtures::question("t1", "q2", 1, 2.0, 0);
        penalised.question.negative_points = 1.0;
        let questions = vec![weighted, penalised];

        let mut cache = AnswerCache::new(["q1", "q2"]);
        cache.set("q1", Some("q1-o2".into()));
        cache.set("q2", Some("q2-o3".into()));

        let grading = grade(&questions, &cache);

        assert_eq!(grading.total_score, 4.0);
        assert_eq!(grading.max_score, 6.0);
        assert_eq!(grading.answers[1].score, 0.0);
    }

    #[test]
    fn foreign_option_ids_are_not_graded() {
        let questions = vec![fixtures::question("t1", "q1", 0, 1.0, 0)];
        let mut cache = AnswerCache::new(["q1"]);
        cache.set("q1", Some("q2-o0".into()));

        let grading = grade(&questions, &cache);

        assert!(grading.answers.is_empty());
        assert_eq!(grading.total_score, 0.0);
    }

    #[test]
    fn percentage_handles_empty_tests() {
        assert_eq!(percentage(1.0, 3.0), 33.33);
        assert_eq!(percentage(0.0, 0.0), 0.0);
    }

    #[test]
    fn letter_grades_follow_pass_mark() {
        assert_eq!(letter_grade(39.9, 40.0), LetterGrade::F);
        assert_eq!(letter_grade(40.0, 40.0), LetterGrade::D);
        assert_eq!(letter_grade(55.0, 40.0), LetterGrade::C);
        assert_eq!(letter_grade(70.0, 40.0), LetterGrade::B);
        assert_eq!(letter_grade(85.0, 40.0), LetterGrade::A);
        assert_eq!(letter_grade(100.0, 40.0), LetterGrade::A);
    }
}
