use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repositories::questions::QuestionWithOptions;

pub(crate) const MAX_OPTIONS: usize = 4;
const LETTERS: [char; MAX_OPTIONS] = ['A', 'B', 'C', 'D'];

#[derive(Debug, Error)]
pub(crate) enum CsvError {
    #[error("row {row}: {message}")]
    Row { row: usize, message: String },
    #[error("csv is empty")]
    Empty,
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("csv output is not valid utf-8")]
    Encoding,
}

#[derive(Debug, Deserialize, Serialize)]
struct CsvQuestionRow {
    question: String,
    points: f64,
    negative_points: Option<f64>,
    option_a: Option<String>,
    option_b: Option<String>,
    option_c: Option<String>,
    option_d: Option<String>,
    correct: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedOption {
    pub(crate) label: String,
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedQuestion {
    pub(crate) text: String,
    pub(crate) points: f64,
    pub(crate) negative_points: f64,
    pub(crate) options: Vec<ParsedOption>,
}

/// Parses `question,points,negative_points,option_a..option_d,correct`. Blank option cells are
/// skipped; `correct` names the letter of a non-blank option. Row numbers count the header as 1.
pub(crate) fn parse_questions(input: &str) -> Result<Vec<ParsedQuestion>, CsvError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input.as_bytes());

    let mut parsed = Vec::new();
    for (index, record) in reader.deserialize::<CsvQuestionRow>().enumerate() {
        let row = index + 2;
        let record = record.map_err(|err| CsvError::Row { row, message: err.to_string() })?;
        parsed.push(parse_row(row, record)?);
    }

    if parsed.is_empty() {
        return Err(CsvError::Empty);
    }
    Ok(parsed)
}

fn parse_row(row: usize, record: CsvQuestionRow) -> Result<ParsedQuestion, CsvError> {
    let fail = |message: &str| CsvError::Row { row, message: message.to_string() };

    let text = record.question.trim().to_string();
    if text.is_empty() {
        return Err(fail("question text is empty"));
    }
    if !(record.points > 0.0) {
        return Err(fail("points must be positive"));
    }
    let negative_points = record.negative_points.unwrap_or(0.0);
    if negative_points < 0.0 {
        return Err(fail("negative_points must not be negative"));
    }

    let correct = record.correct.trim().to_uppercase();
    let mut chars = correct.chars();
    let (Some(letter), None) = (chars.next(), chars.next()) else {
        return Err(fail("correct must be a single letter A-D"));
    };
    let Some(correct_index) = LETTERS.iter().position(|candidate| *candidate == letter) else {
        return Err(fail("correct must be a single letter A-D"));
    };

    let cells = [record.option_a, record.option_b, record.option_c, record.option_d];
    let mut options = Vec::new();
    let mut has_correct = false;
    for (index, cell) in cells.into_iter().enumerate() {
        let Some(label) = cell.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
        else {
            continue;
        };
        let is_correct = index == correct_index;
        has_correct |= is_correct;
        options.push(ParsedOption { label, is_correct });
    }

    if options.len() < 2 {
        return Err(fail("at least two options are required"));
    }
    if !has_correct {
        return Err(fail("correct option cell is blank"));
    }

    Ok(ParsedQuestion { text, points: record.points, negative_points, options })
}

pub(crate) fn export_questions(questions: &[QuestionWithOptions]) -> Result<String, CsvError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for item in questions {
        let label = |index: usize| item.options.get(index).map(|option| option.label.clone());
        let correct = item
            .options
            .iter()
            .take(MAX_OPTIONS)
            .position(|option| option.is_correct)
            .map(|index| LETTERS[index].to_string())
            .unwrap_or_default();

        writer.serialize(CsvQuestionRow {
            question: item.question.text.clone(),
            points: item.question.points,
            negative_points: Some(item.question.negative_points),
            option_a: label(0),
            option_b: label(1),
            option_c: label(2),
            option_d: label(3),
            correct,
        })?;
    }

    if questions.is_empty() {
        writer.write_record([
            "question",
            "points",
            "negative_points",
            "option_a",
            "option_b",
            "option_c",
            "option_d",
            "correct",
        ])?;
    }

    let bytes = writer.into_inner().map_err(|err| CsvError::Csv(err.into_error().into()))?;
    String::from_utf8(bytes).map_err(|_| CsvError::Encoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::session::store::memory::fixtures;

    const HEADER: &str =
        "question,points,negative_points,option_a,option_b,option_c,option_d,correct";

    #[test]
    fn parses_rows_and_skips_blank_options() {
        let input = format!(
            "{HEADER}\n\
             \"Shorthand for 'the'?\",2,0.5,dot,dash,,tick,d\n\
             Second,1,,yes,no,,,A\n"
        );

        let parsed = parse_questions(&input).expect("parse");

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].text, "Shorthand for 'the'?");
        assert_eq!(parsed[0].points, 2.0);
        assert_eq!(parsed[0].negative_points, 0.5);
        assert_eq!(parsed[0].options.len(), 3);
        assert!(parsed[0].options[2].is_correct);
        assert_eq!(parsed[0].options[2].label, "tick");
        assert_eq!(parsed[1].negative_points, 0.0);
        assert!(parsed[1].options[0].is_correct);
    }

    #[test]
    fn reports_row_of_invalid_correct_letter() {
        let input = format!("{HEADER}\nOk,1,0,a,b,,,A\nBad,1,0,a,b,,,C\n");

        match parse_questions(&input) {
            Err(CsvError::Row { row, message }) => {
                assert_eq!(row, 3);
                assert!(message.contains("blank"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_non_positive_points_and_single_option() {
        let zero_points = format!("{HEADER}\nQ,0,0,a,b,,,A\n");
        assert!(matches!(parse_questions(&zero_points), Err(CsvError::Row { row: 2, .. })));

        let single = format!("{HEADER}\nQ,1,0,a,,,,A\n");
        assert!(matches!(parse_questions(&single), Err(CsvError::Row { row: 2, .. })));
    }

    #[test]
    fn header_only_is_empty() {
        assert!(matches!(parse_questions(&format!("{HEADER}\n")), Err(CsvError::Empty)));
    }

    #[test]
    fn export_can_be_imported_again() {
        let questions = vec![
            fixtures::question("t1", "q1", 0, 2.0, 1),
            fixtures::question("t1", "q2", 1, 1.0, 3),
        ];

        let exported = export_questions(&questions).expect("export");
        assert!(exported.starts_with(HEADER));

        let parsed = parse_questions(&exported).expect("reimport");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].text, "Question q1");
        assert!(parsed[0].options[1].is_correct);
        assert!(parsed[1].options[3].is_correct);
    }

    #[test]
    fn empty_export_still_has_header() {
        let exported = export_questions(&[]).expect("export");
        assert_eq!(exported.trim_end(), HEADER);
    }
}
