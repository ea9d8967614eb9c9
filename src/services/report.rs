use std::fmt::Write as _;

use crate::core::time::format_primitive;
use crate::services::results::ResultSheet;

const STYLE: &str = "\
body{font-family:Georgia,serif;margin:2rem auto;max-width:48rem;color:#222}\
h1{font-size:1.6rem;margin-bottom:.2rem}\
table{border-collapse:collapse;width:100%;margin-top:1rem}\
th,td{border:1px solid #bbb;padding:.4rem .6rem;text-align:left;vertical-align:top}\
th{background:#f1f1f1}\
.correct{color:#1b6e20}.wrong{color:#a1201b}.blank{color:#777}\
.summary td{border:none;padding:.15rem .6rem .15rem 0}\
@media print{body{margin:0}}";

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Standalone printable page for one submitted attempt.
pub(crate) fn render_report(sheet: &ResultSheet, student_name: &str, project_name: &str) -> String {
    let mut html = String::with_capacity(4096 + sheet.questions.len() * 256);
    let title = escape_html(&sheet.test_title);

    let _ = write!(
        html,
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>{title} report</title><style>{STYLE}</style></head><body>\
         <h1>{title}</h1><p>{project}</p>\
         <table class=\"summary\">\
         <tr><td>Student</td><td>{student}</td></tr>\
         <tr><td>Submitted</td><td>{submitted}</td></tr>\
         <tr><td>Score</td><td>{total} / {max}</td></tr>\
         <tr><td>Percentage</td><td>{percentage:.2}%</td></tr>\
         <tr><td>Grade</td><td>{grade:?} ({verdict})</td></tr>\
         <tr><td>Correct / wrong / unanswered</td><td>{correct} / {wrong} / {blank}</td></tr>\
         </table>",
        project = escape_html(project_name),
        student = escape_html(student_name),
        submitted = format_primitive(sheet.submitted_at),
        total = format_points(sheet.total_score),
        max = format_points(sheet.max_score),
        percentage = sheet.percentage,
        grade = sheet.grade,
        verdict = if sheet.passed { "pass" } else { "fail" },
        correct = sheet.correct_count,
        wrong = sheet.wrong_count,
        blank = sheet.unanswered_count,
    );

    html.push_str(
        "<table><thead><tr><th>#</th><th>Question</th><th>Your answer</th>\
         <th>Correct answer</th><th>Score</th></tr></thead><tbody>",
    );

    for (index, outcome) in sheet.questions.iter().enumerate() {
        let (class, answer) = match (&outcome.chosen_label, outcome.is_correct) {
            (None, _) => ("blank", "Not answered".to_string()),
            (Some(label), true) => ("correct", escape_html(label)),
            (Some(label), false) => ("wrong", escape_html(label)),
        };
        let _ = write!(
            html,
            "<tr><td>{number}</td><td>{text}</td><td class=\"{class}\">{answer}</td>\
             <td>{correct}</td><td>{score} / {points}</td></tr>",
            number = index + 1,
            text = escape_html(&outcome.text),
            correct = outcome.correct_label.as_deref().map(escape_html).unwrap_or_default(),
            score = format_points(outcome.score),
            points = format_points(outcome.points),
        );
    }

    html.push_str("</tbody></table></body></html>");
    html
}

fn format_points(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}
