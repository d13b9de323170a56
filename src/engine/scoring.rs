use super::round_percent;
use serde::Serialize;
use std::collections::HashMap;

/// The slice of a persisted question the aggregator needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedQuestion {
    pub question_id: String,
    pub total_marks: i64,
}

/// One student's aggregate over one test. Derived on demand, never cached here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentTestScore {
    pub total_scored: i64,
    pub total_possible: i64,
    pub percentage: i64,
}

/// Sum a student's raw marks across a test's questions. A question with no
/// mark entry counts as scored 0 (not ungraded); an empty question list yields
/// an all-zero score rather than failing.
pub fn aggregate(
    questions: &[GradedQuestion],
    marks_by_question: &HashMap<String, i64>,
) -> StudentTestScore {
    let total_possible: i64 = questions.iter().map(|q| q.total_marks).sum();
    let total_scored: i64 = questions
        .iter()
        .map(|q| marks_by_question.get(&q.question_id).copied().unwrap_or(0))
        .sum();
    StudentTestScore {
        total_scored,
        total_possible,
        percentage: round_percent(total_scored as f64, total_possible as f64),
    }
}
