use super::parser::{self, ParsedQuestion, DEFAULT_MARKS};
use super::sample;

/// Question record shaped for persistence: text, marks, and a dense 1-based
/// position within the test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionDraft {
    pub question_text: String,
    pub total_marks: i64,
    pub question_order: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub questions: Vec<QuestionDraft>,
    pub total_marks: i64,
    pub used_fallback: bool,
}

/// Decide the final question set for a test. Parse when text is available,
/// fall back to the sample generator otherwise, and floor at one minimal
/// question so a test is never persisted empty.
pub fn ingest(extracted_text: Option<&str>, test_title: &str, test_kind: &str) -> IngestOutcome {
    let (mut parsed, mut used_fallback) = match extracted_text {
        Some(text) => {
            let questions = parser::parse(text);
            if questions.is_empty() {
                (sample::generate(test_title, test_kind), true)
            } else {
                (questions, false)
            }
        }
        None => (sample::generate(test_title, test_kind), true),
    };

    if parsed.is_empty() {
        used_fallback = true;
        parsed.push(ParsedQuestion {
            text: format!(
                "Question 1 for {}. Please edit this to match your actual test content.",
                test_title
            ),
            marks: DEFAULT_MARKS,
        });
    }

    // Order is assigned here, once, over the final list.
    let questions: Vec<QuestionDraft> = parsed
        .into_iter()
        .enumerate()
        .map(|(i, q)| QuestionDraft {
            question_text: q.text,
            total_marks: q.marks,
            question_order: (i + 1) as i64,
        })
        .collect();
    let total_marks = questions.iter().map(|q| q.total_marks).sum();

    IngestOutcome {
        questions,
        total_marks,
        used_fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::sample::is_placeholder;

    #[test]
    fn parsed_text_is_accepted_without_fallback() {
        let outcome = ingest(
            Some("1. What is 2+2? [2 marks]\n2. Name a prime. (1 mark)"),
            "Arithmetic Quiz",
            "pretest",
        );
        assert!(!outcome.used_fallback);
        assert_eq!(outcome.questions.len(), 2);
        assert_eq!(outcome.total_marks, 3);
        let orders: Vec<i64> = outcome.questions.iter().map(|q| q.question_order).collect();
        assert_eq!(orders, vec![1, 2]);
    }

    #[test]
    fn absent_text_falls_back_to_one_placeholder() {
        let outcome = ingest(None, "Quiz A", "pretest");
        assert!(outcome.used_fallback);
        assert_eq!(outcome.questions.len(), 1);
        assert_eq!(outcome.questions[0].total_marks, 1);
        assert_eq!(outcome.questions[0].question_order, 1);
        assert_eq!(outcome.total_marks, 1);
        assert!(is_placeholder(&outcome.questions[0].question_text));
    }

    #[test]
    fn unparseable_text_falls_back() {
        let outcome = ingest(Some("   \n\n"), "Quiz B", "posttest");
        assert!(outcome.used_fallback);
        assert_eq!(outcome.questions.len(), 1);
    }

    #[test]
    fn ingest_is_idempotent() {
        let a = ingest(Some("1. Alpha [3 marks]"), "T", "pretest");
        let b = ingest(Some("1. Alpha [3 marks]"), "T", "pretest");
        assert_eq!(a, b);
    }
}
