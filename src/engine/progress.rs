use super::scoring::StudentTestScore;
use serde::Serialize;

/// One student's pre/post picture for one lesson. Improvement exists only
/// when both scores do; absence is not the same thing as "no change".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    pub lesson_id: String,
    pub lesson_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretest: Option<StudentTestScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posttest: Option<StudentTestScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improvement: Option<i64>,
}

pub fn lesson_progress(
    lesson_id: &str,
    lesson_title: &str,
    pretest: Option<StudentTestScore>,
    posttest: Option<StudentTestScore>,
) -> LessonProgress {
    let improvement = match (&pretest, &posttest) {
        (Some(pre), Some(post)) => Some(post.percentage - pre.percentage),
        _ => None,
    };
    LessonProgress {
        lesson_id: lesson_id.to_string(),
        lesson_title: lesson_title.to_string(),
        pretest,
        posttest,
        improvement,
    }
}

/// Roll a student's lessons up to one figure: per lesson, the mean of
/// whichever percentages exist; lessons with neither score contribute
/// nothing (not a zero). Rounded once, at the end.
pub fn overall_average(lessons: &[LessonProgress]) -> i64 {
    let per_lesson: Vec<f64> = lessons
        .iter()
        .filter_map(|lp| {
            let percents: Vec<f64> = [lp.pretest.as_ref(), lp.posttest.as_ref()]
                .into_iter()
                .flatten()
                .map(|s| s.percentage as f64)
                .collect();
            if percents.is_empty() {
                None
            } else {
                Some(percents.iter().sum::<f64>() / percents.len() as f64)
            }
        })
        .collect();

    if per_lesson.is_empty() {
        return 0;
    }
    (per_lesson.iter().sum::<f64>() / per_lesson.len() as f64).round() as i64
}
