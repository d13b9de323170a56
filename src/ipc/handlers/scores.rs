use crate::engine::progress::{self, LessonProgress};
use crate::engine::scoring::{self, GradedQuestion, StudentTestScore};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_required_i64, get_required_str, lesson_exists, student_exists, test_exists, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;

fn load_graded_questions(
    conn: &Connection,
    test_id: &str,
) -> Result<Vec<GradedQuestion>, HandlerErr> {
    let mut stmt = conn.prepare(
        "SELECT id, total_marks FROM questions WHERE test_id = ? ORDER BY question_order",
    )?;
    let questions = stmt
        .query_map([test_id], |r| {
            Ok(GradedQuestion {
                question_id: r.get(0)?,
                total_marks: r.get(1)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(questions)
}

fn load_marks(
    conn: &Connection,
    student_id: &str,
    test_id: &str,
) -> Result<HashMap<String, i64>, HandlerErr> {
    let mut stmt = conn.prepare(
        "SELECT rm.question_id, rm.scored
         FROM raw_marks rm
         JOIN questions q ON q.id = rm.question_id
         WHERE rm.student_id = ? AND q.test_id = ?",
    )?;
    let rows = stmt
        .query_map((student_id, test_id), |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows.into_iter().collect())
}

/// A score exists for a test only once the student has at least one graded
/// question on it. Within a graded test, ungraded questions still count as 0
/// (the aggregator's policy); an untaken test is absent, not zero.
fn test_score_if_graded(
    conn: &Connection,
    student_id: &str,
    test_id: &str,
) -> Result<Option<StudentTestScore>, HandlerErr> {
    let marks = load_marks(conn, student_id, test_id)?;
    if marks.is_empty() {
        return Ok(None);
    }
    let questions = load_graded_questions(conn, test_id)?;
    Ok(Some(scoring::aggregate(&questions, &marks)))
}

fn find_lesson_test(
    conn: &Connection,
    lesson_id: &str,
    kind: &str,
) -> Result<Option<String>, HandlerErr> {
    Ok(conn
        .query_row(
            "SELECT id FROM tests WHERE lesson_id = ? AND kind = ? ORDER BY title, id LIMIT 1",
            (lesson_id, kind),
            |r| r.get(0),
        )
        .optional()?)
}

fn lesson_progress_for(
    conn: &Connection,
    student_id: &str,
    lesson_id: &str,
    lesson_title: &str,
) -> Result<LessonProgress, HandlerErr> {
    let pretest = match find_lesson_test(conn, lesson_id, "pretest")? {
        Some(test_id) => test_score_if_graded(conn, student_id, &test_id)?,
        None => None,
    };
    let posttest = match find_lesson_test(conn, lesson_id, "posttest")? {
        Some(test_id) => test_score_if_graded(conn, student_id, &test_id)?,
        None => None,
    };
    Ok(progress::lesson_progress(
        lesson_id,
        lesson_title,
        pretest,
        posttest,
    ))
}

fn scores_set(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let question_id = get_required_str(params, "questionId")?;
    let scored = get_required_i64(params, "scored")?;

    if !student_exists(conn, &student_id)? {
        return Err(HandlerErr::not_found("student not found"));
    }
    let total_marks: Option<i64> = conn
        .query_row(
            "SELECT total_marks FROM questions WHERE id = ?",
            [&question_id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(total_marks) = total_marks else {
        return Err(HandlerErr::not_found("question not found"));
    };
    // [0, total_marks] is a hard boundary; invalid values are rejected,
    // never clamped.
    if scored < 0 || scored > total_marks {
        return Err(HandlerErr::bad_params(format!(
            "scored must be between 0 and {}",
            total_marks
        )));
    }

    conn.execute(
        "INSERT INTO raw_marks(student_id, question_id, scored)
         VALUES(?, ?, ?)
         ON CONFLICT(student_id, question_id) DO UPDATE SET
           scored = excluded.scored",
        (&student_id, &question_id, scored),
    )?;
    Ok(json!({ "ok": true }))
}

fn scores_test_score(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let test_id = get_required_str(params, "testId")?;
    if !student_exists(conn, &student_id)? {
        return Err(HandlerErr::not_found("student not found"));
    }
    if !test_exists(conn, &test_id)? {
        return Err(HandlerErr::not_found("test not found"));
    }

    let questions = load_graded_questions(conn, &test_id)?;
    let marks = load_marks(conn, &student_id, &test_id)?;
    let score = scoring::aggregate(&questions, &marks);
    Ok(json!({ "score": score }))
}

fn scores_lesson_progress(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let lesson_id = get_required_str(params, "lessonId")?;
    if !student_exists(conn, &student_id)? {
        return Err(HandlerErr::not_found("student not found"));
    }
    let lesson_title: Option<String> = conn
        .query_row("SELECT title FROM lessons WHERE id = ?", [&lesson_id], |r| {
            r.get(0)
        })
        .optional()?;
    let Some(lesson_title) = lesson_title else {
        return Err(HandlerErr::not_found("lesson not found"));
    };

    let lp = lesson_progress_for(conn, &student_id, &lesson_id, &lesson_title)?;
    Ok(json!({ "progress": lp }))
}

fn scores_student_overview(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    if !student_exists(conn, &student_id)? {
        return Err(HandlerErr::not_found("student not found"));
    }

    let mut stmt =
        conn.prepare("SELECT id, title FROM lessons ORDER BY sort_order, title")?;
    let lessons: Vec<(String, String)> = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    let mut per_lesson: Vec<LessonProgress> = Vec::with_capacity(lessons.len());
    for (lesson_id, lesson_title) in &lessons {
        per_lesson.push(lesson_progress_for(conn, &student_id, lesson_id, lesson_title)?);
    }
    let overall = progress::overall_average(&per_lesson);

    Ok(json!({
        "lessons": per_lesson,
        "overallAverage": overall
    }))
}

fn dispatch(
    state: &mut AppState,
    req: &Request,
    f: fn(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scores.set" => Some(dispatch(state, req, scores_set)),
        "scores.testScore" => Some(dispatch(state, req, scores_test_score)),
        "scores.lessonProgress" => Some(dispatch(state, req, scores_lesson_progress)),
        "scores.studentOverview" => Some(dispatch(state, req, scores_student_overview)),
        _ => None,
    }
}
