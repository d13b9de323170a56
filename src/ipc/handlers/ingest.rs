use crate::engine::ingest;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_optional_str, get_required_str, lesson_exists, test_exists, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

/// Create a test and its question set in one shot. The extraction collaborator
/// runs upstream; we receive its text (or its failure) and let the ingestion
/// policy decide between parsed questions and the sample fallback.
fn tests_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let lesson_id = get_required_str(params, "lessonId")?;
    let title = get_required_str(params, "title")?;
    let kind = get_required_str(params, "kind")?;
    if title.trim().is_empty() {
        return Err(HandlerErr::bad_params("test title must not be empty"));
    }
    if kind != "pretest" && kind != "posttest" {
        return Err(HandlerErr::bad_params(
            "kind must be 'pretest' or 'posttest'",
        ));
    }
    if !lesson_exists(conn, &lesson_id)? {
        return Err(HandlerErr::not_found("lesson not found"));
    }

    let extracted_text = match get_optional_str(params, "extractionError")? {
        Some(reason) => {
            // Extraction failure is a warning, never fatal: proceed textless.
            tracing::warn!(title = %title, %reason, "document extraction failed, using fallback");
            None
        }
        None => get_optional_str(params, "extractedText")?,
    };

    let outcome = ingest::ingest(extracted_text.as_deref(), title.trim(), &kind);
    if outcome.used_fallback {
        tracing::warn!(title = %title, "no questions parsed, sample questions generated");
    }

    let test_id = Uuid::new_v4().to_string();
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    tx.execute(
        "INSERT INTO tests(id, lesson_id, title, kind) VALUES(?, ?, ?, ?)",
        (&test_id, &lesson_id, title.trim(), &kind),
    )?;
    for draft in &outcome.questions {
        tx.execute(
            "INSERT INTO questions(id, test_id, question_text, total_marks, question_order)
             VALUES(?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                &test_id,
                &draft.question_text,
                draft.total_marks,
                draft.question_order,
            ),
        )?;
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    Ok(json!({
        "testId": test_id,
        "questionCount": outcome.questions.len(),
        "totalMarks": outcome.total_marks,
        "usedFallback": outcome.used_fallback
    }))
}

fn tests_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let lesson_id = get_required_str(params, "lessonId")?;
    if !lesson_exists(conn, &lesson_id)? {
        return Err(HandlerErr::not_found("lesson not found"));
    }
    let mut stmt = conn.prepare(
        "SELECT t.id, t.title, t.kind,
                (SELECT COUNT(*) FROM questions q WHERE q.test_id = t.id),
                (SELECT COALESCE(SUM(q.total_marks), 0) FROM questions q WHERE q.test_id = t.id)
         FROM tests t
         WHERE t.lesson_id = ?
         ORDER BY t.kind DESC, t.title",
    )?;
    let tests: Vec<serde_json::Value> = stmt
        .query_map([&lesson_id], |r| {
            let id: String = r.get(0)?;
            let title: String = r.get(1)?;
            let kind: String = r.get(2)?;
            let question_count: i64 = r.get(3)?;
            let total_marks: i64 = r.get(4)?;
            Ok(json!({
                "id": id,
                "title": title,
                "kind": kind,
                "questionCount": question_count,
                "totalMarks": total_marks
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(json!({ "tests": tests }))
}

fn tests_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let test_id = get_required_str(params, "testId")?;
    if !test_exists(conn, &test_id)? {
        return Err(HandlerErr::not_found("test not found"));
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    tx.execute(
        "DELETE FROM raw_marks WHERE question_id IN (SELECT id FROM questions WHERE test_id = ?)",
        [&test_id],
    )?;
    tx.execute("DELETE FROM questions WHERE test_id = ?", [&test_id])?;
    tx.execute("DELETE FROM tests WHERE id = ?", [&test_id])?;
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;
    Ok(json!({ "ok": true }))
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
        "tests.create" => Some(dispatch(state, req, tests_create)),
        "tests.list" => Some(dispatch(state, req, tests_list)),
        "tests.delete" => Some(dispatch(state, req, tests_delete)),
        _ => None,
    }
}
