use crate::db::repack_question_order;
use crate::engine::parser::MARKS_RANGE;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_optional_i64, get_optional_str, get_required_i64, get_required_str, test_exists, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn validate_total_marks(total_marks: i64) -> Result<(), HandlerErr> {
    if MARKS_RANGE.contains(&total_marks) {
        Ok(())
    } else {
        // Out-of-range marks are rejected outright, never clamped.
        Err(HandlerErr::bad_params(format!(
            "totalMarks must be between {} and {}",
            MARKS_RANGE.start(),
            MARKS_RANGE.end()
        )))
    }
}

fn question_test_id(conn: &Connection, question_id: &str) -> Result<String, HandlerErr> {
    conn.query_row(
        "SELECT test_id FROM questions WHERE id = ?",
        [question_id],
        |r| r.get(0),
    )
    .optional()?
    .ok_or_else(|| HandlerErr::not_found("question not found"))
}

fn questions_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let test_id = get_required_str(params, "testId")?;
    if !test_exists(conn, &test_id)? {
        return Err(HandlerErr::not_found("test not found"));
    }
    let mut stmt = conn.prepare(
        "SELECT id, question_text, total_marks, question_order
         FROM questions
         WHERE test_id = ?
         ORDER BY question_order",
    )?;
    let questions: Vec<serde_json::Value> = stmt
        .query_map([&test_id], |r| {
            let id: String = r.get(0)?;
            let text: String = r.get(1)?;
            let total_marks: i64 = r.get(2)?;
            let order: i64 = r.get(3)?;
            Ok(json!({
                "id": id,
                "questionText": text,
                "totalMarks": total_marks,
                "questionOrder": order
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(json!({ "questions": questions }))
}

fn questions_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let test_id = get_required_str(params, "testId")?;
    let question_text = get_required_str(params, "questionText")?;
    let total_marks = get_required_i64(params, "totalMarks")?;
    if question_text.trim().is_empty() {
        return Err(HandlerErr::bad_params("questionText must not be empty"));
    }
    validate_total_marks(total_marks)?;
    if !test_exists(conn, &test_id)? {
        return Err(HandlerErr::not_found("test not found"));
    }

    // Appending at MAX+1 keeps the order sequence dense without a repack.
    let next_order: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(question_order), 0) + 1 FROM questions WHERE test_id = ?",
            [&test_id],
            |r| r.get(0),
        )?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO questions(id, test_id, question_text, total_marks, question_order)
         VALUES(?, ?, ?, ?, ?)",
        (
            &id,
            &test_id,
            question_text.trim(),
            total_marks,
            next_order,
        ),
    )?;
    Ok(json!({ "questionId": id, "questionOrder": next_order }))
}

fn questions_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let question_id = get_required_str(params, "questionId")?;
    let _ = question_test_id(conn, &question_id)?;

    if let Some(text) = get_optional_str(params, "questionText")? {
        if text.trim().is_empty() {
            return Err(HandlerErr::bad_params("questionText must not be empty"));
        }
        conn.execute(
            "UPDATE questions SET question_text = ? WHERE id = ?",
            (text.trim(), &question_id),
        )?;
    }
    if let Some(total_marks) = get_optional_i64(params, "totalMarks")? {
        validate_total_marks(total_marks)?;
        conn.execute(
            "UPDATE questions SET total_marks = ? WHERE id = ?",
            (total_marks, &question_id),
        )?;
    }
    Ok(json!({ "ok": true }))
}

fn questions_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let question_id = get_required_str(params, "questionId")?;
    let test_id = question_test_id(conn, &question_id)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    tx.execute("DELETE FROM raw_marks WHERE question_id = ?", [&question_id])?;
    tx.execute("DELETE FROM questions WHERE id = ?", [&question_id])?;
    repack_question_order(&tx, &test_id)?;
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
        "questions.list" => Some(dispatch(state, req, questions_list)),
        "questions.create" => Some(dispatch(state, req, questions_create)),
        "questions.update" => Some(dispatch(state, req, questions_update)),
        "questions.delete" => Some(dispatch(state, req, questions_delete)),
        _ => None,
    }
}
