use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_optional_i64, get_optional_str, get_required_str, lesson_exists, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn lessons_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn.prepare(
        "SELECT l.id, l.title, l.sort_order,
                (SELECT COUNT(*) FROM tests t WHERE t.lesson_id = l.id)
         FROM lessons l
         ORDER BY l.sort_order, l.title",
    )?;
    let lessons: Vec<serde_json::Value> = stmt
        .query_map([], |r| {
            let id: String = r.get(0)?;
            let title: String = r.get(1)?;
            let sort_order: i64 = r.get(2)?;
            let test_count: i64 = r.get(3)?;
            Ok(json!({
                "id": id,
                "title": title,
                "sortOrder": sort_order,
                "testCount": test_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(json!({ "lessons": lessons }))
}

fn lessons_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let title = get_required_str(params, "title")?;
    if title.trim().is_empty() {
        return Err(HandlerErr::bad_params("lesson title must not be empty"));
    }
    let sort_order = match get_optional_i64(params, "sortOrder")? {
        Some(v) => v,
        None => {
            let max: Option<i64> =
                conn.query_row("SELECT MAX(sort_order) FROM lessons", [], |r| r.get(0))?;
            max.unwrap_or(0) + 1
        }
    };

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO lessons(id, title, sort_order) VALUES(?, ?, ?)",
        (&id, title.trim(), sort_order),
    )?;
    Ok(json!({ "lessonId": id }))
}

fn lessons_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let lesson_id = get_required_str(params, "lessonId")?;
    if !lesson_exists(conn, &lesson_id)? {
        return Err(HandlerErr::not_found("lesson not found"));
    }
    if let Some(title) = get_optional_str(params, "title")? {
        if title.trim().is_empty() {
            return Err(HandlerErr::bad_params("lesson title must not be empty"));
        }
        conn.execute(
            "UPDATE lessons SET title = ? WHERE id = ?",
            (title.trim(), &lesson_id),
        )?;
    }
    if let Some(sort_order) = get_optional_i64(params, "sortOrder")? {
        conn.execute(
            "UPDATE lessons SET sort_order = ? WHERE id = ?",
            (sort_order, &lesson_id),
        )?;
    }
    Ok(json!({ "ok": true }))
}

fn lessons_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let lesson_id = get_required_str(params, "lessonId")?;
    if !lesson_exists(conn, &lesson_id)? {
        return Err(HandlerErr::not_found("lesson not found"));
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    tx.execute(
        "DELETE FROM raw_marks WHERE question_id IN (
             SELECT q.id FROM questions q
             JOIN tests t ON t.id = q.test_id
             WHERE t.lesson_id = ?
         )",
        [&lesson_id],
    )?;
    tx.execute(
        "DELETE FROM questions WHERE test_id IN (SELECT id FROM tests WHERE lesson_id = ?)",
        [&lesson_id],
    )?;
    tx.execute("DELETE FROM tests WHERE lesson_id = ?", [&lesson_id])?;
    tx.execute("DELETE FROM lessons WHERE id = ?", [&lesson_id])?;
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
        "lessons.list" => Some(dispatch(state, req, |c, _| lessons_list(c))),
        "lessons.create" => Some(dispatch(state, req, lessons_create)),
        "lessons.update" => Some(dispatch(state, req, lessons_update)),
        "lessons.delete" => Some(dispatch(state, req, lessons_delete)),
        _ => None,
    }
}
