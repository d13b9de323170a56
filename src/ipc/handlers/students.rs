use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_optional_i64, get_optional_str, get_required_str, student_exists, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn student_json(
    id: &str,
    last_name: &str,
    first_name: &str,
    sort_order: i64,
    active: bool,
) -> serde_json::Value {
    json!({
        "id": id,
        "lastName": last_name,
        "firstName": first_name,
        "displayName": format!("{}, {}", last_name, first_name),
        "sortOrder": sort_order,
        "active": active
    })
}

fn students_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn.prepare(
        "SELECT id, last_name, first_name, sort_order, active
         FROM students
         ORDER BY sort_order, last_name, first_name",
    )?;
    let students: Vec<serde_json::Value> = stmt
        .query_map([], |r| {
            let id: String = r.get(0)?;
            let last: String = r.get(1)?;
            let first: String = r.get(2)?;
            let sort_order: i64 = r.get(3)?;
            let active: i64 = r.get(4)?;
            Ok(student_json(&id, &last, &first, sort_order, active != 0))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(json!({ "students": students }))
}

fn students_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let last_name = get_required_str(params, "lastName")?;
    let first_name = get_required_str(params, "firstName")?;
    if last_name.trim().is_empty() && first_name.trim().is_empty() {
        return Err(HandlerErr::bad_params("student name must not be empty"));
    }

    let sort_order = match get_optional_i64(params, "sortOrder")? {
        Some(v) => v,
        None => {
            let max: Option<i64> =
                conn.query_row("SELECT MAX(sort_order) FROM students", [], |r| r.get(0))?;
            max.unwrap_or(0) + 1
        }
    };

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, last_name, first_name, sort_order, active)
         VALUES(?, ?, ?, ?, 1)",
        (&id, last_name.trim(), first_name.trim(), sort_order),
    )?;
    Ok(json!({ "studentId": id }))
}

fn students_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    if !student_exists(conn, &student_id)? {
        return Err(HandlerErr::not_found("student not found"));
    }

    if let Some(last) = get_optional_str(params, "lastName")? {
        conn.execute(
            "UPDATE students SET last_name = ? WHERE id = ?",
            (last.trim(), &student_id),
        )?;
    }
    if let Some(first) = get_optional_str(params, "firstName")? {
        conn.execute(
            "UPDATE students SET first_name = ? WHERE id = ?",
            (first.trim(), &student_id),
        )?;
    }
    if let Some(sort_order) = get_optional_i64(params, "sortOrder")? {
        conn.execute(
            "UPDATE students SET sort_order = ? WHERE id = ?",
            (sort_order, &student_id),
        )?;
    }
    if let Some(active) = params.get("active").and_then(|v| v.as_bool()) {
        conn.execute(
            "UPDATE students SET active = ? WHERE id = ?",
            (active as i64, &student_id),
        )?;
    }
    Ok(json!({ "ok": true }))
}

fn students_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    if !student_exists(conn, &student_id)? {
        return Err(HandlerErr::not_found("student not found"));
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    tx.execute("DELETE FROM raw_marks WHERE student_id = ?", [&student_id])?;
    tx.execute("DELETE FROM attendance WHERE student_id = ?", [&student_id])?;
    tx.execute("DELETE FROM students WHERE id = ?", [&student_id])?;
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
        "students.list" => Some(dispatch(state, req, |c, _| students_list(c))),
        "students.create" => Some(dispatch(state, req, students_create)),
        "students.update" => Some(dispatch(state, req, students_update)),
        "students.delete" => Some(dispatch(state, req, students_delete)),
        _ => None,
    }
}
