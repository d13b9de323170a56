use crate::engine::attendance::{self, AttendanceStatus};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_optional_str, get_required_str, student_exists, HandlerErr};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;

fn parse_date(raw: &str, key: &str) -> Result<String, HandlerErr> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

fn parse_status(raw: &str) -> Result<AttendanceStatus, HandlerErr> {
    AttendanceStatus::parse(raw)
        .ok_or_else(|| HandlerErr::bad_params("status must be present, absent, or late"))
}

fn attendance_mark(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let date = parse_date(&get_required_str(params, "date")?, "date")?;
    let status = parse_status(&get_required_str(params, "status")?)?;

    if !student_exists(conn, &student_id)? {
        return Err(HandlerErr::not_found("student not found"));
    }

    conn.execute(
        "INSERT INTO attendance(student_id, date, status)
         VALUES(?, ?, ?)
         ON CONFLICT(student_id, date) DO UPDATE SET
           status = excluded.status",
        (&student_id, &date, status.as_str()),
    )?;
    Ok(json!({ "ok": true }))
}

fn attendance_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    if !student_exists(conn, &student_id)? {
        return Err(HandlerErr::not_found("student not found"));
    }

    let mut stmt = conn
        .prepare("SELECT date, status FROM attendance WHERE student_id = ? ORDER BY date")?;
    let records: Vec<serde_json::Value> = stmt
        .query_map([&student_id], |r| {
            let date: String = r.get(0)?;
            let status: String = r.get(1)?;
            Ok(json!({ "date": date, "status": status }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(json!({ "records": records }))
}

fn attendance_stats(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    if !student_exists(conn, &student_id)? {
        return Err(HandlerErr::not_found("student not found"));
    }
    let from = match get_optional_str(params, "from")? {
        Some(raw) => Some(parse_date(&raw, "from")?),
        None => None,
    };
    let to = match get_optional_str(params, "to")? {
        Some(raw) => Some(parse_date(&raw, "to")?),
        None => None,
    };

    // ISO dates compare correctly as text.
    let mut stmt = conn.prepare(
        "SELECT status FROM attendance
         WHERE student_id = ?1
           AND (?2 IS NULL OR date >= ?2)
           AND (?3 IS NULL OR date <= ?3)",
    )?;
    let statuses: Vec<String> = stmt
        .query_map((&student_id, &from, &to), |r| r.get(0))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    let stats = attendance::stats(
        statuses
            .iter()
            .filter_map(|s| AttendanceStatus::parse(s)),
    );
    Ok(json!({ "stats": stats }))
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
        "attendance.mark" => Some(dispatch(state, req, attendance_mark)),
        "attendance.list" => Some(dispatch(state, req, attendance_list)),
        "attendance.stats" => Some(dispatch(state, req, attendance_stats)),
        _ => None,
    }
}
