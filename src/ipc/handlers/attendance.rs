use crate::calc;
use crate::ipc::error::ok;
use crate::ipc::helpers::{as_record, optional_str, parse_variant, require_i64, require_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceRecord, AttendanceStatus};
use crate::store::{Filter, Query, RecordStore, Table};
use serde_json::{json, Value};

fn record_from(row: crate::store::Record) -> Result<AttendanceRecord, HandlerErr> {
    serde_json::from_value(Value::Object(row)).map_err(|e| HandlerErr {
        code: "store_failed",
        message: format!("malformed attendance record: {}", e),
        details: None,
    })
}

fn fetch_records(
    store: &dyn RecordStore,
    query: &Query,
) -> Result<Vec<AttendanceRecord>, HandlerErr> {
    let rows = store.fetch(Table::Attendance, query)?;
    rows.into_iter().map(record_from).collect()
}

/// Upsert by the (student, class, date) natural key. A second mark for the
/// same triple lands on the first record: status and notes are replaced,
/// identity and display name are preserved. Last write wins; no history.
fn attendance_mark(state: &mut AppState, params: &Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = require_i64(params, "studentId")?;
    let class_id = require_i64(params, "classId")?;
    let date = calc::normalize_date(&require_str(params, "date")?)?;
    let status: AttendanceStatus = match params.get("status") {
        Some(v) => parse_variant(v, "attendance status")?,
        None => return Err(HandlerErr::bad_params("missing status")),
    };
    let notes = optional_str(params, "notes")?.unwrap_or_default();

    let key = vec![
        ("studentId".to_string(), json!(student_id)),
        ("classId".to_string(), json!(class_id)),
        ("date".to_string(), json!(date)),
    ];
    let on_insert = as_record(json!({
        "name": format!("{} - Student {}", date, student_id),
        "studentId": student_id,
        "classId": class_id,
        "date": date,
        "status": status,
        "notes": notes
    }));
    let on_update = as_record(json!({
        "status": status,
        "notes": notes
    }));

    let row = state
        .store
        .upsert_by_key(Table::Attendance, &key, on_insert, on_update)?;
    Ok(json!({ "record": record_from(row)? }))
}

fn attendance_by_date(
    state: &mut AppState,
    params: &Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date = calc::normalize_date(&require_str(params, "date")?)?;
    let records = fetch_records(
        state.store.as_ref(),
        &Query::all().filter(Filter::EqualTo("date".into(), json!(date))),
    )?;
    Ok(json!({ "records": records }))
}

fn attendance_stats(state: &mut AppState, params: &Value) -> Result<serde_json::Value, HandlerErr> {
    let start = optional_str(params, "start")?;
    let end = optional_str(params, "end")?;
    let mut query = Query::all().select(["status", "date"]);
    match (start, end) {
        (Some(start), Some(end)) => {
            let start = calc::normalize_date(&start)?;
            let end = calc::normalize_date(&end)?;
            // Inclusive on both ends.
            query = query
                .filter(Filter::GreaterThanOrEqualTo("date".into(), json!(start)))
                .filter(Filter::LessThanOrEqualTo("date".into(), json!(end)));
        }
        (None, None) => {}
        _ => {
            return Err(HandlerErr::bad_params(
                "start and end must be given together",
            ))
        }
    }

    let rows = state.store.fetch(Table::Attendance, &query)?;
    let statuses = rows
        .iter()
        .filter_map(|r| r.get("status"))
        .map(|v| parse_variant::<AttendanceStatus>(v, "attendance status"))
        .collect::<Result<Vec<_>, _>>()?;
    let tally = calc::tally_attendance(statuses.iter());
    Ok(json!(tally))
}

fn attendance_list(state: &mut AppState, params: &Value) -> Result<serde_json::Value, HandlerErr> {
    let mut query = Query::all();
    if let Some(class_id) = params.get("classId").and_then(|v| v.as_i64()) {
        query = query.filter(Filter::EqualTo("classId".into(), json!(class_id)));
    }
    if let Some(student_id) = params.get("studentId").and_then(|v| v.as_i64()) {
        query = query.filter(Filter::EqualTo("studentId".into(), json!(student_id)));
    }
    let records = fetch_records(state.store.as_ref(), &query)?;
    Ok(json!({ "records": records }))
}

fn attendance_delete(
    state: &mut AppState,
    params: &Value,
) -> Result<serde_json::Value, HandlerErr> {
    let attendance_id = require_i64(params, "attendanceId")?;
    let deleted = state.store.delete(Table::Attendance, attendance_id)?;
    Ok(json!({ "deleted": deleted }))
}

fn respond(
    state: &mut AppState,
    req: &Request,
    run: fn(&mut AppState, &Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    match run(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.mark" => Some(respond(state, req, attendance_mark)),
        "attendance.byDate" => Some(respond(state, req, attendance_by_date)),
        "attendance.stats" => Some(respond(state, req, attendance_stats)),
        "attendance.list" => Some(respond(state, req, attendance_list)),
        "attendance.delete" => Some(respond(state, req, attendance_delete)),
        _ => None,
    }
}
