use crate::calc;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    as_record, optional_usize, parse_variant, require_f64, require_i64, require_str, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Grade, GradeType};
use crate::store::{Filter, Query, RecordStore, Table};
use serde_json::{json, Value};

fn fetch_grades(store: &dyn RecordStore, query: &Query) -> Result<Vec<Grade>, HandlerErr> {
    let rows = store.fetch(Table::Grades, query)?;
    rows.into_iter()
        .map(|r| {
            serde_json::from_value(Value::Object(r)).map_err(|e| HandlerErr {
                code: "store_failed",
                message: format!("malformed grade record: {}", e),
                details: None,
            })
        })
        .collect()
}

fn grade_from(row: crate::store::Record) -> Result<Grade, HandlerErr> {
    serde_json::from_value(Value::Object(row)).map_err(|e| HandlerErr {
        code: "store_failed",
        message: format!("malformed grade record: {}", e),
        details: None,
    })
}

fn grades_list(state: &mut AppState, params: &Value) -> Result<serde_json::Value, HandlerErr> {
    let mut query = Query::all();
    if let Some(class_id) = params.get("classId").and_then(|v| v.as_i64()) {
        query = query.filter(Filter::EqualTo("classId".into(), json!(class_id)));
    }
    if let Some(student_id) = params.get("studentId").and_then(|v| v.as_i64()) {
        query = query.filter(Filter::EqualTo("studentId".into(), json!(student_id)));
    }
    let grades = fetch_grades(state.store.as_ref(), &query)?;
    Ok(json!({ "grades": grades }))
}

fn grades_get(state: &mut AppState, params: &Value) -> Result<serde_json::Value, HandlerErr> {
    let grade_id = require_i64(params, "gradeId")?;
    let grade = grade_from(state.store.get_by_id(Table::Grades, grade_id)?)?;
    Ok(json!({ "grade": grade }))
}

fn grades_create(state: &mut AppState, params: &Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = require_i64(params, "studentId")?;
    let class_id = require_i64(params, "classId")?;
    let assignment_name = require_str(params, "assignmentName")?;
    if assignment_name.trim().is_empty() {
        return Err(HandlerErr::bad_params("assignmentName must not be empty"));
    }
    let score = require_f64(params, "score")?;
    let total_points = require_f64(params, "totalPoints")?;
    let kind: GradeType = match params.get("type") {
        Some(v) => parse_variant(v, "grade type")?,
        None => return Err(HandlerErr::bad_params("missing type")),
    };
    let date = calc::normalize_date(&require_str(params, "date")?)?;

    // Rules run before the store sees anything; a violation is never a
    // partial save.
    calc::validate_grade(score, total_points)?;

    let fields = as_record(json!({
        "studentId": student_id,
        "classId": class_id,
        "assignmentName": assignment_name.trim(),
        "score": score,
        "totalPoints": total_points,
        "type": kind,
        "date": date
    }));
    let grade = grade_from(state.store.create(Table::Grades, fields)?)?;
    Ok(json!({ "grade": grade }))
}

fn grades_update(state: &mut AppState, params: &Value) -> Result<serde_json::Value, HandlerErr> {
    let grade_id = require_i64(params, "gradeId")?;
    let Some(given) = params.get("fields").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("missing fields"));
    };

    let existing = grade_from(state.store.get_by_id(Table::Grades, grade_id)?)?;
    let mut fields = crate::store::Record::new();
    for (key, value) in given {
        match key.as_str() {
            "studentId" | "classId" => {
                if value.as_i64().is_none() {
                    return Err(HandlerErr::bad_params(format!("{} must be an id", key)));
                }
            }
            "assignmentName" => {
                if value.as_str().map(|s| s.trim().is_empty()).unwrap_or(true) {
                    return Err(HandlerErr::validation("assignmentName must not be empty"));
                }
            }
            "score" | "totalPoints" => {
                if value.as_f64().is_none() {
                    return Err(HandlerErr::bad_params(format!("{} must be numeric", key)));
                }
            }
            "type" => {
                let _: GradeType = parse_variant(value, "grade type")?;
            }
            "date" => {
                let Some(raw) = value.as_str() else {
                    return Err(HandlerErr::bad_params("date must be a string"));
                };
                fields.insert("date".to_string(), Value::String(calc::normalize_date(raw)?));
                continue;
            }
            _ => return Err(HandlerErr::bad_params(format!("unknown field: {}", key))),
        }
        fields.insert(key.clone(), value.clone());
    }

    // Validate the record as it will be after the merge.
    let score = fields
        .get("score")
        .and_then(|v| v.as_f64())
        .unwrap_or(existing.score);
    let total_points = fields
        .get("totalPoints")
        .and_then(|v| v.as_f64())
        .unwrap_or(existing.total_points);
    calc::validate_grade(score, total_points)?;

    let grade = grade_from(state.store.update(Table::Grades, grade_id, fields)?)?;
    Ok(json!({ "grade": grade }))
}

fn grades_delete(state: &mut AppState, params: &Value) -> Result<serde_json::Value, HandlerErr> {
    let grade_id = require_i64(params, "gradeId")?;
    let deleted = state.store.delete(Table::Grades, grade_id)?;
    Ok(json!({ "deleted": deleted }))
}

fn grades_recent(state: &mut AppState, params: &Value) -> Result<serde_json::Value, HandlerErr> {
    let limit = optional_usize(params, "limit")?.unwrap_or(10);
    let grades = fetch_grades(state.store.as_ref(), &Query::all())?;
    Ok(json!({ "grades": calc::recent_grades(&grades, limit) }))
}

fn grades_class_average(
    state: &mut AppState,
    params: &Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = require_i64(params, "classId")?;
    let grades = fetch_grades(state.store.as_ref(), &Query::all())?;
    Ok(json!({
        "classId": class_id,
        "average": calc::class_average(&grades, class_id)
    }))
}

fn grades_student_average(
    state: &mut AppState,
    params: &Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = require_i64(params, "studentId")?;
    let grades = fetch_grades(state.store.as_ref(), &Query::all())?;
    Ok(json!({
        "studentId": student_id,
        "average": calc::student_average(&grades, student_id)
    }))
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
        "grades.list" => Some(respond(state, req, grades_list)),
        "grades.get" => Some(respond(state, req, grades_get)),
        "grades.create" => Some(respond(state, req, grades_create)),
        "grades.update" => Some(respond(state, req, grades_update)),
        "grades.delete" => Some(respond(state, req, grades_delete)),
        "grades.recent" => Some(respond(state, req, grades_recent)),
        "grades.classAverage" => Some(respond(state, req, grades_class_average)),
        "grades.studentAverage" => Some(respond(state, req, grades_student_average)),
        _ => None,
    }
}
