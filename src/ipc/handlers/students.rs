use crate::calc;
use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::as_record;
use crate::ipc::types::{AppState, Request};
use crate::model::{ClassSection, Student, StudentStatus};
use crate::store::{Query, Record, Table};
use serde_json::{json, Value};

fn students_from(rows: Vec<Record>) -> Vec<Student> {
    rows.into_iter()
        .filter_map(|r| serde_json::from_value(Value::Object(r)).ok())
        .collect()
}

fn parse_status(value: &Value) -> Option<StudentStatus> {
    serde_json::from_value(value.clone()).ok()
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.store.fetch(Table::Students, &Query::all()) {
        Ok(rows) => ok(&req.id, json!({ "students": students_from(rows) })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(student_id) = req.params.get("studentId").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };
    match state.store.get_by_id(Table::Students, student_id) {
        Ok(row) => match serde_json::from_value::<Student>(Value::Object(row)) {
            Ok(student) => ok(&req.id, json!({ "student": student })),
            Err(e) => err(&req.id, "store_failed", e.to_string(), None),
        },
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = &req.params;
    let first_name = match p.get("firstName").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing firstName", None),
    };
    let last_name = match p.get("lastName").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing lastName", None),
    };
    let email = match p.get("email").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing email", None),
    };
    let Some(grade_level) = p.get("gradeLevel").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing gradeLevel", None);
    };
    if !(9..=12).contains(&grade_level) {
        return err(
            &req.id,
            "validation_failed",
            "gradeLevel must be between 9 and 12",
            None,
        );
    }
    let phone = p
        .get("phone")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let status = match p.get("status") {
        None | Some(Value::Null) => StudentStatus::Active,
        Some(v) => match parse_status(v) {
            Some(s) => s,
            None => return err(&req.id, "bad_params", format!("invalid status: {}", v), None),
        },
    };
    let enrollment_date = match p.get("enrollmentDate").and_then(|v| v.as_str()) {
        Some(raw) => match calc::normalize_date(raw) {
            Ok(d) => d,
            Err(e) => return err(&req.id, "validation_failed", e.to_string(), None),
        },
        None => chrono::Local::now().date_naive().format("%Y-%m-%d").to_string(),
    };

    let fields = as_record(json!({
        "firstName": first_name,
        "lastName": last_name,
        "gradeLevel": grade_level,
        "email": email,
        "phone": phone,
        "status": status,
        "enrollmentDate": enrollment_date
    }));
    match state.store.create(Table::Students, fields) {
        Ok(row) => match serde_json::from_value::<Student>(Value::Object(row)) {
            Ok(student) => ok(&req.id, json!({ "student": student })),
            Err(e) => err(&req.id, "store_failed", e.to_string(), None),
        },
        Err(e) => store_err(&req.id, &e),
    }
}

const STUDENT_PATCH_FIELDS: &[&str] = &[
    "firstName",
    "lastName",
    "gradeLevel",
    "email",
    "phone",
    "status",
    "enrollmentDate",
];

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(student_id) = req.params.get("studentId").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };
    let Some(given) = req.params.get("fields").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing fields", None);
    };

    let mut fields = Record::new();
    for (key, value) in given {
        if !STUDENT_PATCH_FIELDS.contains(&key.as_str()) {
            return err(&req.id, "bad_params", format!("unknown field: {}", key), None);
        }
        fields.insert(key.clone(), value.clone());
    }
    for name in ["firstName", "lastName", "email"] {
        if let Some(v) = fields.get(name) {
            if v.as_str().map(|s| s.trim().is_empty()).unwrap_or(true) {
                return err(
                    &req.id,
                    "validation_failed",
                    format!("{} must not be empty", name),
                    None,
                );
            }
        }
    }
    if let Some(v) = fields.get("gradeLevel") {
        match v.as_i64() {
            Some(level) if (9..=12).contains(&level) => {}
            _ => {
                return err(
                    &req.id,
                    "validation_failed",
                    "gradeLevel must be between 9 and 12",
                    None,
                )
            }
        }
    }
    if let Some(v) = fields.get("status") {
        if parse_status(v).is_none() {
            return err(&req.id, "bad_params", format!("invalid status: {}", v), None);
        }
    }
    if let Some(v) = fields.get("enrollmentDate").cloned() {
        let Some(raw) = v.as_str() else {
            return err(&req.id, "bad_params", "enrollmentDate must be a string", None);
        };
        match calc::normalize_date(raw) {
            Ok(d) => {
                fields.insert("enrollmentDate".to_string(), Value::String(d));
            }
            Err(e) => return err(&req.id, "validation_failed", e.to_string(), None),
        }
    }

    match state.store.update(Table::Students, student_id, fields) {
        Ok(row) => match serde_json::from_value::<Student>(Value::Object(row)) {
            Ok(student) => ok(&req.id, json!({ "student": student })),
            Err(e) => err(&req.id, "store_failed", e.to_string(), None),
        },
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(student_id) = req.params.get("studentId").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };
    match state.store.delete(Table::Students, student_id) {
        Ok(deleted) => ok(&req.id, json!({ "deleted": deleted })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_search(state: &mut AppState, req: &Request) -> serde_json::Value {
    let query = req
        .params
        .get("query")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();

    let rows = match state.store.fetch(Table::Students, &Query::all()) {
        Ok(rows) => rows,
        Err(e) => return store_err(&req.id, &e),
    };
    let mut students = students_from(rows);
    if !query.is_empty() {
        let needle = query.to_lowercase();
        students.retain(|s| {
            s.first_name.to_lowercase().contains(&needle)
                || s.last_name.to_lowercase().contains(&needle)
                || s.email.to_lowercase().contains(&needle)
                || s.id.to_string().contains(&query)
        });
    }
    ok(&req.id, json!({ "students": students }))
}

fn handle_students_by_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    let class: ClassSection = match state.store.get_by_id(Table::Classes, class_id) {
        Ok(row) => match serde_json::from_value(Value::Object(row)) {
            Ok(class) => class,
            Err(e) => return err(&req.id, "store_failed", e.to_string(), None),
        },
        Err(e) => return store_err(&req.id, &e),
    };
    let rows = match state.store.fetch(Table::Students, &Query::all()) {
        Ok(rows) => rows,
        Err(e) => return store_err(&req.id, &e),
    };
    let members: Vec<Student> = students_from(rows)
        .into_iter()
        .filter(|s| class.student_ids.contains(&s.id))
        .collect();
    ok(&req.id, json!({ "students": members }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        "students.search" => Some(handle_students_search(state, req)),
        "students.byClass" => Some(handle_students_by_class(state, req)),
        _ => None,
    }
}
