use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::as_record;
use crate::ipc::types::{AppState, Request};
use crate::model::ClassSection;
use crate::store::{Query, Record, Table};
use serde_json::{json, Value};

fn class_from(row: Record) -> Result<ClassSection, serde_json::Error> {
    serde_json::from_value(Value::Object(row))
}

fn student_id_list(value: &Value) -> Option<Vec<i64>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_i64())
        .collect::<Option<Vec<i64>>>()
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.store.fetch(Table::Classes, &Query::all()) {
        Ok(rows) => {
            // Include the member count so the UI can render roster cards
            // without a second round trip.
            let classes: Vec<serde_json::Value> = rows
                .into_iter()
                .filter_map(|r| class_from(r).ok())
                .map(|c| {
                    let count = c.student_ids.len();
                    let mut value = json!(c);
                    value["studentCount"] = json!(count);
                    value
                })
                .collect();
            ok(&req.id, json!({ "classes": classes }))
        }
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_classes_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    match state.store.get_by_id(Table::Classes, class_id) {
        Ok(row) => match class_from(row) {
            Ok(class) => ok(&req.id, json!({ "class": class })),
            Err(e) => err(&req.id, "store_failed", e.to_string(), None),
        },
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = &req.params;
    let name = match p.get("name").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing name", None),
    };
    let subject = match p.get("subject").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing subject", None),
    };
    let Some(period) = p.get("period").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing period", None);
    };
    if !(1..=8).contains(&period) {
        return err(
            &req.id,
            "validation_failed",
            "period must be between 1 and 8",
            None,
        );
    }
    let room = p
        .get("room")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let student_ids = match p.get("studentIds") {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => match student_id_list(v) {
            Some(ids) => ids,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "studentIds must be an array of ids",
                    None,
                )
            }
        },
    };

    let fields = as_record(json!({
        "name": name,
        "subject": subject,
        "period": period,
        "room": room,
        "studentIds": student_ids
    }));
    match state.store.create(Table::Classes, fields) {
        Ok(row) => match class_from(row) {
            Ok(class) => ok(&req.id, json!({ "class": class })),
            Err(e) => err(&req.id, "store_failed", e.to_string(), None),
        },
        Err(e) => store_err(&req.id, &e),
    }
}

const CLASS_PATCH_FIELDS: &[&str] = &["name", "subject", "period", "room", "studentIds"];

fn handle_classes_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    let Some(given) = req.params.get("fields").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing fields", None);
    };

    let mut fields = Record::new();
    for (key, value) in given {
        if !CLASS_PATCH_FIELDS.contains(&key.as_str()) {
            return err(&req.id, "bad_params", format!("unknown field: {}", key), None);
        }
        fields.insert(key.clone(), value.clone());
    }
    for name in ["name", "subject"] {
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
    if let Some(v) = fields.get("period") {
        match v.as_i64() {
            Some(period) if (1..=8).contains(&period) => {}
            _ => {
                return err(
                    &req.id,
                    "validation_failed",
                    "period must be between 1 and 8",
                    None,
                )
            }
        }
    }
    if let Some(v) = fields.get("studentIds") {
        if student_id_list(v).is_none() {
            return err(
                &req.id,
                "bad_params",
                "studentIds must be an array of ids",
                None,
            );
        }
    }

    match state.store.update(Table::Classes, class_id, fields) {
        Ok(row) => match class_from(row) {
            Ok(class) => ok(&req.id, json!({ "class": class })),
            Err(e) => err(&req.id, "store_failed", e.to_string(), None),
        },
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    match state.store.delete(Table::Classes, class_id) {
        Ok(deleted) => ok(&req.id, json!({ "deleted": deleted })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_classes_set_students(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(class_id) = req.params.get("classId").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing classId", None);
    };
    let ids = match req.params.get("studentIds").and_then(student_id_list) {
        Some(ids) => ids,
        None => {
            return err(
                &req.id,
                "bad_params",
                "studentIds must be an array of ids",
                None,
            )
        }
    };
    let fields = as_record(json!({ "studentIds": ids }));
    match state.store.update(Table::Classes, class_id, fields) {
        Ok(row) => match class_from(row) {
            Ok(class) => ok(&req.id, json!({ "class": class })),
            Err(e) => err(&req.id, "store_failed", e.to_string(), None),
        },
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.get" => Some(handle_classes_get(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.update" => Some(handle_classes_update(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        "classes.setStudents" => Some(handle_classes_set_students(state, req)),
        _ => None,
    }
}
