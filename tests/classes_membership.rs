use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_daemon() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_classtrackd");
    let mut child = Command::new(exe)
        .env_remove("CLASSTRACK_PROJECT_ID")
        .env_remove("CLASSTRACK_PUBLIC_KEY")
        .env_remove("CLASSTRACK_API_URL")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn classtrackd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn create_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    first: &str,
) -> i64 {
    let created = request_ok(
        stdin,
        reader,
        id,
        "students.create",
        json!({
            "firstName": first,
            "lastName": "Example",
            "gradeLevel": 9,
            "email": format!("{}@example.edu", first.to_lowercase())
        }),
    );
    created
        .pointer("/student/id")
        .and_then(|v| v.as_i64())
        .expect("student id")
}

#[test]
fn roster_membership_flows_through_set_students_and_by_class() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    let maya = create_student(&mut stdin, &mut reader, "1", "Maya");
    let jordan = create_student(&mut stdin, &mut reader, "2", "Jordan");
    let sam = create_student(&mut stdin, &mut reader, "3", "Sam");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "classes.create",
        json!({
            "name": "Algebra II",
            "subject": "Math",
            "period": 3,
            "room": "204",
            "studentIds": [maya, jordan]
        }),
    );
    let class_id = created
        .pointer("/class/id")
        .and_then(|v| v.as_i64())
        .expect("class id");

    let members = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.byClass",
        json!({ "classId": class_id }),
    );
    let ids: Vec<i64> = members
        .get("students")
        .and_then(|v| v.as_array())
        .expect("students array")
        .iter()
        .filter_map(|s| s.get("id").and_then(|v| v.as_i64()))
        .collect();
    assert_eq!(ids, vec![maya, jordan]);

    // Replace the roster wholesale.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "classes.setStudents",
        json!({ "classId": class_id, "studentIds": [sam] }),
    );
    let members = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "students.byClass",
        json!({ "classId": class_id }),
    );
    let ids: Vec<i64> = members
        .get("students")
        .and_then(|v| v.as_array())
        .expect("students array")
        .iter()
        .filter_map(|s| s.get("id").and_then(|v| v.as_i64()))
        .collect();
    assert_eq!(ids, vec![sam]);

    let listed = request_ok(&mut stdin, &mut reader, "8", "classes.list", json!({}));
    let row = listed
        .get("classes")
        .and_then(|v| v.as_array())
        .and_then(|rows| rows.first())
        .cloned()
        .expect("class row");
    assert_eq!(row.get("studentCount").and_then(|v| v.as_i64()), Some(1));
}

#[test]
fn period_outside_one_to_eight_is_rejected() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "classes.create",
        json!({ "name": "Zero period", "subject": "Math", "period": 0 }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        resp.pointer("/error/code").and_then(|v| v.as_str()),
        Some("validation_failed")
    );
}

#[test]
fn update_patches_fields_and_rejects_unknown_keys() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "classes.create",
        json!({ "name": "Biology", "subject": "Science", "period": 2 }),
    );
    let class_id = created
        .pointer("/class/id")
        .and_then(|v| v.as_i64())
        .expect("class id");

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.update",
        json!({ "classId": class_id, "fields": { "room": "Lab 3", "period": 4 } }),
    );
    assert_eq!(
        updated.pointer("/class/room").and_then(|v| v.as_str()),
        Some("Lab 3")
    );
    assert_eq!(
        updated.pointer("/class/period").and_then(|v| v.as_i64()),
        Some(4)
    );

    let resp = request(
        &mut stdin,
        &mut reader,
        "3",
        "classes.update",
        json!({ "classId": class_id, "fields": { "teacher": "Nguyen" } }),
    );
    assert_eq!(
        resp.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_params")
    );
}

#[test]
fn deleting_a_class_leaves_students_alone() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    let maya = create_student(&mut stdin, &mut reader, "1", "Maya");
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "classes.create",
        json!({
            "name": "History",
            "subject": "Social Studies",
            "period": 1,
            "studentIds": [maya]
        }),
    );
    let class_id = created
        .pointer("/class/id")
        .and_then(|v| v.as_i64())
        .expect("class id");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "classes.delete",
        json!({ "classId": class_id }),
    );

    let gone = request(
        &mut stdin,
        &mut reader,
        "4",
        "classes.get",
        json!({ "classId": class_id }),
    );
    assert_eq!(
        gone.pointer("/error/code").and_then(|v| v.as_str()),
        Some("not_found")
    );

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.get",
        json!({ "studentId": maya }),
    );
    assert_eq!(
        student.pointer("/student/firstName").and_then(|v| v.as_str()),
        Some("Maya")
    );
}
