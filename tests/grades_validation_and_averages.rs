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

fn grade_params(student_id: i64, class_id: i64, score: f64, total: f64, date: &str) -> serde_json::Value {
    json!({
        "studentId": student_id,
        "classId": class_id,
        "assignmentName": "Quiz",
        "score": score,
        "totalPoints": total,
        "type": "Quiz",
        "date": date
    })
}

#[test]
fn over_total_score_is_rejected_and_nothing_is_stored() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "grades.create",
        grade_params(1, 1, 50.0, 40.0, "2024-05-01"),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        resp.pointer("/error/code").and_then(|v| v.as_str()),
        Some("validation_failed")
    );

    let listed = request_ok(&mut stdin, &mut reader, "2", "grades.list", json!({}));
    assert_eq!(listed.pointer("/grades"), Some(&json!([])));
}

#[test]
fn full_marks_are_a_valid_hundred_percent() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "grades.create",
        grade_params(1, 1, 40.0, 40.0, "2024-05-01"),
    );
    assert_eq!(
        created.pointer("/grade/score").and_then(|v| v.as_f64()),
        Some(40.0)
    );

    let avg = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grades.studentAverage",
        json!({ "studentId": 1 }),
    );
    assert_eq!(avg.get("average").and_then(|v| v.as_i64()), Some(100));
}

#[test]
fn update_validates_the_merged_record() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "grades.create",
        grade_params(1, 1, 30.0, 40.0, "2024-05-01"),
    );
    let grade_id = created
        .pointer("/grade/id")
        .and_then(|v| v.as_i64())
        .expect("grade id");

    // Raising the score past the stored total must fail even though the
    // patch alone looks harmless.
    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "grades.update",
        json!({ "gradeId": grade_id, "fields": { "score": 45.0 } }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        resp.pointer("/error/code").and_then(|v| v.as_str()),
        Some("validation_failed")
    );

    // Raising both together is fine.
    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "grades.update",
        json!({ "gradeId": grade_id, "fields": { "score": 45.0, "totalPoints": 50.0 } }),
    );
    assert_eq!(
        updated.pointer("/grade/totalPoints").and_then(|v| v.as_f64()),
        Some(50.0)
    );
}

#[test]
fn class_and_student_averages_round_once_over_per_grade_percentages() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    // Student 1 in class 1: 50% and 100% average to 75.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "grades.create",
        grade_params(1, 1, 10.0, 20.0, "2024-05-01"),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grades.create",
        grade_params(1, 1, 20.0, 20.0, "2024-05-02"),
    );
    // Student 2 in class 2 must not leak into class 1.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "grades.create",
        grade_params(2, 2, 1.0, 20.0, "2024-05-03"),
    );

    let class_avg = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "grades.classAverage",
        json!({ "classId": 1 }),
    );
    assert_eq!(class_avg.get("average").and_then(|v| v.as_i64()), Some(75));

    let student_avg = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "grades.studentAverage",
        json!({ "studentId": 1 }),
    );
    assert_eq!(student_avg.get("average").and_then(|v| v.as_i64()), Some(75));
}

#[test]
fn averages_with_no_grades_are_zero() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    let class_avg = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "grades.classAverage",
        json!({ "classId": 99 }),
    );
    assert_eq!(class_avg.get("average").and_then(|v| v.as_i64()), Some(0));

    let student_avg = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grades.studentAverage",
        json!({ "studentId": 99 }),
    );
    assert_eq!(student_avg.get("average").and_then(|v| v.as_i64()), Some(0));
}
