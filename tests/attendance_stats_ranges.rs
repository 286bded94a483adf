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

fn mark(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    student_id: i64,
    date: &str,
    status: &str,
) {
    let _ = request_ok(
        stdin,
        reader,
        id,
        "attendance.mark",
        json!({
            "studentId": student_id,
            "classId": 1,
            "date": date,
            "status": status
        }),
    );
}

#[test]
fn stats_tallies_statuses_and_rounds_the_present_share() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    mark(&mut stdin, &mut reader, "1", 1, "2024-05-01", "Present");
    mark(&mut stdin, &mut reader, "2", 2, "2024-05-01", "Present");
    mark(&mut stdin, &mut reader, "3", 3, "2024-05-01", "Absent");

    let stats = request_ok(&mut stdin, &mut reader, "4", "attendance.stats", json!({}));
    assert_eq!(stats.get("total").and_then(|v| v.as_i64()), Some(3));
    assert_eq!(stats.get("present").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(stats.get("absent").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(stats.get("late").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(stats.get("excused").and_then(|v| v.as_i64()), Some(0));
    // 2/3 rounds half-up to 67.
    assert_eq!(
        stats.get("presentPercentage").and_then(|v| v.as_i64()),
        Some(67)
    );
}

#[test]
fn stats_range_is_inclusive_on_both_ends() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    mark(&mut stdin, &mut reader, "1", 1, "2024-04-30", "Absent");
    mark(&mut stdin, &mut reader, "2", 1, "2024-05-01", "Present");
    mark(&mut stdin, &mut reader, "3", 1, "2024-05-02", "Late");
    mark(&mut stdin, &mut reader, "4", 1, "2024-05-03", "Excused");

    let stats = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.stats",
        json!({ "start": "2024-05-01", "end": "2024-05-02" }),
    );
    assert_eq!(stats.get("total").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(stats.get("present").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(stats.get("late").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(stats.get("absent").and_then(|v| v.as_i64()), Some(0));
}

#[test]
fn empty_range_yields_all_zeros_not_an_error() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    mark(&mut stdin, &mut reader, "1", 1, "2024-05-01", "Present");

    let stats = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.stats",
        json!({ "start": "2024-06-01", "end": "2024-06-30" }),
    );
    assert_eq!(stats.get("total").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(
        stats.get("presentPercentage").and_then(|v| v.as_i64()),
        Some(0)
    );
}

#[test]
fn half_open_range_is_rejected() {
    let (_child, mut stdin, mut reader) = spawn_daemon();

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.stats",
        json!({ "start": "2024-05-01" }),
    );
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        resp.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_params")
    );
}
