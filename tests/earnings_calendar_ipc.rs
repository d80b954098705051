use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_tutordeskd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn tutordeskd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn load_fixture(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) {
    request_ok(
        stdin,
        reader,
        "load",
        "snapshot.load",
        json!({
            "now": "2024-03-10T12:00:00",
            "teachers": [{ "user_id": 1, "full_name": "Leyla Aksoy", "teacher_rate": 500 }],
            "lessonSessions": [
                { "id": 1, "teacher_user_id": 1, "status": "COMPLETED",
                  "scheduled_start": "2024-03-02T10:00:00" },
                { "id": 2, "teacher_user_id": 1, "status": "COMPLETED",
                  "scheduled_start": "2024-03-09T10:00:00" },
                { "id": 3, "teacher_user_id": 1, "status": "PLANNED",
                  "scheduled_start": "2024-03-05T10:00:00", "topic": "geometry" },
                { "id": 4, "teacher_user_id": 1, "status": "COMPLETED",
                  "scheduled_start": "2024-02-20T10:00:00" }
            ],
            "externalCalendarEvents": { "items": [
                { "start": "2024-03-05T14:00:00", "summary": "Mock exam" },
                { "start": "2024-04-01T09:00:00", "summary": "Holiday" }
            ]}
        }),
    );
}

#[test]
fn two_completed_sessions_at_rate_500_earn_1000() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    load_fixture(&mut stdin, &mut reader);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "earnings.month",
        json!({ "rate": 500 }),
    );
    assert_eq!(result["completedCount"], json!(2));
    assert_eq!(result["earning"], json!(1000.0));
    assert_eq!(result["earningDisplay"], json!(1000.0));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn rate_can_come_from_the_teacher_row() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    load_fixture(&mut stdin, &mut reader);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "earnings.month",
        json!({ "teacherId": 1 }),
    );
    assert_eq!(result["rate"], json!(500.0));
    assert_eq!(result["earning"], json!(1000.0));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn zero_values_display_as_dash_sentinel() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "load",
        "snapshot.load",
        json!({ "now": "2024-03-10T12:00:00", "lessonSessions": [] }),
    );

    let result = request_ok(&mut stdin, &mut reader, "1", "earnings.month", json!({}));
    assert_eq!(result["completedCount"], json!(0));
    assert_eq!(result["rateDisplay"], json!("-"));
    assert_eq!(result["earningDisplay"], json!("-"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn calendar_buckets_keep_lessons_before_external_events() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    load_fixture(&mut stdin, &mut reader);

    let result = request_ok(&mut stdin, &mut reader, "1", "calendar.month", json!({}));
    assert_eq!(result["year"], json!(2024));
    assert_eq!(result["month"], json!(3));
    // March 2024 starts on a Friday.
    assert_eq!(result["leadingBlanks"], json!(5));
    assert_eq!(result["daysInMonth"], json!(31));

    let days = result["days"].as_array().expect("days");
    let day5 = &days[4];
    assert_eq!(day5["date"], json!("2024-03-05"));
    let items = day5["items"].as_array().expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["kind"], json!("lesson"));
    assert_eq!(items[0]["title"], json!("Lesson: geometry"));
    assert_eq!(items[0]["time"], json!("10:00"));
    assert_eq!(items[1]["kind"], json!("external"));
    assert_eq!(items[1]["title"], json!("Mock exam"));

    // The April event sits in the next month's grid, not this one.
    assert!(days
        .iter()
        .all(|d| d["items"].as_array().expect("items").len() <= 2));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn month_offset_shifts_the_grid() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    load_fixture(&mut stdin, &mut reader);

    let next = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "calendar.month",
        json!({ "monthOffset": 1 }),
    );
    assert_eq!(next["month"], json!(4));
    let days = next["days"].as_array().expect("days");
    let day1 = &days[0];
    assert_eq!(day1["items"][0]["title"], json!("Holiday"));

    let prev_year = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "calendar.month",
        json!({ "monthOffset": -3 }),
    );
    assert_eq!(prev_year["year"], json!(2023));
    assert_eq!(prev_year["month"], json!(12));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn workload_counts_lessons_per_teacher() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "load",
        "snapshot.load",
        json!({
            "teachers": [
                { "user_id": 1, "full_name": "Leyla Aksoy" },
                { "user_id": 2, "full_name": "Mert Kaya" }
            ],
            "lessonSessions": [
                { "id": 1, "teacher_user_id": 1 },
                { "id": 2, "teacher_user_id": 1 },
                { "id": 3, "teacher_user_id": 9 }
            ]
        }),
    );

    let result = request_ok(&mut stdin, &mut reader, "1", "workload.teachers", json!({}));
    let rows = result["teachers"].as_array().expect("rows");
    assert_eq!(rows[0]["lessonCount"], json!(2));
    assert_eq!(rows[1]["lessonCount"], json!(0));

    drop(stdin);
    let _ = child.wait();
}
