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
            "students": [
                { "id": 10, "full_name": "Ada" },
                { "id": 11, "full_name": "Baran" },
                { "id": 12, "full_name": "Cem" }
            ],
            "packageDefinitions": [
                { "id": 5, "name": "10 lessons", "lesson_count": 10, "price": 5000 },
                { "id": 6, "name": "4 lessons", "lesson_count": 4, "price": 2200 }
            ],
            "studentPackages": [
                { "id": 70, "student_id": 10, "package_id": 5, "remaining_lessons": 1, "status": "ACTIVE" },
                { "id": 71, "student_id": 11, "package_id": 6, "remaining_lessons": 2, "status": "ACTIVE" },
                { "id": 72, "student_id": 12, "package_id": 6, "remaining_lessons": 0, "status": "EXPIRED" },
                { "id": 73, "student_id": 12, "package_id": 99, "remaining_lessons": 0, "status": "USED_UP" }
            ],
            "homeworks": [
                { "id": 1, "student_id": 10, "title": "Derivatives worksheet", "status": "ASSIGNED" },
                { "id": 2, "student_id": 11, "title": "Essay draft", "status": "DONE" }
            ],
            "reports": [
                { "id": 1, "student_id": 10, "lesson_session_id": 100,
                  "topic": "limits", "performance_rating": 4, "teacher_note": "solid" }
            ],
            "lessonSessions": [
                { "id": 100, "student_id": 10, "status": "PLANNED" }
            ]
        }),
    );
}

#[test]
fn one_remaining_lesson_opens_renewal_but_not_blocking() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    load_fixture(&mut stdin, &mut reader);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "packages.eligibility",
        json!({ "studentId": 10 }),
    );
    assert_eq!(result["hasPackage"], json!(true));
    assert_eq!(result["packageName"], json!("10 lessons"));
    assert_eq!(result["remainingLessons"], json!(1));
    assert_eq!(result["renewalEligible"], json!(true));
    assert_eq!(result["newSessionBlocked"], json!(false));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn two_remaining_lessons_block_nothing() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    load_fixture(&mut stdin, &mut reader);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "packages.eligibility",
        json!({ "studentId": 11 }),
    );
    assert_eq!(result["renewalEligible"], json!(false));
    assert_eq!(result["newSessionBlocked"], json!(false));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn exhausted_package_blocks_creation_via_first_match_fallback() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    load_fixture(&mut stdin, &mut reader);

    // No ACTIVE instance for this student; the first row is used.
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "packages.eligibility",
        json!({ "studentId": 12 }),
    );
    assert_eq!(result["studentPackageId"], json!(72));
    assert_eq!(result["renewalEligible"], json!(true));
    assert_eq!(result["newSessionBlocked"], json!(true));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn student_without_packages_is_unblocked() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    load_fixture(&mut stdin, &mut reader);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "packages.eligibility",
        json!({ "studentId": 99 }),
    );
    assert_eq!(result["hasPackage"], json!(false));
    assert_eq!(result["renewalEligible"], json!(false));
    assert_eq!(result["newSessionBlocked"], json!(false));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn summary_resolves_names_and_flags_renewals() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    load_fixture(&mut stdin, &mut reader);

    let result = request_ok(&mut stdin, &mut reader, "1", "packages.summary", json!({}));
    let rows = result["studentPackages"].as_array().expect("rows");
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0]["studentName"], json!("Ada"));
    assert_eq!(rows[0]["canRenew"], json!(true));
    assert_eq!(rows[1]["canRenew"], json!(false));
    // Unknown definition falls back to the raw package id tag.
    assert_eq!(rows[3]["packageName"], json!("#99"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn catalog_exposes_definition_rows() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    load_fixture(&mut stdin, &mut reader);

    let result = request_ok(&mut stdin, &mut reader, "1", "packages.catalog", json!({}));
    let rows = result["packages"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], json!("10 lessons"));
    assert_eq!(rows[0]["lessonCount"], json!(10));
    assert_eq!(rows[1]["price"], json!(2200.0));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn homeworks_list_filters_by_student() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    load_fixture(&mut stdin, &mut reader);

    let all = request_ok(&mut stdin, &mut reader, "1", "homeworks.list", json!({}));
    assert_eq!(all["homeworks"].as_array().expect("rows").len(), 2);

    let one = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "homeworks.list",
        json!({ "studentId": 11 }),
    );
    let rows = one["homeworks"].as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["studentName"], json!("Baran"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn student_reports_hidden_until_a_teacher_mark_exists() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    load_fixture(&mut stdin, &mut reader);

    let student_view = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "reports.list",
        json!({ "role": "STUDENT" }),
    );
    assert_eq!(student_view["visible"], json!(false));
    // Rows still come back; the host decides whether to render the section.
    assert_eq!(student_view["reports"].as_array().expect("rows").len(), 1);

    let admin_view = request_ok(&mut stdin, &mut reader, "2", "reports.list", json!({}));
    assert_eq!(admin_view["visible"], json!(true));

    // A teacher mark on any session flips the flag.
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "snapshot.load",
        json!({
            "reports": [{ "id": 1, "student_id": 10 }],
            "lessonSessions": [
                { "id": 100, "student_id": 10, "status": "PENDING_CONFIRMATION",
                  "teacher_marked_at": "2024-03-08T11:00:00" }
            ]
        }),
    );
    let student_view = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "reports.list",
        json!({ "role": "STUDENT" }),
    );
    assert_eq!(student_view["visible"], json!(true));

    drop(stdin);
    let _ = child.wait();
}
