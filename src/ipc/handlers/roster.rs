use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{coerce_id, Id, Snapshot, Student};
use crate::roster;

fn snapshot<'a>(state: &'a AppState, req: &Request) -> Result<&'a Snapshot, serde_json::Value> {
    state
        .snapshot
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_snapshot", "load a snapshot first", None))
}

fn required_id(req: &Request, key: &str) -> Result<Id, serde_json::Value> {
    req.params
        .get(key)
        .and_then(coerce_id)
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn student_row(st: &Student) -> serde_json::Value {
    json!({
        "id": st.id,
        "fullName": st.display_name(),
        "grade": st.grade,
        "email": st.email,
        "level": st.level,
        "targetExam": st.target_exam,
        "strengths": st.strengths,
        "weaknesses": st.weaknesses,
    })
}

fn handle_index(state: &mut AppState, req: &Request) -> serde_json::Value {
    let snap = match snapshot(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let index = roster::RosterIndex::build(&snap.enrollments);
    let pairs: Vec<serde_json::Value> = index
        .pairs()
        .iter()
        .map(|(t, s)| json!([t, s]))
        .collect();
    let mut by_teacher = serde_json::Map::new();
    for tid in index.teacher_ids() {
        by_teacher.insert(tid.to_string(), json!(index.students_of(tid)));
    }
    ok(
        &req.id,
        json!({ "pairs": pairs, "byTeacher": by_teacher }),
    )
}

fn handle_teacher_students(state: &mut AppState, req: &Request) -> serde_json::Value {
    let teacher_id = match required_id(req, "teacherId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let snap = match snapshot(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let index = roster::RosterIndex::build(&snap.enrollments);
    let students: Vec<serde_json::Value> = roster::students_of_teacher(&index, teacher_id, &snap.students)
        .into_iter()
        .map(student_row)
        .collect();
    ok(
        &req.id,
        json!({ "teacherId": teacher_id, "students": students }),
    )
}

/// Student-dashboard view: the enrollment currently in effect plus whatever
/// teacher details ride along on the row.
fn handle_active_enrollment(state: &mut AppState, req: &Request) -> serde_json::Value {
    let snap = match snapshot(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let Some(en) = roster::active_enrollment(&snap.enrollments) else {
        return ok(&req.id, json!({ "found": false }));
    };
    let teacher = en.teacher.as_ref().map(|t| {
        json!({
            "id": roster::participant_id(t),
            "fullName": t.get("full_name").and_then(|v| v.as_str()),
            "email": t.get("email").and_then(|v| v.as_str()),
        })
    });
    ok(
        &req.id,
        json!({
            "found": true,
            "id": en.id,
            "teacherUserId": roster::enrollment_teacher_id(en),
            "studentId": roster::enrollment_student_id(en),
            "status": en.status,
            "teacher": teacher,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.index" => Some(handle_index(state, req)),
        "roster.teacherStudents" => Some(handle_teacher_students(state, req)),
        "enrollment.active" => Some(handle_active_enrollment(state, req)),
        _ => None,
    }
}
