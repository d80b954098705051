use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{coerce_id, Id, Snapshot};
use crate::packages::{
    active_package, definition_name, new_session_blocked, packages_for_student, renewal_eligible,
};
use crate::roster;
use crate::sessions::{teacher_marked, Role};

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

fn handle_eligibility(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_id(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let snap = match snapshot(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let owned = packages_for_student(&snap.student_packages, student_id);
    let active = active_package(owned.iter().copied());
    let Some(sp) = active else {
        return ok(
            &req.id,
            json!({
                "studentId": student_id,
                "hasPackage": false,
                "renewalEligible": false,
                "newSessionBlocked": false,
            }),
        );
    };
    ok(
        &req.id,
        json!({
            "studentId": student_id,
            "hasPackage": true,
            "studentPackageId": sp.id,
            "packageId": sp.package_id,
            "packageName": definition_name(&snap.package_definitions, sp.package_id),
            "remainingLessons": sp.remaining_lessons,
            "status": sp.status,
            "renewalEligible": renewal_eligible(sp),
            "newSessionBlocked": new_session_blocked(active),
        }),
    )
}

fn handle_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let snap = match snapshot(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let student_names = roster::student_names(&snap.students);
    let rows: Vec<serde_json::Value> = snap
        .student_packages
        .iter()
        .map(|sp| {
            let name = definition_name(&snap.package_definitions, sp.package_id)
                .map(str::to_string)
                .or_else(|| sp.package_id.map(|id| format!("#{id}")));
            json!({
                "id": sp.id,
                "studentId": sp.student_id,
                "studentName": roster::name_or_tag(&student_names, sp.student_id),
                "packageName": name,
                "remainingLessons": sp.remaining_lessons,
                "status": sp.status,
                "canRenew": renewal_eligible(sp),
            })
        })
        .collect();
    ok(&req.id, json!({ "studentPackages": rows }))
}

fn handle_catalog(state: &mut AppState, req: &Request) -> serde_json::Value {
    let snap = match snapshot(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let rows: Vec<serde_json::Value> = snap
        .package_definitions
        .iter()
        .map(|d| {
            json!({
                "id": d.id,
                "name": d.name,
                "lessonCount": d.lesson_count,
                "price": d.price,
                "expiresInDays": d.expires_in_days,
            })
        })
        .collect();
    ok(&req.id, json!({ "packages": rows }))
}

fn handle_homeworks(state: &mut AppState, req: &Request) -> serde_json::Value {
    let snap = match snapshot(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let filter = req.params.get("studentId").and_then(coerce_id);
    let student_names = roster::student_names(&snap.students);
    let rows: Vec<serde_json::Value> = snap
        .homeworks
        .iter()
        .filter(|h| filter.map(|sid| h.student_id == Some(sid)).unwrap_or(true))
        .map(|h| {
            json!({
                "id": h.id,
                "studentId": h.student_id,
                "studentName": roster::name_or_tag(&student_names, h.student_id),
                "title": h.title,
                "description": h.description,
                "status": h.status,
                "dueDate": h.due_date,
            })
        })
        .collect();
    ok(&req.id, json!({ "homeworks": rows }))
}

fn handle_reports(state: &mut AppState, req: &Request) -> serde_json::Value {
    let snap = match snapshot(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let role = req
        .params
        .get("role")
        .and_then(|v| v.as_str())
        .and_then(Role::parse);
    // The student dashboard only surfaces reports once at least one session
    // carries a teacher mark.
    let visible = match role {
        Some(Role::Student) => snap.lesson_sessions.iter().any(teacher_marked),
        _ => true,
    };
    let student_names = roster::student_names(&snap.students);
    let rows: Vec<serde_json::Value> = snap
        .reports
        .iter()
        .map(|r| {
            json!({
                "id": r.id,
                "studentId": r.student_id,
                "studentName": roster::name_or_tag(&student_names, r.student_id),
                "lessonSessionId": r.lesson_session_id,
                "topic": r.topic,
                "performanceRating": r.performance_rating,
                "teacherNote": r.teacher_note,
                "nextNote": r.next_note,
                "createdAt": r.created_at,
            })
        })
        .collect();
    ok(&req.id, json!({ "visible": visible, "reports": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "packages.eligibility" => Some(handle_eligibility(state, req)),
        "packages.summary" => Some(handle_summary(state, req)),
        "packages.catalog" => Some(handle_catalog(state, req)),
        "homeworks.list" => Some(handle_homeworks(state, req)),
        "reports.list" => Some(handle_reports(state, req)),
        _ => None,
    }
}
