use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::Snapshot;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "snapshotLoaded": state.snapshot.is_some(),
        }),
    )
}

/// Replaces the whole snapshot. The host refetches every collection after a
/// successful mutation and loads the result here; there is no patching.
fn handle_snapshot_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let snap = match Snapshot::from_params(&req.params) {
        Ok(snap) => snap,
        Err(e) => return err(&req.id, "bad_params", format!("{e}"), None),
    };
    let accepted = json!({
        "teachers": snap.teachers.len(),
        "students": snap.students.len(),
        "enrollments": snap.enrollments.len(),
        "lessonSessions": snap.lesson_sessions.len(),
        "packageDefinitions": snap.package_definitions.len(),
        "studentPackages": snap.student_packages.len(),
        "homeworks": snap.homeworks.len(),
        "reports": snap.reports.len(),
        "externalCalendarEvents": snap.external_events.len(),
    });
    state.snapshot = Some(snap);
    ok(&req.id, json!({ "accepted": accepted }))
}

fn handle_snapshot_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.snapshot = None;
    ok(&req.id, json!({}))
}

fn handle_policy_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(flag) = req
        .params
        .get("requireFinalLessonForRating")
        .and_then(|v| v.as_bool())
    else {
        return err(
            &req.id,
            "bad_params",
            "missing params.requireFinalLessonForRating",
            None,
        );
    };
    state.policy.require_final_lesson = flag;
    ok(&req.id, json!({ "requireFinalLessonForRating": flag }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "snapshot.load" => Some(handle_snapshot_load(state, req)),
        "snapshot.clear" => Some(handle_snapshot_clear(state, req)),
        "policy.set" => Some(handle_policy_set(state, req)),
        _ => None,
    }
}
