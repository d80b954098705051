use chrono::NaiveDateTime;
use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{coerce_id, day_key, parse_timestamp, LessonSession, Snapshot};
use crate::packages;
use crate::roster;
use crate::sessions::{
    eligible_actions, is_upcoming, matches_filters, pending_counts, progress,
    rating_entry_allowed, status_of, student_marked, teacher_marked, Role, SessionAction,
    SessionFilters,
};

fn snapshot<'a>(state: &'a AppState, req: &Request) -> Result<&'a Snapshot, serde_json::Value> {
    state
        .snapshot
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_snapshot", "load a snapshot first", None))
}

fn required_role(req: &Request) -> Result<Role, serde_json::Value> {
    req.params
        .get("role")
        .and_then(|v| v.as_str())
        .and_then(Role::parse)
        .ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "role must be TEACHER, STUDENT or ADMIN",
                None,
            )
        })
}

/// Clock resolution: explicit param wins, then the snapshot override, then
/// the local wall clock.
fn resolve_now(snap: &Snapshot, req: &Request) -> Result<NaiveDateTime, serde_json::Value> {
    match req.params.get("now").and_then(|v| v.as_str()) {
        Some(raw) => parse_timestamp(raw).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("unrecognized now timestamp: {raw}"),
                None,
            )
        }),
        None => Ok(snap.now_or_wall_clock()),
    }
}

fn action_names(actions: &[SessionAction]) -> Vec<&'static str> {
    actions.iter().map(|a| a.as_str()).collect()
}

fn session_row(
    s: &LessonSession,
    role: Role,
    teacher_names: &std::collections::HashMap<i64, String>,
    student_names: &std::collections::HashMap<i64, String>,
) -> serde_json::Value {
    let status = status_of(s);
    json!({
        "id": s.id,
        "teacherUserId": s.teacher_user_id,
        "studentId": s.student_id,
        "teacherName": roster::name_or_tag(teacher_names, s.teacher_user_id),
        "studentName": roster::name_or_tag(student_names, s.student_id),
        "scheduledStart": s.scheduled_start,
        "date": s.scheduled_start.as_deref().and_then(day_key),
        "time": s.scheduled_start.as_deref().and_then(parse_timestamp)
            .map(|ts| ts.format("%H:%M").to_string()),
        "durationMin": s.duration_min,
        "mode": s.mode,
        "topic": s.topic,
        "status": s.status,
        "statusColor": status.color(),
        "teacherMarked": teacher_marked(s),
        "studentMarked": student_marked(s),
        "teacherMarkNote": s.teacher_mark_note,
        "cancelledByRole": s.cancelled_by_role,
        "actions": action_names(&eligible_actions(s, role)),
    })
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let role = match required_role(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let snap = match snapshot(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let now = match resolve_now(snap, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let filters: SessionFilters = match req.params.get("filters") {
        Some(raw) => match serde_json::from_value(raw.clone()) {
            Ok(f) => f,
            Err(e) => return err(&req.id, "bad_params", format!("bad filters: {e}"), None),
        },
        None => SessionFilters::default(),
    };
    let upcoming_only = req
        .params
        .get("upcomingOnly")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let teacher_names = roster::teacher_names(&snap.teachers);
    let student_names = roster::student_names(&snap.students);
    let rows: Vec<serde_json::Value> = snap
        .lesson_sessions
        .iter()
        .filter(|s| matches_filters(s, &filters))
        .filter(|s| !upcoming_only || is_upcoming(s, now))
        .map(|s| session_row(s, role, &teacher_names, &student_names))
        .collect();
    ok(&req.id, json!({ "sessions": rows }))
}

fn handle_actions(state: &mut AppState, req: &Request) -> serde_json::Value {
    let role = match required_role(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(session_id) = req.params.get("sessionId").and_then(coerce_id) else {
        return err(&req.id, "bad_params", "missing sessionId", None);
    };
    let snap = match snapshot(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let Some(s) = snap
        .lesson_sessions
        .iter()
        .find(|s| s.id == Some(session_id))
    else {
        return err(
            &req.id,
            "not_found",
            format!("unknown session: {session_id}"),
            None,
        );
    };
    let remaining = s.student_id.and_then(|sid| {
        let owned = packages::packages_for_student(&snap.student_packages, sid);
        packages::active_package(owned.iter().copied()).and_then(|sp| sp.remaining_lessons)
    });
    ok(
        &req.id,
        json!({
            "sessionId": session_id,
            "status": s.status,
            "actions": action_names(&eligible_actions(s, role)),
            "ratingEntryAllowed": rating_entry_allowed(s, role, remaining, state.policy),
        }),
    )
}

fn handle_pending(state: &mut AppState, req: &Request) -> serde_json::Value {
    let snap = match snapshot(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let counts = pending_counts(&snap.lesson_sessions);
    ok(
        &req.id,
        json!({
            "awaitingTeacherMark": counts.awaiting_teacher,
            "awaitingStudentConfirmation": counts.awaiting_student,
        }),
    )
}

fn handle_progress(state: &mut AppState, req: &Request) -> serde_json::Value {
    let snap = match snapshot(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let stats = progress(&snap.lesson_sessions);
    ok(
        &req.id,
        json!({
            "total": stats.total,
            "completed": stats.completed,
            "planned": stats.planned,
            "completionRate": stats.completion_rate,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sessions.list" => Some(handle_list(state, req)),
        "sessions.actions" => Some(handle_actions(state, req)),
        "sessions.pending" => Some(handle_pending(state, req)),
        "sessions.progress" => Some(handle_progress(state, req)),
        _ => None,
    }
}
