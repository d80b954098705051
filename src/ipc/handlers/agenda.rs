use chrono::{Datelike, NaiveDateTime};
use serde_json::json;

use crate::agenda::{
    bucket_by_day, display_amount, merge_agenda, month_grid, monthly_earnings, shift_month,
};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{coerce_id, parse_timestamp, Snapshot};

fn snapshot<'a>(state: &'a AppState, req: &Request) -> Result<&'a Snapshot, serde_json::Value> {
    state
        .snapshot
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_snapshot", "load a snapshot first", None))
}

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

/// Rate resolution: explicit `rate` param wins; otherwise the teacher row's
/// `teacher_rate`; otherwise zero (renders as the "-" sentinel).
fn resolve_rate(snap: &Snapshot, req: &Request) -> f64 {
    if let Some(rate) = req.params.get("rate") {
        if let Some(v) = rate.as_f64() {
            return v;
        }
        if let Some(v) = rate.as_str().and_then(|s| s.trim().parse::<f64>().ok()) {
            return v;
        }
    }
    if let Some(tid) = req.params.get("teacherId").and_then(coerce_id) {
        return snap
            .teachers
            .iter()
            .find(|t| t.canonical_id() == Some(tid))
            .and_then(|t| t.teacher_rate)
            .unwrap_or(0.0);
    }
    0.0
}

fn handle_earnings(state: &mut AppState, req: &Request) -> serde_json::Value {
    let snap = match snapshot(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let now = match resolve_now(snap, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let rate = resolve_rate(snap, req);
    let earnings = monthly_earnings(&snap.lesson_sessions, rate, now);
    ok(
        &req.id,
        json!({
            "completedCount": earnings.completed_count,
            "rate": earnings.rate,
            "earning": earnings.earning,
            "rateDisplay": display_amount(earnings.rate),
            "earningDisplay": display_amount(earnings.earning),
        }),
    )
}

fn handle_calendar(state: &mut AppState, req: &Request) -> serde_json::Value {
    let snap = match snapshot(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let now = match resolve_now(snap, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let offset = req
        .params
        .get("monthOffset")
        .and_then(|v| v.as_i64())
        .unwrap_or(0) as i32;
    let (year, month) = shift_month(now.year(), now.month(), offset);
    let Some(grid) = month_grid(year, month) else {
        return err(
            &req.id,
            "bad_params",
            format!("month out of range: {year}-{month}"),
            None,
        );
    };
    let buckets = bucket_by_day(merge_agenda(&snap.lesson_sessions, &snap.external_events));
    let days: Vec<serde_json::Value> = (1..=grid.days_in_month)
        .map(|day| {
            let date = format!("{year:04}-{month:02}-{day:02}");
            let items = buckets.get(&date).cloned().unwrap_or_default();
            json!({ "day": day, "date": date, "items": items })
        })
        .collect();
    ok(
        &req.id,
        json!({
            "year": grid.year,
            "month": grid.month,
            "leadingBlanks": grid.leading_blanks,
            "daysInMonth": grid.days_in_month,
            "days": days,
        }),
    )
}

/// Admin workload view: lesson counts per teacher over the whole collection.
fn handle_workload(state: &mut AppState, req: &Request) -> serde_json::Value {
    let snap = match snapshot(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let mut counts = std::collections::HashMap::new();
    for s in &snap.lesson_sessions {
        if let Some(tid) = s.teacher_user_id {
            *counts.entry(tid).or_insert(0usize) += 1;
        }
    }
    let rows: Vec<serde_json::Value> = snap
        .teachers
        .iter()
        .filter_map(|t| {
            let tid = t.canonical_id()?;
            Some(json!({
                "teacherId": tid,
                "teacherName": t.display_name(),
                "lessonCount": counts.get(&tid).copied().unwrap_or(0),
            }))
        })
        .collect();
    ok(&req.id, json!({ "teachers": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "earnings.month" => Some(handle_earnings(state, req)),
        "calendar.month" => Some(handle_calendar(state, req)),
        "workload.teachers" => Some(handle_workload(state, req)),
        _ => None,
    }
}
