use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{json, Value};

use crate::model::{day_key, parse_timestamp, ExternalCalendarEvent, LessonSession};
use crate::sessions::{status_of, SessionStatus};

/// First instant of the month containing `now`, local wall time.
pub fn month_start(now: NaiveDateTime) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(now)
}

/// COMPLETED sessions scheduled at or after the month start. No upper bound:
/// a future-dated completed session still counts, as the source UI did.
/// Undated or unparseable rows are excluded here.
pub fn completed_since_month_start(sessions: &[LessonSession], now: NaiveDateTime) -> usize {
    let start = month_start(now);
    sessions
        .iter()
        .filter(|s| status_of(s) == SessionStatus::Completed)
        .filter_map(|s| s.scheduled_start.as_deref().and_then(parse_timestamp))
        .filter(|ts| *ts >= start)
        .count()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyEarnings {
    pub completed_count: usize,
    pub rate: f64,
    pub earning: f64,
}

pub fn monthly_earnings(sessions: &[LessonSession], rate: f64, now: NaiveDateTime) -> MonthlyEarnings {
    let completed_count = completed_since_month_start(sessions, now);
    MonthlyEarnings {
        completed_count,
        rate,
        earning: rate * completed_count as f64,
    }
}

/// UI convention: a zero amount renders as "-" rather than the numeral 0.
pub fn display_amount(value: f64) -> Value {
    if value == 0.0 {
        json!("-")
    } else {
        json!(value)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgendaItem {
    pub date: String,
    pub time: String,
    pub title: String,
    pub kind: &'static str,
}

fn time_part(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(ts) => ts.format("%H:%M").to_string(),
        None => "-".to_string(),
    }
}

/// Internal lessons first, external events appended after; undated items are
/// skipped. Day keys come straight from the raw string, no timezone math.
pub fn merge_agenda(
    sessions: &[LessonSession],
    events: &[ExternalCalendarEvent],
) -> Vec<AgendaItem> {
    let mut items = Vec::new();
    for s in sessions {
        let Some(raw) = s.scheduled_start.as_deref() else {
            continue;
        };
        let Some(date) = day_key(raw) else {
            continue;
        };
        items.push(AgendaItem {
            date: date.to_string(),
            time: time_part(raw),
            title: match s.topic.as_deref().filter(|t| !t.is_empty()) {
                Some(topic) => format!("Lesson: {topic}"),
                None => "Lesson".to_string(),
            },
            kind: "lesson",
        });
    }
    for e in events {
        let Some(raw) = e.start.as_deref() else {
            continue;
        };
        let Some(date) = day_key(raw) else {
            continue;
        };
        items.push(AgendaItem {
            date: date.to_string(),
            time: time_part(raw),
            title: e
                .summary
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Event".to_string()),
            kind: "external",
        });
    }
    items
}

/// Per-day buckets keyed by `YYYY-MM-DD`; each bucket keeps the merged
/// insertion order.
pub fn bucket_by_day(items: Vec<AgendaItem>) -> HashMap<String, Vec<AgendaItem>> {
    let mut by_day: HashMap<String, Vec<AgendaItem>> = HashMap::new();
    for item in items {
        by_day.entry(item.date.clone()).or_default().push(item);
    }
    by_day
}

/// Month arithmetic for the offset buttons; offset may be negative.
pub fn shift_month(year: i32, month: u32, offset: i32) -> (i32, u32) {
    let zero_based = year * 12 + month as i32 - 1 + offset;
    (zero_based.div_euclid(12), zero_based.rem_euclid(12) as u32 + 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    /// Blank cells before day 1, Sunday-indexed like the source grid.
    pub leading_blanks: u32,
    pub days_in_month: u32,
}

pub fn month_grid(year: i32, month: u32) -> Option<MonthGrid> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let (next_y, next_m) = shift_month(year, month, 1);
    let next_first = NaiveDate::from_ymd_opt(next_y, next_m, 1)?;
    let days_in_month = next_first.pred_opt()?.day();
    Some(MonthGrid {
        year,
        month,
        leading_blanks: first.weekday().num_days_from_sunday(),
        days_in_month,
    })
}
