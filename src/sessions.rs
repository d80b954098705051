use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::model::{day_key, parse_timestamp, Id, LessonSession};

/// Closed status set owned by the backend. Anything else maps to `Unknown`
/// and gets the default display treatment instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Planned,
    PendingConfirmation,
    Completed,
    Cancelled,
    Missed,
    Unknown,
}

impl SessionStatus {
    pub fn parse(raw: &str) -> SessionStatus {
        match raw {
            "PLANNED" => SessionStatus::Planned,
            "PENDING_CONFIRMATION" => SessionStatus::PendingConfirmation,
            "COMPLETED" => SessionStatus::Completed,
            "CANCELLED" => SessionStatus::Cancelled,
            "MISSED" => SessionStatus::Missed,
            _ => SessionStatus::Unknown,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Cancelled | SessionStatus::Missed
        )
    }

    pub fn color(self) -> &'static str {
        match self {
            SessionStatus::Planned => "#2563eb",
            SessionStatus::PendingConfirmation => "#b45309",
            SessionStatus::Completed => "#15803d",
            SessionStatus::Cancelled => "#b91c1c",
            SessionStatus::Missed => "#6b7280",
            SessionStatus::Unknown => "#111827",
        }
    }
}

pub fn status_of(s: &LessonSession) -> SessionStatus {
    SessionStatus::parse(s.status.as_deref().unwrap_or(""))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Teacher,
    Student,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Role> {
        match raw {
            "TEACHER" => Some(Role::Teacher),
            "STUDENT" => Some(Role::Student),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    MarkDone,
    MarkNoShow,
    Cancel,
    Delete,
}

impl SessionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionAction::MarkDone => "mark_done",
            SessionAction::MarkNoShow => "mark_no_show",
            SessionAction::Cancel => "cancel",
            SessionAction::Delete => "delete",
        }
    }
}

/// Empty strings count as unset; the backend sends null but edited rows have
/// come back as "".
fn marked(v: &Option<String>) -> bool {
    v.as_deref().map(|s| !s.is_empty()).unwrap_or(false)
}

/// Actions the caller's role may trigger for this session. The engine only
/// predicts eligibility; the backend owns the transitions themselves.
pub fn eligible_actions(s: &LessonSession, role: Role) -> Vec<SessionAction> {
    let st = status_of(s);
    let mut out = Vec::new();
    match role {
        Role::Admin => {
            if st != SessionStatus::Cancelled {
                out.push(SessionAction::Cancel);
            }
            out.push(SessionAction::Delete);
        }
        Role::Teacher => {
            if !st.is_terminal() {
                if !marked(&s.teacher_marked_at) {
                    out.push(SessionAction::MarkDone);
                }
                out.push(SessionAction::Cancel);
            }
        }
        Role::Student => {
            let confirmable = st == SessionStatus::PendingConfirmation
                && marked(&s.teacher_marked_at)
                && !marked(&s.student_marked_at);
            if confirmable {
                out.push(SessionAction::MarkDone);
                out.push(SessionAction::MarkNoShow);
            }
            // Once the teacher has attested the lesson the student can no
            // longer pull it back unilaterally.
            if !st.is_terminal() && !marked(&s.teacher_marked_at) {
                out.push(SessionAction::Cancel);
            }
        }
    }
    out
}

/// Whether rating/note entry may accompany the mark. Two dashboard variants
/// disagreed on the final-lesson restriction, so it is a policy flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct RatingPolicy {
    pub require_final_lesson: bool,
}

pub fn rating_entry_allowed(
    s: &LessonSession,
    role: Role,
    remaining_lessons: Option<i64>,
    policy: RatingPolicy,
) -> bool {
    if !eligible_actions(s, role).contains(&SessionAction::MarkDone) {
        return false;
    }
    match role {
        Role::Student if policy.require_final_lesson => remaining_lessons == Some(1),
        _ => true,
    }
}

/// Dashboard filter: hide completed and past-dated sessions. Undated or
/// unparseable starts are kept, not hidden.
pub fn is_upcoming(s: &LessonSession, now: NaiveDateTime) -> bool {
    if status_of(s) == SessionStatus::Completed {
        return false;
    }
    match s.scheduled_start.as_deref().filter(|v| !v.trim().is_empty()) {
        None => true,
        Some(raw) => match parse_timestamp(raw) {
            None => true,
            Some(ts) => ts >= now,
        },
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFilters {
    #[serde(default, deserialize_with = "crate::model::de_opt_id")]
    pub teacher_id: Option<Id>,
    #[serde(default, deserialize_with = "crate::model::de_opt_id")]
    pub student_id: Option<Id>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub status: Option<String>,
}

/// Admin list filters. Date bounds compare day-key prefixes; undated rows
/// pass date bounds rather than disappearing.
pub fn matches_filters(s: &LessonSession, f: &SessionFilters) -> bool {
    if let Some(tid) = f.teacher_id {
        if s.teacher_user_id != Some(tid) {
            return false;
        }
    }
    if let Some(sid) = f.student_id {
        if s.student_id != Some(sid) {
            return false;
        }
    }
    if let Some(want) = f.status.as_deref().filter(|v| !v.is_empty()) {
        if s.status.as_deref() != Some(want) {
            return false;
        }
    }
    let key = s.scheduled_start.as_deref().and_then(day_key);
    if let Some(from) = f.from.as_deref().filter(|v| !v.is_empty()) {
        if let Some(key) = key {
            if key < from {
                return false;
            }
        }
    }
    if let Some(to) = f.to.as_deref().filter(|v| !v.is_empty()) {
        if let Some(key) = key {
            if key > to {
                return false;
            }
        }
    }
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    /// No teacher mark yet, status still open.
    pub awaiting_teacher: usize,
    /// Teacher marked, waiting on the student's confirmation.
    pub awaiting_student: usize,
}

pub fn pending_counts(sessions: &[LessonSession]) -> PendingCounts {
    let mut counts = PendingCounts::default();
    for s in sessions {
        let st = status_of(s);
        if !marked(&s.teacher_marked_at) && !st.is_terminal() {
            counts.awaiting_teacher += 1;
        }
        if marked(&s.teacher_marked_at)
            && !marked(&s.student_marked_at)
            && st == SessionStatus::PendingConfirmation
        {
            counts.awaiting_student += 1;
        }
    }
    counts
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressStats {
    pub total: usize,
    pub completed: usize,
    pub planned: usize,
    /// Rounded percent of completed over total; 0 for an empty set.
    pub completion_rate: i64,
}

pub fn progress(sessions: &[LessonSession]) -> ProgressStats {
    let total = sessions.len();
    let completed = sessions
        .iter()
        .filter(|s| status_of(s) == SessionStatus::Completed)
        .count();
    let planned = sessions
        .iter()
        .filter(|s| status_of(s) == SessionStatus::Planned)
        .count();
    let completion_rate = if total > 0 {
        ((completed as f64 / total as f64) * 100.0).round() as i64
    } else {
        0
    };
    ProgressStats {
        total,
        completed,
        planned,
        completion_rate,
    }
}

pub fn teacher_marked(s: &LessonSession) -> bool {
    marked(&s.teacher_marked_at)
}

pub fn student_marked(s: &LessonSession) -> bool {
    marked(&s.student_marked_at)
}
