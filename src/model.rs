use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Canonical entity identifier. The backend sends ids as JSON numbers, but
/// form-bound callers occasionally pass them back as digit strings; both
/// coerce to the same integer.
pub type Id = i64;

pub fn coerce_id(v: &Value) -> Option<Id> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub fn de_opt_id<'de, D>(d: D) -> Result<Option<Id>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().and_then(coerce_id))
}

fn de_opt_f64<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Teacher {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<Id>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub user_id: Option<Id>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub teacher_rate: Option<f64>,
}

impl Teacher {
    /// Fixed probe order: `id`, then `user_id`. Some endpoints return user
    /// rows, others teacher profiles keyed by `user_id`.
    pub fn canonical_id(&self) -> Option<Id> {
        self.id.or(self.user_id)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.full_name
            .as_deref()
            .or(self.name.as_deref())
            .or(self.email.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Student {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<Id>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub grade: Option<i64>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub target_exam: Option<String>,
    #[serde(default)]
    pub strengths: Option<String>,
    #[serde(default)]
    pub weaknesses: Option<String>,
}

impl Student {
    pub fn display_name(&self) -> Option<&str> {
        self.full_name
            .as_deref()
            .or(self.name.as_deref())
            .or(self.email.as_deref())
    }
}

/// Enrollment rows have drifted across backend iterations: the teacher side
/// has appeared under four names and the student side under three. All are
/// kept as optional fields; resolution order lives in `roster`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Enrollment {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<Id>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub teacher_user_id: Option<Id>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub teacher_id: Option<Id>,
    #[serde(default, rename = "teacherId", deserialize_with = "de_opt_id")]
    pub teacher_id_camel: Option<Id>,
    #[serde(default)]
    pub teacher: Option<Value>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub student_id: Option<Id>,
    #[serde(default, rename = "studentId", deserialize_with = "de_opt_id")]
    pub student_id_camel: Option<Id>,
    #[serde(default)]
    pub student: Option<Value>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LessonSession {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<Id>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub teacher_user_id: Option<Id>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub student_id: Option<Id>,
    #[serde(default)]
    pub scheduled_start: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub duration_min: Option<i64>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub teacher_marked_at: Option<String>,
    #[serde(default)]
    pub student_marked_at: Option<String>,
    #[serde(default)]
    pub teacher_mark_note: Option<String>,
    #[serde(default)]
    pub cancelled_by_role: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageDef {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<Id>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub lesson_count: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_f64")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub expires_in_days: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentPackage {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<Id>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub student_id: Option<Id>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub package_id: Option<Id>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub remaining_lessons: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Homework {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<Id>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub student_id: Option<Id>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Report {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<Id>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub student_id: Option<Id>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub lesson_session_id: Option<Id>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub performance_rating: Option<i64>,
    #[serde(default)]
    pub teacher_note: Option<String>,
    #[serde(default)]
    pub next_note: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalCalendarEvent {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// One full read-only copy of the backend collections. Replaced wholesale on
/// every `snapshot.load`; the engine never patches it in place.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub teachers: Vec<Teacher>,
    pub students: Vec<Student>,
    pub enrollments: Vec<Enrollment>,
    pub lesson_sessions: Vec<LessonSession>,
    pub package_definitions: Vec<PackageDef>,
    pub student_packages: Vec<StudentPackage>,
    pub homeworks: Vec<Homework>,
    pub reports: Vec<Report>,
    pub external_events: Vec<ExternalCalendarEvent>,
    /// Optional clock override supplied at load time; falls back to the
    /// local wall clock when absent.
    pub now: Option<NaiveDateTime>,
}

impl Snapshot {
    pub fn from_params(params: &Value) -> Result<Snapshot> {
        if !params.is_object() {
            bail!("snapshot params must be an object of collections");
        }
        let now = match params.get("now").and_then(|v| v.as_str()) {
            Some(raw) => match parse_timestamp(raw) {
                Some(ts) => Some(ts),
                None => bail!("unrecognized now timestamp: {raw}"),
            },
            None => None,
        };
        Ok(Snapshot {
            teachers: rows(params.get("teachers")),
            students: rows(params.get("students")),
            enrollments: rows(params.get("enrollments")),
            lesson_sessions: rows(params.get("lessonSessions")),
            package_definitions: rows(params.get("packageDefinitions")),
            student_packages: rows(params.get("studentPackages")),
            homeworks: rows(params.get("homeworks")),
            reports: rows(params.get("reports")),
            external_events: rows(params.get("externalCalendarEvents")),
            now,
        })
    }

    pub fn now_or_wall_clock(&self) -> NaiveDateTime {
        self.now
            .unwrap_or_else(|| chrono::Local::now().naive_local())
    }
}

/// Collections arrive either as a bare array or wrapped as `{ "items": [...] }`.
fn unwrap_items(v: Option<&Value>) -> Vec<Value> {
    match v {
        Some(Value::Array(a)) => a.clone(),
        Some(Value::Object(m)) => m
            .get("items")
            .and_then(|x| x.as_array())
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Rows that fail to deserialize are dropped, never fatal.
fn rows<T: DeserializeOwned>(v: Option<&Value>) -> Vec<T> {
    unwrap_items(v)
        .into_iter()
        .filter_map(|row| serde_json::from_value(row).ok())
        .collect()
}

/// Parses backend timestamps as wall time. RFC 3339 offsets are kept as
/// written (no conversion), matching how the UI sliced the raw string.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.naive_local());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0);
    }
    None
}

/// Calendar day key: the first ten characters of the raw timestamp, exactly
/// as the source encodes it.
pub fn day_key(raw: &str) -> Option<&str> {
    raw.get(0..10).filter(|k| !k.trim().is_empty())
}
