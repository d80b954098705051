use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::model::{coerce_id, Enrollment, Id, Student, Teacher};

/// Resolves a canonical id from a participant object of unknown shape.
/// Probe order is fixed: `id`, `user_id`, `teacher_user_id`, `student_id`.
/// Returns `None` for unlinkable records; callers skip, never error.
pub fn participant_id(v: &Value) -> Option<Id> {
    for key in ["id", "user_id", "teacher_user_id", "student_id"] {
        if let Some(id) = v.get(key).and_then(coerce_id) {
            return Some(id);
        }
    }
    None
}

pub fn enrollment_teacher_id(en: &Enrollment) -> Option<Id> {
    en.teacher_user_id
        .or(en.teacher_id)
        .or(en.teacher_id_camel)
        .or_else(|| en.teacher.as_ref().and_then(participant_id))
}

pub fn enrollment_student_id(en: &Enrollment) -> Option<Id> {
    en.student_id
        .or(en.student_id_camel)
        .or_else(|| en.student.as_ref().and_then(participant_id))
}

/// Teacher→students lookup built from the enrollment collection. The raw
/// pairs keep duplicates; set semantics apply only when producing a roster
/// for display.
#[derive(Debug, Clone, Default)]
pub struct RosterIndex {
    pairs: Vec<(Id, Id)>,
    by_teacher: HashMap<Id, Vec<Id>>,
}

impl RosterIndex {
    pub fn build(enrollments: &[Enrollment]) -> RosterIndex {
        let mut index = RosterIndex::default();
        for en in enrollments {
            let (Some(t), Some(s)) = (enrollment_teacher_id(en), enrollment_student_id(en))
            else {
                continue;
            };
            index.pairs.push((t, s));
            index.by_teacher.entry(t).or_default().push(s);
        }
        index
    }

    pub fn pairs(&self) -> &[(Id, Id)] {
        &self.pairs
    }

    pub fn raw_students_of(&self, teacher_id: Id) -> &[Id] {
        self.by_teacher
            .get(&teacher_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Deduplicated student ids for a teacher, first occurrence order.
    pub fn students_of(&self, teacher_id: Id) -> Vec<Id> {
        let mut seen = HashSet::new();
        self.raw_students_of(teacher_id)
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect()
    }

    pub fn teacher_ids(&self) -> Vec<Id> {
        self.by_teacher.keys().copied().collect()
    }
}

/// The student rows linked to a teacher, in student-collection order. Set
/// semantics over the resolved ids, then a filter over the collection.
pub fn students_of_teacher<'a>(
    index: &RosterIndex,
    teacher_id: Id,
    students: &'a [Student],
) -> Vec<&'a Student> {
    let linked: HashSet<Id> = index.raw_students_of(teacher_id).iter().copied().collect();
    students
        .iter()
        .filter(|st| st.id.map(|id| linked.contains(&id)).unwrap_or(false))
        .collect()
}

pub fn teacher_names(teachers: &[Teacher]) -> HashMap<Id, String> {
    teachers
        .iter()
        .filter_map(|t| {
            let id = t.canonical_id()?;
            Some((id, t.display_name().unwrap_or("").to_string()))
        })
        .collect()
}

pub fn student_names(students: &[Student]) -> HashMap<Id, String> {
    students
        .iter()
        .filter_map(|s| {
            let id = s.id?;
            Some((id, s.display_name().unwrap_or("").to_string()))
        })
        .collect()
}

/// Fallback rendering for ids with no known name.
pub fn name_or_tag(names: &HashMap<Id, String>, id: Option<Id>) -> String {
    match id {
        Some(id) => match names.get(&id).filter(|n| !n.is_empty()) {
            Some(n) => n.clone(),
            None => format!("#{id}"),
        },
        None => "-".to_string(),
    }
}

/// First enrollment with status ACTIVE, else the first row. Deliberate
/// fallback, not an error path.
pub fn active_enrollment(enrollments: &[Enrollment]) -> Option<&Enrollment> {
    enrollments
        .iter()
        .find(|en| en.status.as_deref() == Some("ACTIVE"))
        .or_else(|| enrollments.first())
}
