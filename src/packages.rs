use crate::model::{Id, PackageDef, StudentPackage};

/// First instance with status ACTIVE, falling back to the first instance.
/// The fallback is deliberate: an expired-only list still shows something.
pub fn active_package<'a>(
    items: impl IntoIterator<Item = &'a StudentPackage>,
) -> Option<&'a StudentPackage> {
    let mut first = None;
    for sp in items {
        if sp.status.as_deref() == Some("ACTIVE") {
            return Some(sp);
        }
        if first.is_none() {
            first = Some(sp);
        }
    }
    first
}

pub fn packages_for_student(all: &[StudentPackage], student_id: Id) -> Vec<&StudentPackage> {
    all.iter()
        .filter(|sp| sp.student_id == Some(student_id))
        .collect()
}

/// Early renewal opens at one remaining lesson, not zero.
pub fn renewal_eligible(sp: &StudentPackage) -> bool {
    sp.remaining_lessons.map(|r| r <= 1).unwrap_or(false)
}

/// New sessions are blocked only when the credit is fully exhausted. The
/// asymmetry against the renewal threshold is intentional; they encode two
/// different business rules.
pub fn new_session_blocked(active: Option<&StudentPackage>) -> bool {
    active
        .and_then(|sp| sp.remaining_lessons)
        .map(|r| r == 0)
        .unwrap_or(false)
}

pub fn definition_name<'a>(defs: &'a [PackageDef], package_id: Option<Id>) -> Option<&'a str> {
    let id = package_id?;
    defs.iter()
        .find(|d| d.id == Some(id))
        .and_then(|d| d.name.as_deref())
}
