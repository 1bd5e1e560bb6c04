//! Visibility Filter
//! Mission: Restrict which students a caller may see
//!
//! - Admin: every class, or the one named; all genders.
//! - Staff: only assigned classes; naming an unassigned class is refused.
//! - Attendance view: students of the caller's own gender only.

use serde::Serialize;
use uuid::Uuid;

use super::{AccessError, Directory};
use crate::auth::models::{User, UserRole};
use crate::store::Student;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterView {
    /// Every student of a visible class.
    Full,
    /// Only students whose gender matches the caller's.
    SameGender,
}

impl RosterView {
    /// Default view for a user acting under their own role.
    pub fn for_user(user: &User) -> Self {
        match user.role {
            UserRole::AttendanceIncharge => RosterView::SameGender,
            UserRole::Admin | UserRole::CertificateIncharge => RosterView::Full,
        }
    }
}

/// Students of one visible class
#[derive(Debug, Clone, Serialize)]
pub struct ClassRoster {
    pub class_id: Uuid,
    pub students: Vec<Student>,
}

/// Classes the user may look at, narrowed to `class` when given
pub fn visible_class_ids<D: Directory + ?Sized>(
    dir: &D,
    user: &User,
    class: Option<Uuid>,
) -> Result<Vec<Uuid>, AccessError> {
    if user.role == UserRole::Admin {
        return match class {
            Some(id) => {
                if dir.class_exists(id)? {
                    Ok(vec![id])
                } else {
                    Err(AccessError::ClassNotFound)
                }
            }
            None => Ok(dir.all_class_ids()?),
        };
    }

    match class {
        Some(id) if user.is_assigned_to(&id) => Ok(vec![id]),
        Some(_) => Err(AccessError::NotAssignedToClass),
        None => Ok(user.assigned_classes.iter().copied().collect()),
    }
}

pub fn visible_roster<D: Directory + ?Sized>(
    dir: &D,
    user: &User,
    view: RosterView,
    class: Option<Uuid>,
) -> Result<Vec<ClassRoster>, AccessError> {
    let class_ids = visible_class_ids(dir, user, class)?;

    let mut rosters = Vec::with_capacity(class_ids.len());
    for class_id in class_ids {
        let mut students = dir.students_in_class(class_id)?;
        if view == RosterView::SameGender {
            students.retain(|s| s.gender == user.gender);
        }
        rosters.push(ClassRoster { class_id, students });
    }
    Ok(rosters)
}

/// Flat list of the students `user` may see under their own role
pub fn filter_visible_students<D: Directory + ?Sized>(
    dir: &D,
    user: &User,
    class: Option<Uuid>,
) -> Result<Vec<Student>, AccessError> {
    let rosters = visible_roster(dir, user, RosterView::for_user(user), class)?;
    Ok(rosters.into_iter().flat_map(|r| r.students).collect())
}
