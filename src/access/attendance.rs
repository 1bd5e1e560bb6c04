//! Attendance Mutator
//! Mission: The one state transition in the system, the presence flag
//!
//! Checks run in a fixed order and the first failure is reported as is:
//! 1. attendance role, or the override flag
//! 2. inside the attendance window
//! 3. student exists
//! 4. student's class is assigned to the caller
//! 5. student's gender matches the caller's
//!
//! The write happens only after all five pass. Repeating a mark is not an
//! error; the last write wins.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use super::gate::require_role;
use super::{AccessError, AttendanceWindow, Directory, ForbiddenReason};
use crate::auth::models::{User, UserRole};
use crate::store::Student;

pub fn mark_attendance<D: Directory + ?Sized>(
    dir: &D,
    window: &AttendanceWindow,
    user: &User,
    student_id: Uuid,
    present: bool,
    now: DateTime<Utc>,
) -> Result<Student, AccessError> {
    require_role(user, UserRole::AttendanceIncharge)?;
    window.check_within_window(now)?;

    let student = dir
        .find_student(student_id)?
        .ok_or(AccessError::StudentNotFound)?;

    if !user.is_assigned_to(&student.class_id) {
        return Err(AccessError::NotAssignedToClass);
    }
    if student.gender != user.gender {
        return Err(AccessError::Forbidden(ForbiddenReason::GenderMismatch));
    }

    let updated = dir
        .set_presence(student.id, present)?
        .ok_or(AccessError::StudentNotFound)?;

    info!(
        staff = %user.display_name(),
        student = %updated.roll_number,
        present,
        "Attendance marked"
    );
    Ok(updated)
}
