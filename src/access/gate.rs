//! Role Gate
//! Mission: Decide whether a resolved user may use a capability
//!
//! The override flag (`can_access_both`) lets a staff member act under
//! either staff role. It never grants admin rights and never skips the
//! class-membership check.

use uuid::Uuid;

use super::{AccessError, ForbiddenReason};
use crate::auth::models::{User, UserRole};

/// What a handler needs from the caller before it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Admin,
    /// Any staff role, either capability.
    Staff,
    AttendanceStaff,
    CertificateStaff,
    AttendanceStaffOf(Uuid),
    CertificateStaffOf(Uuid),
}

fn has_role(user: &User, expected: UserRole) -> bool {
    match expected {
        UserRole::Admin => user.role == UserRole::Admin,
        staff_role => user.role == staff_role || (user.role.is_staff() && user.can_access_both),
    }
}

pub fn require_role(user: &User, expected: UserRole) -> Result<&User, AccessError> {
    if has_role(user, expected) {
        return Ok(user);
    }

    let reason = match expected {
        UserRole::Admin => ForbiddenReason::AdminRequired,
        UserRole::AttendanceIncharge => ForbiddenReason::AttendanceStaffRequired,
        UserRole::CertificateIncharge => ForbiddenReason::CertificateStaffRequired,
    };
    Err(AccessError::Forbidden(reason))
}

pub fn require_class_membership(user: &User, class_id: Uuid) -> Result<&User, AccessError> {
    if user.is_assigned_to(&class_id) {
        Ok(user)
    } else {
        Err(AccessError::NotAssignedToClass)
    }
}

/// Check `requirement` and hand the user back for the operation that follows
pub fn authorize(user: User, requirement: Requirement) -> Result<User, AccessError> {
    match requirement {
        Requirement::Admin => {
            require_role(&user, UserRole::Admin)?;
        }
        Requirement::Staff => {
            if !user.role.is_staff() {
                return Err(AccessError::Forbidden(ForbiddenReason::StaffRequired));
            }
        }
        Requirement::AttendanceStaff => {
            require_role(&user, UserRole::AttendanceIncharge)?;
        }
        Requirement::CertificateStaff => {
            require_role(&user, UserRole::CertificateIncharge)?;
        }
        Requirement::AttendanceStaffOf(class_id) => {
            require_role(&user, UserRole::AttendanceIncharge)?;
            require_class_membership(&user, class_id)?;
        }
        Requirement::CertificateStaffOf(class_id) => {
            require_role(&user, UserRole::CertificateIncharge)?;
            require_class_membership(&user, class_id)?;
        }
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::testing::user;
    use crate::auth::models::Gender;

    #[test]
    fn test_exact_roles() {
        let admin = user(UserRole::Admin, Gender::Male, &[]);
        let attendance = user(UserRole::AttendanceIncharge, Gender::Male, &[]);
        let certificate = user(UserRole::CertificateIncharge, Gender::Female, &[]);

        assert!(require_role(&admin, UserRole::Admin).is_ok());
        assert!(require_role(&attendance, UserRole::AttendanceIncharge).is_ok());
        assert!(require_role(&certificate, UserRole::CertificateIncharge).is_ok());

        assert!(matches!(
            require_role(&attendance, UserRole::Admin),
            Err(AccessError::Forbidden(ForbiddenReason::AdminRequired))
        ));
        assert!(matches!(
            require_role(&certificate, UserRole::AttendanceIncharge),
            Err(AccessError::Forbidden(ForbiddenReason::AttendanceStaffRequired))
        ));
        assert!(matches!(
            require_role(&admin, UserRole::CertificateIncharge),
            Err(AccessError::Forbidden(ForbiddenReason::CertificateStaffRequired))
        ));
    }

    #[test]
    fn test_override_covers_both_staff_roles_only() {
        let mut both = user(UserRole::CertificateIncharge, Gender::Male, &[]);
        both.can_access_both = true;
        assert!(require_role(&both, UserRole::AttendanceIncharge).is_ok());
        assert!(require_role(&both, UserRole::CertificateIncharge).is_ok());
        assert!(require_role(&both, UserRole::Admin).is_err());

        let mut admin = user(UserRole::Admin, Gender::Male, &[]);
        admin.can_access_both = true;
        assert!(require_role(&admin, UserRole::AttendanceIncharge).is_err());
    }

    #[test]
    fn test_class_scoped_requirements() {
        let c1 = Uuid::new_v4();
        let c2 = Uuid::new_v4();
        let staff = user(UserRole::AttendanceIncharge, Gender::Female, &[c1]);

        assert!(authorize(staff.clone(), Requirement::AttendanceStaffOf(c1)).is_ok());
        assert!(matches!(
            authorize(staff.clone(), Requirement::AttendanceStaffOf(c2)),
            Err(AccessError::NotAssignedToClass)
        ));
        assert!(matches!(
            authorize(staff.clone(), Requirement::CertificateStaffOf(c1)),
            Err(AccessError::Forbidden(_))
        ));
        assert!(authorize(staff, Requirement::Staff).is_ok());

        let admin = user(UserRole::Admin, Gender::Male, &[]);
        assert!(matches!(
            authorize(admin, Requirement::Staff),
            Err(AccessError::Forbidden(ForbiddenReason::StaffRequired))
        ));
    }
}
