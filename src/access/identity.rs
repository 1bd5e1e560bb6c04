//! Identity Resolver

use uuid::Uuid;

use super::{AccessError, Directory};
use crate::auth::models::{Claims, User};

/// Map a verified claim bundle to the stored user. A subject that is not a
/// user id can only come from a token we did not mint.
pub fn resolve_user<D: Directory + ?Sized>(dir: &D, claims: &Claims) -> Result<User, AccessError> {
    let id = Uuid::parse_str(&claims.sub).map_err(|_| AccessError::InvalidToken)?;
    dir.find_user(id)?.ok_or(AccessError::UserNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::testing::{user, MemoryDirectory};
    use crate::auth::models::{Gender, UserRole};

    fn claims_for(sub: String) -> Claims {
        Claims {
            sub,
            role: UserRole::AttendanceIncharge,
            gender: Gender::Male,
            can_access_both: false,
            exp: usize::MAX,
        }
    }

    #[test]
    fn test_resolves_known_user() {
        let dir = MemoryDirectory::default();
        let staff = user(UserRole::AttendanceIncharge, Gender::Male, &[]);
        dir.add_user(staff.clone());

        let resolved = resolve_user(&dir, &claims_for(staff.id.to_string())).unwrap();
        assert_eq!(resolved.id, staff.id);
    }

    #[test]
    fn test_unknown_and_malformed_subjects() {
        let dir = MemoryDirectory::default();
        assert!(matches!(
            resolve_user(&dir, &claims_for(Uuid::new_v4().to_string())),
            Err(AccessError::UserNotFound)
        ));
        assert!(matches!(
            resolve_user(&dir, &claims_for("admin".to_string())),
            Err(AccessError::InvalidToken)
        ));
    }
}
