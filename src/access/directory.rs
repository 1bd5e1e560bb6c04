//! The storage seam the access layer reads through.

use uuid::Uuid;

use crate::auth::models::User;
use crate::store::{Student, StoreResult};

/// Point lookups and the single presence write the access layer needs.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; handlers share one instance.
pub trait Directory: Send + Sync {
    /// User with its assigned-class set loaded.
    fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    fn find_student(&self, id: Uuid) -> StoreResult<Option<Student>>;

    fn class_exists(&self, id: Uuid) -> StoreResult<bool>;

    fn all_class_ids(&self) -> StoreResult<Vec<Uuid>>;

    /// Students of one class, ordered by roll number.
    fn students_in_class(&self, class_id: Uuid) -> StoreResult<Vec<Student>>;

    /// Persist the presence flag. Returns `None` if the student vanished.
    fn set_presence(&self, student_id: Uuid, present: bool) -> StoreResult<Option<Student>>;
}
