//! Access Control
//! Mission: Decide who may read or write which attendance records
//!
//! request -> token -> `resolve_user` -> `authorize` -> window (writes)
//! -> visibility -> data operation
//!
//! Everything here is synchronous and reads storage only through
//! [`Directory`], so the checks can be exercised without a database.

mod attendance;
mod directory;
mod error;
mod gate;
mod identity;
mod visibility;
mod window;

pub use attendance::mark_attendance;
pub use directory::Directory;
pub use error::{AccessError, ForbiddenReason};
pub use gate::{authorize, require_class_membership, require_role, Requirement};
pub use identity::resolve_user;
pub use visibility::{
    filter_visible_students, visible_class_ids, visible_roster, ClassRoster, RosterView,
};
pub use window::{parse_time_of_day, AttendanceWindow};
