//! Access control errors.
//!
//! Every check in this module fails with its own variant so callers can
//! render an accurate message; nothing is collapsed into a generic failure.

use chrono::NaiveTime;
use std::fmt;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    #[error("{0}")]
    Forbidden(ForbiddenReason),

    #[error("You are not assigned to this class")]
    NotAssignedToClass,

    #[error("Attendance marking is allowed only between {start} and {end}")]
    OutsideAllowedWindow { start: NaiveTime, end: NaiveTime },

    #[error("Student not found")]
    StudentNotFound,

    #[error("Class not found")]
    ClassNotFound,

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Why a `Forbidden` was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenReason {
    AdminRequired,
    AttendanceStaffRequired,
    CertificateStaffRequired,
    StaffRequired,
    GenderMismatch,
}

impl fmt::Display for ForbiddenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ForbiddenReason::AdminRequired => "Admin access required",
            ForbiddenReason::AttendanceStaffRequired => "Attendance staff access required",
            ForbiddenReason::CertificateStaffRequired => "Certificate staff access required",
            ForbiddenReason::StaffRequired => "Not a staff user",
            ForbiddenReason::GenderMismatch => {
                "You can mark attendance only for same-gender students"
            }
        };
        f.write_str(msg)
    }
}
