//! Roster records and admin payloads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::models::{Gender, UserRole};

/// A class with its lookup names resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub id: Uuid,
    pub class_name: String,
    pub program_type: String,
    pub department: Option<String>,
    pub section: Option<String>,
    pub regular_or_self: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub roll_number: String,
    pub name: String,
    pub gender: Gender,
    pub class_id: Uuid,
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramType {
    pub id: Uuid,
    pub type_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewClass {
    pub class_name: String,
    pub program_type: String,
    pub department: Option<String>,
    pub section: Option<String>,
    pub regular_or_self: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassUpdate {
    pub class_name: Option<String>,
    pub program_type: Option<String>,
    pub department: Option<String>,
    pub section: Option<String>,
    pub regular_or_self: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStaff {
    pub staff_roll_number: String,
    pub staff_name: Option<String>,
    pub role: UserRole,
    pub gender: Gender,
    #[serde(default)]
    pub can_access_both: bool,
    #[serde(default)]
    pub assigned_class_ids: Vec<Uuid>,
    #[serde(default)]
    pub assigned_class_names: Vec<String>,
}

/// Partial staff update. `Some` assignment lists replace the current set,
/// an empty list clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaffUpdate {
    pub staff_roll_number: Option<String>,
    pub staff_name: Option<String>,
    pub role: Option<UserRole>,
    pub gender: Option<Gender>,
    pub can_access_both: Option<bool>,
    pub assigned_class_ids: Option<Vec<Uuid>>,
    pub assigned_class_names: Option<Vec<String>>,
}

impl StaffUpdate {
    pub fn replaces_assignments(&self) -> bool {
        self.assigned_class_ids.is_some() || self.assigned_class_names.is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StaffFilter {
    pub role: Option<UserRole>,
    pub gender: Option<Gender>,
    pub program_type: Option<String>,
}

/// New student, placed either by `class_id` or by class details.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    pub roll_number: String,
    pub name: String,
    pub gender: Gender,
    pub class_id: Option<Uuid>,
    pub class_name: Option<String>,
    pub program_type: Option<String>,
    pub department: Option<String>,
    pub section: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentUpdate {
    pub roll_number: Option<String>,
    pub name: Option<String>,
    pub gender: Option<Gender>,
    pub present: Option<bool>,
    pub class_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSummary {
    pub class_id: Uuid,
    pub class_name: String,
    pub total_students: usize,
    pub present_count: usize,
    pub absent_count: usize,
}

/// One class section of the present-students report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentClassReport {
    pub class: ClassRecord,
    pub students: Vec<Student>,
}

/// A row a bulk operation did not apply, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkIssue {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome<T> {
    pub created: Vec<T>,
    pub skipped: Vec<BulkIssue>,
}

impl<T> Default for BulkOutcome<T> {
    fn default() -> Self {
        Self {
            created: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> BulkOutcome<T> {
    pub fn skip(&mut self, key: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(BulkIssue {
            key: key.into(),
            reason: reason.into(),
        });
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkDelete {
    pub deleted: Vec<Uuid>,
    pub errors: Vec<BulkIssue>,
}
